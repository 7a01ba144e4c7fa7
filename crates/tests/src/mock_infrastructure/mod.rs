//! Mock infrastructure for gateway integration tests.
//!
//! ## Components
//!
//! - `MockDon`: in-memory DON transport recording every send
//! - `MockHttpClient`: scripted outbound HTTP client with optional latency
//! - `TargetMockBuilder`: mockito server standing in for external HTTP targets
//! - Test helpers for messages, trigger configs and routers
//!
//! ## Usage
//!
//! ```ignore
//! use tests::mock_infrastructure::{create_default_router, create_trigger_request, now_unix};
//!
//! let (router, don, _http) = create_default_router();
//! router.handle_user_message(create_trigger_request("m1", now_unix()), tx).await?;
//! assert_eq!(don.sent_count(), 4);
//! ```

pub mod mock_don;
pub mod mock_http;
pub mod target_mock;
pub mod test_helpers;

pub use mock_don::MockDon;
pub use mock_http::MockHttpClient;
pub use target_mock::TargetMockBuilder;
pub use test_helpers::*;

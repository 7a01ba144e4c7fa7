//! Outbound HTTP on behalf of DON nodes.
//!
//! The gateway only talks HTTP to the outside world through the [`HttpClient`] trait.
//! [`ReqwestHttpClient`] is the production implementation; tests substitute scripted
//! clients.

pub mod errors;
pub mod http_client;

pub use errors::NetworkError;
pub use http_client::{HttpClient, HttpClientConfig, HttpRequest, HttpResponse, ReqwestHttpClient};

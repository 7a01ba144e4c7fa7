//! Wire types shared by the gateway, its callers and the DON nodes.
//!
//! # Type Categories
//!
//! ## Envelope
//! - [`Message`], [`MessageBody`]: the unit exchanged between caller, gateway and nodes
//! - [`UserCallbackPayload`], [`ErrorCode`]: the single terminal outcome handed to a caller
//!
//! ## Method payloads
//! - [`TriggerRequestPayload`]: body of a `web_api_trigger` request from a caller
//! - [`OutboundRequestPayload`] / [`OutboundResponsePayload`]: HTTP calls brokered for nodes
//!
//! Payloads travel as raw JSON inside the envelope and are only decoded by the handler
//! that owns the method, so an unknown or malformed payload never affects routing.

use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::value::RawValue;
use std::collections::HashMap;

/// Caller-facing trigger request, fanned out to every DON member.
pub const METHOD_WEB_API_TRIGGER: &str = "web_api_trigger";

/// Node asks the gateway to call an external HTTP target.
pub const METHOD_WEB_API_TARGET: &str = "web_api_target";

/// Node asks the gateway to perform an HTTP call for a compute action.
pub const METHOD_COMPUTE_ACTION: &str = "compute_action";

/// Node reports its current trigger configurations.
pub const METHOD_WEB_API_TRIGGER_UPDATE_METADATA: &str = "web_api_trigger_update_metadata";

/// Routing and payload section of a [`Message`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageBody {
    /// Caller-chosen correlation key. Unique among concurrently outstanding requests.
    pub message_id: String,
    pub method: String,
    pub don_id: String,
    #[serde(default)]
    pub receiver: String,
    /// Method-specific payload, kept as raw JSON until a handler decodes it.
    pub payload: Box<RawValue>,
}

/// Envelope exchanged between callers, the gateway and DON nodes.
///
/// The signature is verified upstream of this crate and is never re-validated for
/// node-originated traffic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub body: MessageBody,
    #[serde(default)]
    pub signature: String,
}

impl Message {
    /// Builds a message whose payload is the JSON serialization of `payload`.
    ///
    /// # Errors
    ///
    /// Returns the serialization error if `payload` cannot be encoded as JSON.
    pub fn new<T: Serialize>(
        message_id: impl Into<String>,
        method: impl Into<String>,
        don_id: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            body: MessageBody {
                message_id: message_id.into(),
                method: method.into(),
                don_id: don_id.into(),
                receiver: String::new(),
                payload: serde_json::value::to_raw_value(payload)?,
            },
            signature: String::new(),
        })
    }

    /// Builds a reply that keeps this message's id, method and DON id.
    ///
    /// # Errors
    ///
    /// Returns the serialization error if `payload` cannot be encoded as JSON.
    pub fn reply_with<T: Serialize>(&self, payload: &T) -> Result<Self, serde_json::Error> {
        let mut reply = Self::new(
            self.body.message_id.clone(),
            self.body.method.clone(),
            self.body.don_id.clone(),
            payload,
        )?;
        reply.signature.clone_from(&self.signature);
        Ok(reply)
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.body.message_id
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.body.method
    }

    /// Raw JSON text of the payload.
    #[must_use]
    pub fn payload_str(&self) -> &str {
        self.body.payload.get()
    }

    /// Decodes the payload into a method-specific type.
    ///
    /// # Errors
    ///
    /// Returns the decode error if the payload does not match `T`.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(self.body.payload.get())
    }
}

/// Outcome classification delivered to a caller together with the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    NoError,
    /// The caller's payload could not be decoded or lacked a timestamp.
    UserMessageParseError,
    /// The handler rejected the request (stale, wrong method, ...).
    HandlerError,
    /// No node answered before the callback expired.
    RequestTimeout,
}

impl ErrorCode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoError => "no_error",
            Self::UserMessageParseError => "user_message_parse_error",
            Self::HandlerError => "handler_error",
            Self::RequestTimeout => "request_timeout",
        }
    }
}

/// Terminal outcome written once to a caller's sink.
#[derive(Debug, Clone)]
pub struct UserCallbackPayload {
    pub msg: Message,
    pub err_code: ErrorCode,
    pub err_msg: String,
}

impl UserCallbackPayload {
    /// Successful outcome carrying a node's reply.
    #[must_use]
    pub fn reply(msg: Message) -> Self {
        Self { msg, err_code: ErrorCode::NoError, err_msg: String::new() }
    }

    #[must_use]
    pub fn error(msg: Message, err_code: ErrorCode, err_msg: impl Into<String>) -> Self {
        Self { msg, err_code, err_msg: err_msg.into() }
    }
}

/// Body of a `web_api_trigger` request sent by a caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerRequestPayload {
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
    /// Unix seconds at which the caller created the request.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub trigger_event_id: String,
    #[serde(default)]
    pub trigger_id: String,
}

/// HTTP call a node asks the gateway to make on its behalf.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundRequestPayload {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default, with = "base64_body")]
    pub body: Bytes,
    /// Per-call deadline. Zero or negative falls back to the handler default.
    #[serde(default)]
    pub timeout_ms: i64,
}

/// Result of a brokered HTTP call, sent back to the requesting node.
///
/// `execution_error` is set only for failures below HTTP (connect, timeout, bad
/// request). Non-2xx responses are successful executions carrying their status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundResponsePayload {
    pub execution_error: bool,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(default, with = "base64_body", skip_serializing_if = "Bytes::is_empty")]
    pub body: Bytes,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_message: String,
}

impl OutboundResponsePayload {
    #[must_use]
    pub fn success(status_code: u16, headers: HashMap<String, String>, body: Bytes) -> Self {
        Self { execution_error: false, status_code, headers, body, error_message: String::new() }
    }

    #[must_use]
    pub fn failure(error_message: impl Into<String>) -> Self {
        Self { execution_error: true, error_message: error_message.into(), ..Self::default() }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(v: &u16) -> bool {
    *v == 0
}

/// Byte bodies travel as standard base64 strings; `null` decodes to an empty body.
mod base64_body {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(Bytes::new()),
            Some(encoded) => {
                STANDARD.decode(encoded.as_bytes()).map(Bytes::from).map_err(serde::de::Error::custom)
            }
        }
    }
}

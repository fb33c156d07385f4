//! HTTP client functionality

pub mod http;

// Re-exports
pub use http::{
    form_urlencode, ExecutedResponse, OutgoingRequest, ReqwestTransport, Transport, DEFAULT_TIMEOUT,
    USER_AGENT_STRING,
};

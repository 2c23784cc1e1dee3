//! Per-call context carried into services and hooks.

/// Identifies the call a service is serving.
///
/// Transports fill `request_id` from their own correlation id
/// (the HTTP adapter uses `x-request-id`); internal calls use `"internal"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: String,
}

impl RequestContext {
    pub fn new<S: Into<String>>(request_id: S) -> Self {
        Self {
            request_id: request_id.into(),
        }
    }

    pub fn internal() -> Self {
        Self::new("internal")
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::internal()
    }
}

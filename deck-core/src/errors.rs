//! # Errors
//!
//! Structured, Feathers-style errors that travel inside `anyhow::Error`
//! through the hook pipeline. Transports decide how to serialize them;
//! with feature `serde` the payload helpers (`data`, `errors`, `to_json`)
//! use `serde_json::Value`.

use std::fmt;

use anyhow::Error as AnyError;

/// Message sent to clients in place of server-side failure details.
pub const GENERIC_SERVER_MESSAGE: &str = "Internal server error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    MethodNotAllowed,
    Conflict,
    PayloadTooLarge,
    GeneralError,
    Unavailable,
}

impl ErrorKind {
    /// (status, name, className)
    const fn parts(&self) -> (u16, &'static str, &'static str) {
        match self {
            ErrorKind::BadRequest => (400, "BadRequest", "bad-request"),
            ErrorKind::NotFound => (404, "NotFound", "not-found"),
            ErrorKind::MethodNotAllowed => (405, "MethodNotAllowed", "method-not-allowed"),
            ErrorKind::Conflict => (409, "Conflict", "conflict"),
            ErrorKind::PayloadTooLarge => (413, "PayloadTooLarge", "payload-too-large"),
            ErrorKind::GeneralError => (500, "GeneralError", "general-error"),
            ErrorKind::Unavailable => (503, "Unavailable", "unavailable"),
        }
    }

    pub const fn status_code(&self) -> u16 {
        self.parts().0
    }

    pub const fn name(&self) -> &'static str {
        self.parts().1
    }

    pub const fn class_name(&self) -> &'static str {
        self.parts().2
    }

    pub const fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

#[cfg(feature = "serde")]
pub type ErrorValue = serde_json::Value;

#[cfg(not(feature = "serde"))]
pub type ErrorValue = std::sync::Arc<dyn std::any::Any + Send + Sync>;

#[derive(Debug)]
pub struct DeckError {
    pub kind: ErrorKind,
    pub message: String,
    pub data: Option<ErrorValue>,
    pub errors: Option<ErrorValue>,
    pub source: Option<AnyError>,
}

impl DeckError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: None,
            errors: None,
            source: None,
        }
    }

    pub fn with_data(mut self, data: ErrorValue) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_errors(mut self, errors: ErrorValue) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn with_source(mut self, source: AnyError) -> Self {
        self.source = Some(source);
        self
    }

    pub fn code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn class_name(&self) -> &'static str {
        self.kind.class_name()
    }

    pub fn into_anyhow(self) -> AnyError {
        AnyError::new(self)
    }

    /// Finds a `DeckError` anywhere in the chain, including under
    /// `anyhow` context layers.
    pub fn from_anyhow(err: &AnyError) -> Option<&DeckError> {
        err.chain().find_map(|e| e.downcast_ref::<DeckError>())
    }

    /// Client-safe copy: no `source`, and server failures lose their
    /// message and payload.
    pub fn sanitize_for_client(&self) -> DeckError {
        if self.kind.is_server_error() {
            return DeckError::new(self.kind, GENERIC_SERVER_MESSAGE);
        }

        DeckError {
            kind: self.kind,
            message: self.message.clone(),
            data: self.data.clone(),
            errors: self.errors.clone(),
            source: None,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }

    pub fn method_not_allowed(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::MethodNotAllowed, msg)
    }

    /// The request clashes with current state (e.g. a referenced record).
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, msg)
    }

    pub fn payload_too_large(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::PayloadTooLarge, msg)
    }

    pub fn general_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::GeneralError, msg)
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, msg)
    }
}

impl fmt::Display for DeckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.code(), self.message)
    }
}

impl std::error::Error for DeckError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

#[cfg(feature = "serde")]
impl DeckError {
    /// `{ name, message, code, className, data?, errors? }`
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;

        let mut base = json!({
            "name": self.name(),
            "message": self.message,
            "code": self.code(),
            "className": self.class_name(),
        });

        if let Some(d) = &self.data {
            base["data"] = d.clone();
        }
        if let Some(e) = &self.errors {
            base["errors"] = e.clone();
        }
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_sanitized_for_clients() {
        let err = DeckError::general_error("db password rejected")
            .with_source(anyhow::anyhow!("connection refused"));
        let safe = err.sanitize_for_client();

        assert_eq!(safe.code(), 500);
        assert_eq!(safe.message, GENERIC_SERVER_MESSAGE);
        assert!(safe.source.is_none());

        let safe = DeckError::conflict("in use").sanitize_for_client();
        assert_eq!(safe.message, "in use");
        assert_eq!(safe.class_name(), "conflict");
    }

    #[test]
    fn from_anyhow_sees_through_context() {
        let err = DeckError::not_found("Card not found: 1")
            .into_anyhow()
            .context("loading card");

        assert_eq!(DeckError::from_anyhow(&err).map(DeckError::code), Some(404));
        assert!(DeckError::from_anyhow(&anyhow::anyhow!("plain")).is_none());
    }
}

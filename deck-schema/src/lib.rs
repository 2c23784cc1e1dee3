//! Field-level validation errors, reported as `400 BadRequest` with an
//! `errors` map of `field -> [messages]`.

mod validate;

pub use validate::validate;

use deck_core::errors::DeckError;
use serde_json::{json, Map, Value};

/// Key used for errors that belong to the payload as a whole.
pub const SCHEMA_KEY: &str = "_schema";

#[derive(Debug, Default)]
pub struct SchemaErrors {
    map: Map<String, Value>,
}

impl SchemaErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_schema(&mut self, msg: impl Into<String>) {
        self.push_field(SCHEMA_KEY, msg);
    }

    pub fn push_field(&mut self, field: &str, msg: impl Into<String>) {
        let msg = Value::String(msg.into());
        match self.map.get_mut(field) {
            Some(Value::Array(arr)) => arr.push(msg),
            _ => {
                self.map.insert(field.to_string(), Value::Array(vec![msg]));
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// `Ok(())` when nothing was pushed.
    pub fn into_result(self, message: &str) -> anyhow::Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self.into_bad_request_anyhow(message))
        }
    }

    pub fn into_bad_request_anyhow(self, message: &str) -> anyhow::Error {
        bad_request(message, Value::Object(self.map))
    }
}

pub fn bad_request(message: &str, errors: Value) -> anyhow::Error {
    DeckError::bad_request(message).with_errors(errors).into_anyhow()
}

pub fn schema_error(message: &str, msg: impl Into<String>) -> anyhow::Error {
    bad_request(message, json!({ (SCHEMA_KEY): [msg.into()] }))
}

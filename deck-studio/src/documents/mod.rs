//! Record persistence for designs and cards.
//!
//! Records are JSON objects. The store owns `id` and `createdAt`; everything
//! else is whatever the services put in.

use anyhow::Result;
use async_trait::async_trait;
use deck_core::errors::DeckError;
use serde_json::{json, Map, Value};

pub mod memory;
#[cfg(feature = "mongodb")]
pub mod mongo;

pub use memory::MemoryDocumentStore;
#[cfg(feature = "mongodb")]
pub use mongo::MongoDocumentStore;

pub type Document = Map<String, Value>;

pub const ID_FIELD: &str = "id";
pub const CREATED_AT_FIELD: &str = "createdAt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Designs,
    Cards,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Designs, Collection::Cards];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Designs => "carddesigns",
            Collection::Cards => "cards",
        }
    }

    /// Singular, for messages.
    pub fn label(&self) -> &'static str {
        match self {
            Collection::Designs => "Design",
            Collection::Cards => "Card",
        }
    }

    pub fn unique_fields(&self) -> &'static [&'static str] {
        match self {
            Collection::Designs => &["name"],
            Collection::Cards => &[],
        }
    }

    pub fn not_found(&self, id: &str) -> anyhow::Error {
        DeckError::not_found(format!("{} not found: {id}", self.label())).into_anyhow()
    }

    pub fn duplicate(&self, field: &str, value: &Value) -> anyhow::Error {
        let shown = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
        DeckError::bad_request(format!("{} {field} '{shown}' already exists", self.label()))
            .with_errors(json!({ (field): ["must be unique"] }))
            .into_anyhow()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Field-equality filter plus creation order.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub filter: Vec<(String, Value)>,
    pub order: SortOrder,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.push((field.into(), value.into()));
        self
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filter
            .iter()
            .all(|(field, value)| doc.get(field).unwrap_or(&Value::Null) == value)
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Assigns `id` and `createdAt`; unique fields are enforced.
    async fn create(&self, collection: Collection, fields: Document) -> Result<Document>;

    async fn get(&self, collection: Collection, id: &str) -> Result<Document>;

    async fn list(&self, collection: Collection, query: ListQuery) -> Result<Vec<Document>>;

    /// Replaces every field except `id` and `createdAt`.
    async fn update(&self, collection: Collection, id: &str, fields: Document) -> Result<Document>;

    /// Returns the removed record.
    async fn delete(&self, collection: Collection, id: &str) -> Result<Document>;

    fn kind(&self) -> &'static str;
}

/// Drops the store-owned fields from caller input.
pub(crate) fn strip_owned_fields(mut fields: Document) -> Document {
    fields.remove(ID_FIELD);
    fields.remove(CREATED_AT_FIELD);
    fields.remove("_id");
    fields
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

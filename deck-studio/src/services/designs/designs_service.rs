use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use deck_core::{DeckService, RequestContext, ServiceCapabilities};
use serde_json::{json, Value};

use crate::documents::{Collection, ListQuery};
use crate::services::{into_document, StudioParams};
use crate::storage::StudioState;

use super::designs_shared;

/// Design CRUD over the document store. Payloads arrive already
/// normalized by the schema hooks.
pub struct DesignsService {
    pub state: Arc<StudioState>,
}

impl DesignsService {
    pub fn new(state: Arc<StudioState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl DeckService<Value, StudioParams> for DesignsService {
    fn capabilities(&self) -> ServiceCapabilities {
        designs_shared::crud_capabilities()
    }

    async fn find(&self, _ctx: &RequestContext, _params: StudioParams) -> Result<Vec<Value>> {
        let designs = self.state.documents.list(Collection::Designs, ListQuery::new()).await?;
        Ok(designs.into_iter().map(Value::Object).collect())
    }

    async fn get(&self, _ctx: &RequestContext, id: &str, _params: StudioParams) -> Result<Value> {
        Ok(Value::Object(self.state.documents.get(Collection::Designs, id).await?))
    }

    async fn create(&self, ctx: &RequestContext, data: Value, _params: StudioParams) -> Result<Value> {
        let created = self
            .state
            .documents
            .create(Collection::Designs, into_document(data)?)
            .await?;

        tracing::info!(request_id = %ctx.request_id, id = ?created.get("id"), "design created");
        Ok(Value::Object(created))
    }

    /// `styles` is replaced as a whole; a missing `name` keeps the old one.
    async fn update(&self, _ctx: &RequestContext, id: &str, data: Value, _params: StudioParams) -> Result<Value> {
        let existing = self.state.documents.get(Collection::Designs, id).await?;
        let mut fields = into_document(data)?;

        if !fields.contains_key("name") {
            if let Some(name) = existing.get("name") {
                fields.insert("name".to_string(), name.clone());
            }
        }

        let updated = self.state.documents.update(Collection::Designs, id, fields).await?;
        Ok(Value::Object(updated))
    }

    async fn remove(&self, ctx: &RequestContext, id: &str, _params: StudioParams) -> Result<Value> {
        self.state.documents.delete(Collection::Designs, id).await?;

        tracing::info!(request_id = %ctx.request_id, id, "design deleted");
        Ok(json!({ "id": id, "message": "Design deleted successfully" }))
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use deck_blob::{BlobPut, BlobReceipt};
use deck_core::errors::DeckError;
use deck_core::{DeckService, RequestContext, ServiceCapabilities};
use serde_json::{json, Value};

use crate::config::ReplacedImages;
use crate::documents::{Collection, Document, ListQuery, ID_FIELD};
use crate::services::{into_document, is_not_found, StudioParams};
use crate::storage::{blob_error, StudioState};

use super::card_params::CardParams;
use super::cards_shared;

pub const IMAGE_FIELD: &str = "image";

/// Card CRUD. Images go to the blob store first and the record second;
/// a failed record write deletes the fresh blob again.
pub struct CardsService {
    pub state: Arc<StudioState>,
    replaced_images: ReplacedImages,
    expand_by_default: bool,
}

impl CardsService {
    pub fn new(state: Arc<StudioState>) -> Self {
        Self {
            state,
            replaced_images: ReplacedImages::default(),
            expand_by_default: true,
        }
    }

    pub fn with_replaced_images(mut self, policy: ReplacedImages) -> Self {
        self.replaced_images = policy;
        self
    }

    pub fn with_expand_default(mut self, expand: bool) -> Self {
        self.expand_by_default = expand;
        self
    }

    /// Streams the `image` upload, if any, into the blob store.
    async fn store_image(&self, ctx: &RequestContext, params: &StudioParams) -> Result<Option<BlobReceipt>> {
        let Some(file) = params.file(IMAGE_FIELD) else {
            return Ok(None);
        };

        let mut put = BlobPut::new().with_size_hint(file.size);
        if let Some(name) = &file.filename {
            put = put.with_filename(name.clone());
        }
        if let Some(content_type) = &file.content_type {
            put = put.with_content_type(content_type.clone());
        }

        let body = file.open().await.map_err(|e| {
            DeckError::general_error("Failed to read uploaded image")
                .with_source(e.into())
                .into_anyhow()
        })?;
        let receipt = self.state.images.put(put, body).await.map_err(blob_error)?;

        tracing::debug!(
            request_id = %ctx.request_id,
            key = %receipt.key,
            size = receipt.size_bytes,
            "card image stored"
        );
        Ok(Some(receipt))
    }

    /// Best-effort; failures are logged and swallowed.
    async fn discard_image(&self, ctx: &RequestContext, key: &str, reason: &str) {
        if let Err(e) = self.state.images.delete(key).await {
            tracing::warn!(request_id = %ctx.request_id, key, reason, error = %e, "failed to delete card image");
        }
    }

    async fn inline_design(&self, mut card: Document) -> Result<Document> {
        let design = match card.get("cardDesign").and_then(Value::as_str) {
            Some(id) => match self.state.documents.get(Collection::Designs, id).await {
                Ok(design) => Value::Object(design),
                Err(e) if is_not_found(&e) => Value::Null,
                Err(e) => return Err(e),
            },
            None => Value::Null,
        };
        card.insert("cardDesign".to_string(), design);
        Ok(card)
    }

    async fn present(&self, card: Document, params: &CardParams) -> Result<Value> {
        if params.expand_design(self.expand_by_default) {
            Ok(Value::Object(self.inline_design(card).await?))
        } else {
            Ok(Value::Object(card))
        }
    }

    /// Shared by update and patch: merge `data` over the stored card and
    /// point `image` at `receipt` when a new image was stored.
    async fn merge_write(
        &self,
        ctx: &RequestContext,
        id: &str,
        data: Value,
        receipt: Option<BlobReceipt>,
    ) -> Result<Document> {
        let existing = match self.state.documents.get(Collection::Cards, id).await {
            Ok(card) => card,
            Err(e) => {
                if let Some(r) = &receipt {
                    self.discard_image(ctx, &r.key, "card missing").await;
                }
                return Err(e);
            }
        };

        let mut fields = existing.clone();
        match into_document(data) {
            Ok(changes) => fields.extend(changes),
            Err(e) => {
                if let Some(r) = &receipt {
                    self.discard_image(ctx, &r.key, "invalid payload").await;
                }
                return Err(e);
            }
        }
        if let Some(r) = &receipt {
            fields.insert(IMAGE_FIELD.to_string(), Value::String(r.key.clone()));
        }

        let updated = match self.state.documents.update(Collection::Cards, id, fields).await {
            Ok(card) => card,
            Err(e) => {
                if let Some(r) = &receipt {
                    self.discard_image(ctx, &r.key, "record write failed").await;
                }
                return Err(e);
            }
        };

        if let (Some(r), ReplacedImages::Delete) = (&receipt, self.replaced_images) {
            if let Some(old) = existing.get(IMAGE_FIELD).and_then(Value::as_str) {
                if old != r.key {
                    self.discard_image(ctx, old, "image replaced").await;
                }
            }
        }

        Ok(updated)
    }
}

#[async_trait]
impl DeckService<Value, StudioParams> for CardsService {
    fn capabilities(&self) -> ServiceCapabilities {
        cards_shared::crud_capabilities()
    }

    /// Cards and designs are read concurrently, then joined by id.
    async fn find(&self, _ctx: &RequestContext, params: StudioParams) -> Result<Vec<Value>> {
        let card_params = CardParams::from(&params);

        let mut query = ListQuery::new();
        if let Some(design) = &card_params.card_design {
            query = query.where_eq("cardDesign", design.clone());
        }

        if !card_params.expand_design(self.expand_by_default) {
            let cards = self.state.documents.list(Collection::Cards, query).await?;
            return Ok(cards.into_iter().map(Value::Object).collect());
        }

        let (cards, designs) = tokio::try_join!(
            self.state.documents.list(Collection::Cards, query),
            self.state.documents.list(Collection::Designs, ListQuery::new()),
        )?;

        let by_id: HashMap<String, Document> = designs
            .into_iter()
            .filter_map(|d| {
                let id = d.get(ID_FIELD)?.as_str()?.to_string();
                Some((id, d))
            })
            .collect();

        Ok(cards
            .into_iter()
            .map(|mut card| {
                let design = card
                    .get("cardDesign")
                    .and_then(Value::as_str)
                    .and_then(|id| by_id.get(id))
                    .cloned()
                    .map(Value::Object)
                    .unwrap_or(Value::Null);
                card.insert("cardDesign".to_string(), design);
                Value::Object(card)
            })
            .collect())
    }

    async fn get(&self, _ctx: &RequestContext, id: &str, params: StudioParams) -> Result<Value> {
        let card = self.state.documents.get(Collection::Cards, id).await?;
        self.present(card, &CardParams::from(&params)).await
    }

    async fn create(&self, ctx: &RequestContext, data: Value, params: StudioParams) -> Result<Value> {
        let mut fields = into_document(data)?;
        let receipt = self.store_image(ctx, &params).await?;

        fields.insert(
            IMAGE_FIELD.to_string(),
            receipt.as_ref().map(|r| Value::String(r.key.clone())).unwrap_or(Value::Null),
        );

        let created = match self.state.documents.create(Collection::Cards, fields).await {
            Ok(card) => card,
            Err(e) => {
                if let Some(r) = &receipt {
                    self.discard_image(ctx, &r.key, "record write failed").await;
                }
                return Err(e);
            }
        };

        tracing::info!(request_id = %ctx.request_id, id = ?created.get(ID_FIELD), "card created");
        self.present(created, &CardParams::from(&params)).await
    }

    /// Without an upload the stored image reference is left alone.
    async fn update(&self, ctx: &RequestContext, id: &str, data: Value, params: StudioParams) -> Result<Value> {
        let receipt = self.store_image(ctx, &params).await?;
        let updated = self.merge_write(ctx, id, data, receipt).await?;
        self.present(updated, &CardParams::from(&params)).await
    }

    async fn patch(&self, ctx: &RequestContext, id: &str, data: Value, params: StudioParams) -> Result<Value> {
        let updated = self.merge_write(ctx, id, data, None).await?;
        self.present(updated, &CardParams::from(&params)).await
    }

    /// The blob goes first; a failed blob delete does not keep the record.
    async fn remove(&self, ctx: &RequestContext, id: &str, _params: StudioParams) -> Result<Value> {
        let card = self.state.documents.get(Collection::Cards, id).await?;

        if let Some(key) = card.get(IMAGE_FIELD).and_then(Value::as_str) {
            self.discard_image(ctx, key, "card deleted").await;
        }
        self.state.documents.delete(Collection::Cards, id).await?;

        tracing::info!(request_id = %ctx.request_id, id, "card deleted");
        Ok(json!({ "id": id, "message": "Card deleted successfully" }))
    }
}

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use deck_core::{DeckAfterHook, DeckBeforeHook, DeckService, HookContext, HookResult, RequestContext};
use deck_schema::bad_request;
use serde_json::{json, Value};

use crate::documents::ID_FIELD;
use crate::services::{internal_params, is_not_found, StudioParams};
use crate::storage::StudioState;

use super::cards_schema::ERROR_MESSAGE;

/// Finds the design a card refers to, by id first and then by name.
pub async fn resolve_design_id(
    designs: &dyn DeckService<Value, StudioParams>,
    request: &RequestContext,
    reference: &str,
) -> Result<String> {
    match designs.get(request, reference, internal_params(&[])).await {
        Ok(design) => {
            if let Some(id) = design.get(ID_FIELD).and_then(Value::as_str) {
                return Ok(id.to_string());
            }
        }
        Err(e) if is_not_found(&e) => {}
        Err(e) => return Err(e),
    }

    let all = designs.find(request, internal_params(&[])).await?;
    all.iter()
        .find(|d| d.get("name").and_then(Value::as_str) == Some(reference))
        .and_then(|d| d.get(ID_FIELD).and_then(Value::as_str))
        .map(str::to_string)
        .ok_or_else(|| {
            bad_request(
                ERROR_MESSAGE,
                json!({ "cardDesign": [format!("no design with id or name '{reference}'")] }),
            )
        })
}

/// Replaces a design name in `cardDesign` with the design's id.
pub struct ResolveCardDesign;

#[async_trait]
impl DeckBeforeHook<Value, StudioParams> for ResolveCardDesign {
    async fn run(&self, ctx: &mut HookContext<Value, StudioParams>) -> Result<()> {
        let Some(reference) = ctx
            .data
            .as_ref()
            .and_then(|d| d.get("cardDesign"))
            .and_then(Value::as_str)
            .map(str::to_string)
        else {
            return Ok(());
        };

        let designs = ctx.services.service::<Value, StudioParams>("designs")?;
        let id = resolve_design_id(designs.as_ref(), &ctx.request, &reference).await?;

        if let Some(obj) = ctx.data.as_mut().and_then(Value::as_object_mut) {
            obj.insert("cardDesign".to_string(), Value::String(id));
        }
        Ok(())
    }
}

/// Adds `imageUrl` to every card in the result.
pub struct AttachImageUrl {
    pub state: Arc<StudioState>,
}

impl AttachImageUrl {
    fn attach(&self, card: &mut Value) {
        let Some(obj) = card.as_object_mut() else {
            return;
        };
        // Confirmations like `{ id, message }` carry no image field.
        let Some(image) = obj.get("image") else {
            return;
        };
        let url = match image.as_str() {
            Some(key) => Value::String(self.state.image_url(key)),
            None => Value::Null,
        };
        obj.insert("imageUrl".to_string(), url);
    }
}

#[async_trait]
impl DeckAfterHook<Value, StudioParams> for AttachImageUrl {
    async fn run(&self, ctx: &mut HookContext<Value, StudioParams>) -> Result<()> {
        match ctx.result.as_mut() {
            Some(HookResult::One(v)) => self.attach(v),
            Some(HookResult::Many(vs)) => vs.iter_mut().for_each(|v| self.attach(v)),
            None => {}
        }
        Ok(())
    }
}

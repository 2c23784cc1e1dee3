use anyhow::Result;
use async_trait::async_trait;
use deck_core::errors::DeckError;
use deck_core::{DeckAfterHook, DeckBeforeHook, DeckConfigSnapshot, HookContext, HookResult};
use serde_json::{json, Value};

use crate::config::OnDesignDelete;
use crate::services::{internal_params, query_lists, StudioParams};

use super::design_style::record_css;

pub const ON_DELETE_CONFIG_KEY: &str = "designs.onDelete";

/// `?onDelete=` wins over the app config; a bad query value is a 400.
pub fn on_delete_policy(params: &StudioParams, config: &DeckConfigSnapshot) -> Result<OnDesignDelete> {
    if let Some(raw) = params.query_value("onDelete") {
        return raw.parse().map_err(|e: anyhow::Error| {
            DeckError::bad_request(e.to_string())
                .with_errors(json!({"onDelete": ["must be one of orphan, nullify, restrict"]}))
                .into_anyhow()
        });
    }

    Ok(config
        .get(ON_DELETE_CONFIG_KEY)
        .and_then(|raw| raw.parse::<OnDesignDelete>().ok())
        .unwrap_or_default())
}

/// Applies the on-delete policy to the cards that reference the design.
pub struct EnforceDesignOnDelete;

#[async_trait]
impl DeckBeforeHook<Value, StudioParams> for EnforceDesignOnDelete {
    async fn run(&self, ctx: &mut HookContext<Value, StudioParams>) -> Result<()> {
        let policy = on_delete_policy(&ctx.params, &ctx.config)?;
        if policy == OnDesignDelete::Orphan {
            return Ok(());
        }
        let Some(design_id) = ctx.id.clone() else {
            return Ok(());
        };

        let cards = ctx.services.service::<Value, StudioParams>("cards")?;
        let referencing = cards
            .find(
                &ctx.request,
                internal_params(&[("cardDesign", design_id.as_str()), ("expand", "none")]),
            )
            .await?;

        if referencing.is_empty() {
            return Ok(());
        }

        match policy {
            OnDesignDelete::Restrict => Err(DeckError::conflict(format!(
                "Design is used by {} card(s)",
                referencing.len()
            ))
            .with_data(json!({ "cards": referencing.len() }))
            .into_anyhow()),
            OnDesignDelete::Nullify => {
                for card in &referencing {
                    let Some(card_id) = card.get("id").and_then(Value::as_str) else {
                        continue;
                    };
                    cards
                        .patch(&ctx.request, card_id, json!({ "cardDesign": null }), internal_params(&[]))
                        .await?;
                }
                tracing::info!(design = %design_id, cards = referencing.len(), "design references cleared");
                Ok(())
            }
            OnDesignDelete::Orphan => Ok(()),
        }
    }
}

/// `?include=css` adds the rendered `css` object to each design.
pub struct AttachDesignCss;

#[async_trait]
impl DeckAfterHook<Value, StudioParams> for AttachDesignCss {
    async fn run(&self, ctx: &mut HookContext<Value, StudioParams>) -> Result<()> {
        if !query_lists(&ctx.params, "include", "css") {
            return Ok(());
        }

        let attach = |design: &mut Value| {
            let css = record_css(design);
            if let Some(obj) = design.as_object_mut() {
                obj.insert("css".to_string(), css);
            }
        };

        match ctx.result.as_mut() {
            Some(HookResult::One(v)) => attach(v),
            Some(HookResult::Many(vs)) => vs.iter_mut().for_each(attach),
            None => {}
        }
        Ok(())
    }
}

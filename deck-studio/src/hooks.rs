use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use deck_core::errors::DeckError;
use deck_core::{DeckAroundHook, DeckErrorHook, HookContext, Next};
use serde_json::Value;

use crate::services::StudioParams;

/// One log line per service call.
pub struct LogAround;

#[async_trait]
impl DeckAroundHook<Value, StudioParams> for LogAround {
    async fn run(&self, ctx: &mut HookContext<Value, StudioParams>, next: Next<Value, StudioParams>) -> Result<()> {
        let started = Instant::now();
        let outcome = next.run(ctx).await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(()) => tracing::debug!(
                request_id = %ctx.request.request_id,
                service = %ctx.service,
                method = %ctx.method,
                provider = %ctx.params.provider,
                elapsed_ms,
                "call ok"
            ),
            Err(e) => tracing::debug!(
                request_id = %ctx.request.request_id,
                service = %ctx.service,
                method = %ctx.method,
                elapsed_ms,
                error = %e,
                "call failed"
            ),
        }
        outcome
    }
}

/// Server-side failures are logged with their full chain; clients only
/// ever see the generic message.
pub struct LogServerErrors;

#[async_trait]
impl DeckErrorHook<Value, StudioParams> for LogServerErrors {
    async fn run(&self, ctx: &mut HookContext<Value, StudioParams>) -> Result<()> {
        let Some(err) = &ctx.error else {
            return Ok(());
        };

        let server_side = DeckError::from_anyhow(err).map_or(true, |e| e.kind.is_server_error());
        if server_side {
            tracing::error!(
                request_id = %ctx.request.request_id,
                service = %ctx.service,
                method = %ctx.method,
                error = format!("{err:#}"),
                "service call failed"
            );
        }
        Ok(())
    }
}

pub fn global_hooks(app: &deck_core::DeckApp<Value, StudioParams>) {
    app.hooks(|h| {
        h.around_all(Arc::new(LogAround));
        h.error_all(Arc::new(LogServerErrors));
    });
}

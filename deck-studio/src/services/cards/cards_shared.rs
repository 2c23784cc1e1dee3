use std::sync::Arc;

use deck_core::{DeckApp, ServiceCapabilities, ServiceMethodKind};
use serde_json::Value;

use crate::services::StudioParams;
use crate::storage::StudioState;

use super::cards_hooks::{AttachImageUrl, ResolveCardDesign};

pub fn crud_capabilities() -> ServiceCapabilities {
    ServiceCapabilities::from_methods(vec![
        ServiceMethodKind::Create,
        ServiceMethodKind::Find,
        ServiceMethodKind::Get,
        ServiceMethodKind::Update,
        ServiceMethodKind::Patch,
        ServiceMethodKind::Remove,
    ])
}

pub fn register_hooks(app: &DeckApp<Value, StudioParams>, state: Arc<StudioState>) -> anyhow::Result<()> {
    // Schema first so design references arrive trimmed.
    super::cards_schema::register(app)?;

    app.service("cards")?.hooks(|h| {
        let resolve = Arc::new(ResolveCardDesign);
        h.before_create(resolve.clone());
        h.before_update(resolve.clone());
        h.before_patch(resolve);

        h.after_all(Arc::new(AttachImageUrl { state }));
    });
    Ok(())
}

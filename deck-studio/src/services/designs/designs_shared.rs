use std::sync::Arc;

use deck_core::{DeckApp, ServiceCapabilities, ServiceMethodKind};
use serde_json::Value;

use crate::services::StudioParams;

use super::designs_hooks::{AttachDesignCss, EnforceDesignOnDelete};

/// No PATCH: a design update always carries the full style bundle.
pub fn crud_capabilities() -> ServiceCapabilities {
    ServiceCapabilities::from_methods(vec![
        ServiceMethodKind::Create,
        ServiceMethodKind::Find,
        ServiceMethodKind::Get,
        ServiceMethodKind::Update,
        ServiceMethodKind::Remove,
    ])
}

pub fn register_hooks(app: &DeckApp<Value, StudioParams>) -> anyhow::Result<()> {
    super::designs_schema::register(app)?;

    app.service("designs")?.hooks(|h| {
        h.before_remove(Arc::new(EnforceDesignOnDelete));

        h.after_find(Arc::new(AttachDesignCss));
        h.after_get(Arc::new(AttachDesignCss));
    });
    Ok(())
}

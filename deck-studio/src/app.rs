use deck_axum::{axum, AxumApp};
use deck_core::DeckApp;
use serde_json::Value;

use crate::config::StudioConfig;
use crate::services::cards::card_params::{EXPAND_CONFIG_KEY, REPLACED_IMAGES_CONFIG_KEY};
use crate::services::designs::designs_hooks::ON_DELETE_CONFIG_KEY;
use crate::services::StudioParams;

pub fn studio_app(config: &StudioConfig) -> AxumApp<Value, StudioParams> {
    let deck_app: DeckApp<Value, StudioParams> = DeckApp::new();

    deck_app.set("http.host", config.host.clone());
    deck_app.set("http.port", config.port.to_string());
    deck_app.set("files.path", config.files_path.clone());

    deck_app.set(ON_DELETE_CONFIG_KEY, config.on_design_delete.to_string());
    deck_app.set(REPLACED_IMAGES_CONFIG_KEY, config.replaced_images.to_string());
    deck_app.set(EXPAND_CONFIG_KEY, config.expand_design.to_string());

    crate::hooks::global_hooks(&deck_app);

    axum(deck_app)
}

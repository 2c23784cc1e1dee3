pub mod cards;
pub mod designs;
pub mod types;

use std::sync::Arc;

use anyhow::Result;
use deck_core::errors::{DeckError, ErrorKind};
use serde_json::Value;

use crate::config::ReplacedImages;
use crate::documents::Document;
use crate::storage::StudioState;

use cards::card_params::{EXPAND_CONFIG_KEY, REPLACED_IMAGES_CONFIG_KEY};

pub use cards::CardsService;
pub use designs::DesignsService;
pub use types::{internal_params, query_lists, StudioParams};

pub struct StudioServices {
    pub designs: Arc<DesignsService>,
    pub cards: Arc<CardsService>,
}

impl StudioServices {
    /// Card behavior follows the app config keys set before this call.
    pub fn new(state: Arc<StudioState>, app: &deck_core::DeckApp<Value, StudioParams>) -> Result<Self> {
        let config = app.config_snapshot();
        let replaced_images = config
            .get(REPLACED_IMAGES_CONFIG_KEY)
            .map(str::parse::<ReplacedImages>)
            .transpose()?
            .unwrap_or_default();

        let cards = CardsService::new(state.clone())
            .with_replaced_images(replaced_images)
            .with_expand_default(config.get_bool(EXPAND_CONFIG_KEY).unwrap_or(true));

        Ok(Self {
            designs: Arc::new(DesignsService::new(state)),
            cards: Arc::new(cards),
        })
    }
}

/// Service hooks need both services registered first.
pub fn configure_hooks(app: &deck_core::DeckApp<Value, StudioParams>, state: Arc<StudioState>) -> Result<()> {
    designs::designs_shared::register_hooks(app)?;
    cards::cards_shared::register_hooks(app, state)?;
    Ok(())
}

pub fn into_document(data: Value) -> Result<Document> {
    match data {
        Value::Object(map) => Ok(map),
        _ => Err(DeckError::bad_request("body must be a JSON object").into_anyhow()),
    }
}

pub(crate) fn is_not_found(err: &anyhow::Error) -> bool {
    DeckError::from_anyhow(err).is_some_and(|e| e.kind == ErrorKind::NotFound)
}

pub mod card_params;
pub mod cards_hooks;
pub mod cards_schema;
pub mod cards_service;
pub mod cards_shared;

pub use card_params::CardParams;
pub use cards_service::CardsService;

//! deck-core: framework-agnostic core for the Deck card studio.
//!
//! Services implement [`DeckService`], get registered on a [`DeckApp`] and
//! are called through a Feathers-style hook pipeline
//! (around → before → method → after, error hooks on failure).

pub mod app;
pub mod config;
pub mod context;
pub mod errors;
pub mod hooks;
pub mod schema;
pub mod service;

pub use app::{DeckApp, ServiceCaller, ServiceHandle};
pub use config::{DeckConfig, DeckConfigSnapshot};
pub use context::RequestContext;
pub use errors::{DeckError, ErrorKind};
pub use hooks::{
    DeckAfterHook, DeckAroundHook, DeckBeforeHook, DeckErrorHook, HookContext, HookResult, Next,
    ServiceHooks,
};
pub use service::{DeckService, ServiceCapabilities, ServiceMethodKind};

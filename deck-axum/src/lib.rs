//! deck-axum: Axum adapter for deck-core apps.
//!
//! Mounts each registered service as a REST resource
//! (`GET/POST /` and `GET/PUT/PATCH/DELETE /{id}`), maps `DeckError`s to
//! JSON error responses and converts multipart uploads into service data.

pub mod app;
pub mod middlewares;
pub mod params;
pub mod rest;

mod error;
pub use error::DeckAxumError;

pub use app::{axum, AxumApp};
pub use params::{FromRestParams, RestParams, Uploads};

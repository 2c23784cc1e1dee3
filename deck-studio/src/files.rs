//! `GET <files.path>/{key}`: streams a stored card image back.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use deck_axum::DeckAxumError;

use crate::storage::{blob_error, StudioState};

pub fn router(state: Arc<StudioState>) -> Router<()> {
    Router::new().route("/{key}", get(serve_file)).with_state(state)
}

async fn serve_file(
    State(state): State<Arc<StudioState>>,
    Path(key): Path<String>,
) -> Result<Response, DeckAxumError> {
    let opened = state.images.open(&key).await.map_err(blob_error)?;

    let content_type = opened.content_type().to_string();
    let content_length = opened.content_length().to_string();

    // Keys are never reused, so a stored blob never changes.
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_LENGTH, content_length),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable".to_string()),
        ],
        Body::from_stream(opened.stream),
    )
        .into_response())
}

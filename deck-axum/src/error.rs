use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use deck_core::errors::DeckError;

/// Handler error: any `anyhow::Error`, rendered as a Feathers-style JSON
/// error body.
#[derive(Debug)]
pub struct DeckAxumError(pub anyhow::Error);

impl From<anyhow::Error> for DeckAxumError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl From<DeckError> for DeckAxumError {
    fn from(e: DeckError) -> Self {
        Self(e.into_anyhow())
    }
}

impl IntoResponse for DeckAxumError {
    fn into_response(self) -> Response {
        let safe = match DeckError::from_anyhow(&self.0) {
            Some(deck) => deck.sanitize_for_client(),
            None => DeckError::general_error(self.0.to_string()).sanitize_for_client(),
        };

        if safe.kind.is_server_error() {
            let detail = format!("{:#}", self.0);
            tracing::error!(status = safe.code(), error = %detail, "request failed");
        } else {
            tracing::debug!(status = safe.code(), error = %self.0, "request rejected");
        }

        let status = StatusCode::from_u16(safe.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(safe.to_json())).into_response()
    }
}

//! Card studio: designs, trading cards and their images over HTTP.

mod app;
pub mod config;
pub mod documents;
mod files;
mod hooks;
pub mod services;
pub mod storage;

use std::sync::Arc;

use anyhow::Result;
use axum::http::{HeaderName, HeaderValue};
use deck_axum::middlewares::{FileEncoding, MultipartConfig, MultipartToJson};
use deck_axum::rest::REQUEST_ID_HEADER;
use deck_axum::{AxumApp, DeckAxumError};
use deck_core::errors::DeckError;
use serde_json::Value;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};

pub use config::StudioConfig;
pub use services::StudioParams;
pub use storage::StudioState;

/// Opens the configured stores and builds the app on top of them.
pub async fn build(config: StudioConfig) -> Result<AxumApp<Value, StudioParams>> {
    let state = Arc::new(StudioState::from_config(&config).await?);
    build_with_state(&config, state)
}

/// Builds the app over already opened stores.
pub fn build_with_state(config: &StudioConfig, state: Arc<StudioState>) -> Result<AxumApp<Value, StudioParams>> {
    let ax = app::studio_app(config);

    let svcs = services::StudioServices::new(Arc::clone(&state), ax.app.as_ref())?;

    let ax = ax
        .use_service("/designs", svcs.designs)
        .use_service_with("/cards", svcs.cards, MultipartToJson::with_config(multipart_config(config)));

    services::configure_hooks(ax.app.as_ref(), Arc::clone(&state))?;

    let cors = cors_layer(&config.cors_origins)?;
    let static_dir = config.static_dir.clone();

    let ax = ax
        .use_router(&config.files_path, files::router(state))
        .use_get("/health", || async { "ok" })
        .map_router(move |router| {
            let router = match static_dir {
                // client-side routes resolve to the app shell
                Some(dir) => {
                    let index = ServeFile::new(dir.join("index.html"));
                    router.fallback_service(ServeDir::new(dir).fallback(index))
                }
                None => router.fallback(route_not_found),
            };
            router.layer(cors)
        });

    Ok(ax)
}

fn multipart_config(config: &StudioConfig) -> MultipartConfig {
    let mut multipart = MultipartConfig::new()
        .max_file_size(config.max_image_bytes)
        // text fields ride along with the image
        .max_total_size(config.max_image_bytes.saturating_add(1024 * 1024))
        .file_field(services::cards::cards_service::IMAGE_FIELD)
        .file_encoding(FileEncoding::TempFile);

    for content_type in config::ALLOWED_IMAGE_TYPES {
        multipart = multipart.allow_content_type(content_type);
    }
    multipart
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins = origins
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)]))
}

async fn route_not_found() -> DeckAxumError {
    DeckError::not_found("Route not found").into()
}

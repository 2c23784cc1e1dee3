use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::rejection::JsonRejection,
    extract::{OriginalUri, Path, Query, State},
    http::{HeaderMap, StatusCode, Uri},
    routing, Json, Router,
};
use deck_core::errors::DeckError;
use deck_core::{DeckApp, RequestContext, ServiceHandle};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use crate::{
    params::{FromRestParams, RestParams, Uploads},
    DeckAxumError,
};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

fn map_json_rejection(rejection: JsonRejection) -> DeckAxumError {
    DeckError::bad_request("Failed to parse the request body as JSON")
        .with_errors(json!({"_schema": [rejection.body_text()]}))
        .into()
}

/// The request id set (or propagated) by the request-id layer.
pub fn request_from_headers(headers: &HeaderMap) -> RequestContext {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(RequestContext::new)
        .unwrap_or_else(|| RequestContext::new(uuid::Uuid::new_v4().to_string()))
}

fn params_for<P: FromRestParams>(
    headers: &HeaderMap,
    query: HashMap<String, String>,
    method: &str,
    uri: &Uri,
    uploads: Uploads,
) -> P {
    let params = RestParams::from_parts("rest", headers, query, method, uri).with_uploads(uploads);
    P::from_rest_params(params)
}

/// Router state of one mounted service.
struct ServiceRoute<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    app: Arc<DeckApp<R, P>>,
    name: Arc<str>,
}

impl<R, P> Clone for ServiceRoute<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            app: Arc::clone(&self.app),
            name: Arc::clone(&self.name),
        }
    }
}

impl<R, P> ServiceRoute<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    /// Looked up per request.
    fn service(&self) -> Result<ServiceHandle<R, P>, DeckAxumError> {
        Ok(self.app.service(&self.name)?)
    }
}

/// REST routes for one registered service:
/// `GET/POST /` and `GET/PUT/PATCH/DELETE /{id}`.
pub fn service_router<R, P>(service_name: Arc<String>, app: Arc<DeckApp<R, P>>) -> Router<()>
where
    R: Serialize + DeserializeOwned + Send + Sync + 'static,
    P: FromRestParams + Send + Sync + Clone + 'static,
{
    let state = ServiceRoute {
        app,
        name: Arc::from(service_name.as_str()),
    };

    Router::new()
        .route(
            "/",
            routing::get(
                move |State(state): State<ServiceRoute<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<HashMap<String, String>>,
                      OriginalUri(uri): OriginalUri| async move {
                    let request = request_from_headers(&headers);
                    let params = params_for::<P>(&headers, query, "GET", &uri, Uploads::default());

                    let svc = state.service()?;
                    let res = svc.find(request, params).await?;
                    Ok::<_, DeckAxumError>(Json(res))
                },
            )
            .post(
                move |State(state): State<ServiceRoute<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<HashMap<String, String>>,
                      OriginalUri(uri): OriginalUri,
                      uploads: Uploads,
                      data: Result<Json<R>, JsonRejection>| async move {
                    let request = request_from_headers(&headers);
                    let Json(data) = data.map_err(map_json_rejection)?;
                    let params = params_for::<P>(&headers, query, "POST", &uri, uploads);

                    let svc = state.service()?;
                    let res = svc.create(request, data, params).await?;
                    Ok::<_, DeckAxumError>((StatusCode::CREATED, Json(res)))
                },
            ),
        )
        .route(
            "/{id}",
            routing::get(
                move |State(state): State<ServiceRoute<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<HashMap<String, String>>,
                      OriginalUri(uri): OriginalUri,
                      Path(id): Path<String>| async move {
                    let request = request_from_headers(&headers);
                    let params = params_for::<P>(&headers, query, "GET", &uri, Uploads::default());

                    let svc = state.service()?;
                    let res = svc.get(request, &id, params).await?;
                    Ok::<_, DeckAxumError>(Json(res))
                },
            )
            .put(
                move |State(state): State<ServiceRoute<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<HashMap<String, String>>,
                      OriginalUri(uri): OriginalUri,
                      Path(id): Path<String>,
                      uploads: Uploads,
                      data: Result<Json<R>, JsonRejection>| async move {
                    let request = request_from_headers(&headers);
                    let Json(data) = data.map_err(map_json_rejection)?;
                    let params = params_for::<P>(&headers, query, "PUT", &uri, uploads);

                    let svc = state.service()?;
                    let res = svc.update(request, &id, data, params).await?;
                    Ok::<_, DeckAxumError>(Json(res))
                },
            )
            .patch(
                move |State(state): State<ServiceRoute<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<HashMap<String, String>>,
                      OriginalUri(uri): OriginalUri,
                      Path(id): Path<String>,
                      uploads: Uploads,
                      data: Result<Json<R>, JsonRejection>| async move {
                    let request = request_from_headers(&headers);
                    let Json(data) = data.map_err(map_json_rejection)?;
                    let params = params_for::<P>(&headers, query, "PATCH", &uri, uploads);

                    let svc = state.service()?;
                    let res = svc.patch(request, &id, data, params).await?;
                    Ok::<_, DeckAxumError>(Json(res))
                },
            )
            .delete(
                move |State(state): State<ServiceRoute<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<HashMap<String, String>>,
                      OriginalUri(uri): OriginalUri,
                      Path(id): Path<String>| async move {
                    let request = request_from_headers(&headers);
                    let params = params_for::<P>(&headers, query, "DELETE", &uri, Uploads::default());

                    let svc = state.service()?;
                    let res = svc.remove(request, &id, params).await?;
                    Ok::<_, DeckAxumError>(Json(res))
                },
            ),
        )
        .with_state(state)
}

use std::net::IpAddr;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Path, RawQuery, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::debug;
use utoipa::{OpenApi, ToSchema};

use crate::auth::RequestParts;
use crate::error::IngestError;
use crate::gateway::{IngestRequest, IngestionGateway};

#[derive(OpenApi)]
#[openapi(
    paths(store_event, store_event_without_project),
    components(schemas(StoreResponse)),
    tags(
        (name = "ingest", description = "Sentry-compatible event admission")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<IngestionGateway>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StoreResponse {
    /// Normalized event id (32 lowercase hex characters)
    pub id: String,
}

pub fn configure_routes() -> Router<Arc<AppState>> {
    // Browser SDKs post cross-origin; origin policy is enforced per key
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    Router::new()
        .route("/{project_id}/store/", post(store_event))
        .route("/store/", post(store_event_without_project))
        // Bodies are bounded by the gateway's `max_event_size` instead
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
}

/// Submit an event for a project
#[utoipa::path(
    post,
    path = "/api/{project_id}/store/",
    params(
        ("project_id" = i32, Path, description = "Project ID")
    ),
    request_body(content = String, description = "Event JSON, optionally gzip/deflate or base64+zlib encoded"),
    responses(
        (status = 200, description = "Event accepted", body = StoreResponse),
        (status = 400, description = "Malformed request"),
        (status = 401, description = "Invalid api key"),
        (status = 403, description = "Origin not allowed"),
        (status = 413, description = "Event too large"),
        (status = 503, description = "Cache or queue unavailable"),
    ),
    tag = "ingest"
)]
async fn store_event(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<i32>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Body,
) -> impl IntoResponse {
    admit(&state, Some(project_id), query, headers, body).await
}

/// Submit an event, taking the project from the credentials
#[utoipa::path(
    post,
    path = "/api/store/",
    request_body(content = String, description = "Event JSON, optionally gzip/deflate or base64+zlib encoded"),
    responses(
        (status = 200, description = "Event accepted", body = StoreResponse),
        (status = 400, description = "Malformed request"),
        (status = 401, description = "Invalid api key"),
        (status = 403, description = "Origin not allowed"),
        (status = 413, description = "Event too large"),
        (status = 503, description = "Cache or queue unavailable"),
    ),
    tag = "ingest"
)]
async fn store_event_without_project(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Body,
) -> impl IntoResponse {
    admit(&state, None, query, headers, body).await
}

async fn admit(
    state: &AppState,
    project_id: Option<i32>,
    query: Option<String>,
    headers: HeaderMap,
    body: Body,
) -> axum::response::Response {
    let body = match read_body(body, state.gateway.config().max_event_size).await {
        Ok(body) => body,
        Err(e) => return e.into_response(),
    };

    let client_ip = client_ip(&headers);
    let parts = RequestParts::from_query_string(headers, query.as_deref()).with_client_ip(client_ip);
    let request = IngestRequest::new(parts, body).with_project_id(project_id);

    let outcome = state.gateway.process(request).await;
    match outcome.result {
        Ok(event) => (StatusCode::OK, Json(StoreResponse { id: event.event_id })).into_response(),
        Err(e) => {
            debug!(tags = ?outcome.context.tags, "Submission not admitted");
            e.into_response()
        }
    }
}

/// Collect the request body, refusing anything over `limit` bytes
async fn read_body(body: Body, limit: usize) -> Result<Bytes, IngestError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(IngestError::PayloadTooLarge { limit })
        }
        Err(e) => Err(IngestError::malformed(format!(
            "Failed to read request body: {}",
            e
        ))),
    }
}

/// Client address as reported by the fronting proxy
fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse().ok());

    forwarded.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok())
    })
}

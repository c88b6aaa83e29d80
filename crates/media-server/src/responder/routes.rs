/// Route handlers for the responder

use super::media::serve_media;
use super::types::*;
use crate::error::HttpError;
use crate::library::MediaLibrary;
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{Method, StatusCode, Uri},
    response::Json,
    routing::{get, post},
    Router,
};
use plainupnp_core::{CapabilityFilter, SelectionTarget, SharedServiceController};
use std::sync::Arc;
use tracing::{debug, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub controller: SharedServiceController,
    pub library: Arc<MediaLibrary>,
    /// Value of the `Server` header on media responses
    pub server_name: String,
}

impl AppState {
    pub fn new(controller: SharedServiceController, library: Arc<MediaLibrary>, server_name: impl Into<String>) -> Self {
        Self {
            controller,
            library,
            server_name: server_name.into(),
        }
    }
}

/// Create the responder router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/media/:file", get(serve_media).fallback(method_not_allowed))
        .route("/v1/devices", get(list_devices))
        .route("/v1/media", get(list_media))
        .route("/v1/selection", get(get_selections))
        .route("/v1/selection/:target/begin", post(begin_selection))
        .route("/v1/selection/:target/commit", post(commit_selection))
        .route("/v1/selection/:target/cancel", post(cancel_selection))
        .route("/v1/health", get(health_check))
        .fallback(not_found)
        .with_state(state)
}

fn parse_target(raw: &str) -> Result<SelectionTarget, HttpError> {
    raw.parse()
        .map_err(|_| HttpError::not_found(format!("Unknown selection target: {}", raw)))
}

/// GET /v1/devices - Filtered snapshot of the registry
async fn list_devices(
    State(state): State<AppState>,
    Query(query): Query<DeviceQuery>,
) -> Json<DevicesResponse> {
    debug!("GET /v1/devices (service={:?})", query.service);

    let filter = match query.service {
        Some(service) => CapabilityFilter::service(service),
        None => CapabilityFilter::accept_all(),
    };
    let listing = state.controller.registry().filtered_snapshot(&filter);

    Json(DevicesResponse {
        filter: filter.describe(),
        devices: listing.iter().map(DeviceInfo::from_device).collect(),
    })
}

/// POST /v1/selection/:target/begin - Start a selection cycle
async fn begin_selection(
    State(state): State<AppState>,
    Path(target): Path<String>,
    body: Bytes,
) -> Result<Json<ListingResponse>, HttpError> {
    let target = parse_target(&target)?;
    info!("POST /v1/selection/{}/begin", target);

    // An empty body selects the target's default filter
    let request: BeginSelectionRequest = if body.is_empty() {
        BeginSelectionRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| HttpError::bad_request(format!("Invalid selection request: {}", e)))?
    };

    let filter = match request.service {
        Some(service) => CapabilityFilter::service(service),
        None => target.default_filter(),
    };

    let listing = state
        .controller
        .selection(target)
        .begin_selection(&filter, move || debug!("{} selection completed", target));

    Ok(Json(ListingResponse {
        target,
        filter: filter.describe(),
        devices: listing
            .iter()
            .enumerate()
            .map(|(index, device)| DeviceInfo::indexed(index, device))
            .collect(),
    }))
}

/// POST /v1/selection/:target/commit - Pick an entry of the presented listing
async fn commit_selection(
    State(state): State<AppState>,
    Path(target): Path<String>,
    payload: Result<Json<CommitRequest>, JsonRejection>,
) -> Result<Json<CommitResponse>, HttpError> {
    let target = parse_target(&target)?;
    let Json(request) = payload.map_err(|rejection| HttpError::bad_request(rejection.body_text()))?;
    info!("POST /v1/selection/{}/commit: {}", target, request.index);

    let device = state.controller.selection(target).commit(request.index)?;

    Ok(Json(CommitResponse {
        target,
        device: DeviceInfo::from_device(&device),
    }))
}

/// POST /v1/selection/:target/cancel - Dismiss the presented listing
async fn cancel_selection(
    State(state): State<AppState>,
    Path(target): Path<String>,
) -> Result<StatusCode, HttpError> {
    let target = parse_target(&target)?;
    info!("POST /v1/selection/{}/cancel", target);

    state.controller.selection(target).cancel()?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/selection - Committed device per target
async fn get_selections(State(state): State<AppState>) -> Json<SelectionsResponse> {
    debug!("GET /v1/selection");

    let selections = SelectionTarget::ALL
        .into_iter()
        .map(|target| {
            let selection = state.controller.selection(target);
            SelectionStatus {
                target,
                presenting: selection.is_presenting(),
                selected: selection.selected().as_ref().map(DeviceInfo::from_device),
            }
        })
        .collect();

    Json(SelectionsResponse { selections })
}

/// GET /v1/media - Objects served under /media
async fn list_media(State(state): State<AppState>) -> Json<MediaResponse> {
    debug!("GET /v1/media");

    Json(MediaResponse {
        objects: state.library.iter().map(MediaInfo::from).collect(),
    })
}

/// GET /v1/health - Health check
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        devices: state.controller.registry().len(),
        media_objects: state.library.len(),
    })
}

async fn method_not_allowed(method: Method, uri: Uri) -> HttpError {
    HttpError::method_not_allowed(format!("{} is not supported on {}", method, uri.path()))
}

async fn not_found(uri: Uri) -> HttpError {
    HttpError::not_found(format!("No route for {}", uri.path()))
}

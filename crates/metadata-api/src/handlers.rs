use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /monitoredResource/{alias}`.
pub async fn get_monitored_resource(state: AppState, alias: String) -> Response {
    match lookup(state, alias).await {
        Ok(resource) => Json(resource).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn lookup(state: AppState, alias: String) -> Result<metadata_domain::MonitoredResource, ApiError> {
    if alias.is_empty() {
        return Err(ApiError::not_found("Not found"));
    }
    Ok(state.store.lookup_resource(&alias).await?)
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError { status: StatusCode::NOT_FOUND, message: msg.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "status_code": self.status.as_u16(), "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<metadata_store::StoreError> for ApiError {
    fn from(e: metadata_store::StoreError) -> Self {
        match e {
            metadata_store::StoreError::NotFound(_) => ApiError::not_found("Not found"),
            metadata_store::StoreError::EmptyAlias => ApiError::not_found("Not found"),
        }
    }
}

pub mod auth_handlers;
pub mod expense_handlers;
pub mod reminder_handlers;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::ValidationErrors;

/// Error response structure
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
        }
    }

    /// Build a JSON error response with the given status
    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

/// Turn validator errors into a 400 response listing every failed field
pub fn validation_error_response(errors: &ValidationErrors) -> Response {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .map(|(field, errors)| {
            let details: Vec<String> = errors
                .iter()
                .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                .collect();
            // Struct-level checks are reported under "__all__"
            if *field == "__all__" {
                details.join(", ")
            } else {
                format!("{}: {}", field, details.join(", "))
            }
        })
        .collect();
    messages.sort();

    ErrorResponse::new("validation_error", &messages.join("; "))
        .into_response_with(StatusCode::BAD_REQUEST)
}

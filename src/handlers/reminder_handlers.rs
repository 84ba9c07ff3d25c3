use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};

use crate::handlers::ErrorResponse;
use crate::models::reminder::{DueReminder, SweepReport};
use crate::services::reminder_service::{ReminderError, ReminderService};

/// Convert ReminderError to HTTP response
impl IntoResponse for ReminderError {
    fn into_response(self) -> Response {
        // The detail may carry database internals; keep it in the logs
        error!(error = %self, "Reminder request failed");
        ErrorResponse::new("reminder_error", "Reminder sweep failed")
            .into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Handler for triggering a reminder sweep
///
/// Runs one sweep immediately. If a scheduled sweep is in progress the
/// request waits for it and then sweeps whatever is still due.
#[utoipa::path(
    post,
    path = "/api/admin/reminders/run",
    responses(
        (status = 200, description = "Sweep completed", body = SweepReport),
        (status = 401, description = "Missing or invalid admin token", body = ErrorResponse),
        (status = 500, description = "Due set could not be loaded", body = ErrorResponse)
    ),
    security(
        ("admin_token" = [])
    ),
    tag = "reminders"
)]
pub async fn run_sweep_handler(
    State(reminder_service): State<Arc<dyn ReminderService>>,
) -> Result<Json<SweepReport>, Response> {
    match reminder_service.run_sweep(Utc::now()).await {
        Ok(report) => {
            info!(
                found = report.found,
                sent = report.sent,
                failed = report.failed,
                "Manual reminder sweep completed"
            );
            Ok(Json(report))
        }
        Err(e) => Err(e.into_response()),
    }
}

/// Handler for previewing the due set
///
/// Lists the reminders the next sweep would send, without sending them.
#[utoipa::path(
    get,
    path = "/api/admin/reminders/pending",
    responses(
        (status = 200, description = "Reminders currently due", body = Vec<DueReminder>),
        (status = 401, description = "Missing or invalid admin token", body = ErrorResponse),
        (status = 500, description = "Due set could not be loaded", body = ErrorResponse)
    ),
    security(
        ("admin_token" = [])
    ),
    tag = "reminders"
)]
pub async fn pending_reminders_handler(
    State(reminder_service): State<Arc<dyn ReminderService>>,
) -> Result<Json<Vec<DueReminder>>, Response> {
    match reminder_service.pending_reminders(Utc::now()).await {
        Ok(reminders) => Ok(Json(reminders)),
        Err(e) => Err(e.into_response()),
    }
}

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;
use validator::Validate;

use crate::handlers::{ErrorResponse, validation_error_response};
use crate::middleware::auth_middleware::AuthenticatedUser;
use crate::models::expense::{CreateExpenseRequest, Expense, UpdateExpenseRequest};
use crate::models::filters::ExpenseFilters;
use crate::services::expense_service::{ExpenseError, ExpenseService};

/// Convert ExpenseError to HTTP response
impl IntoResponse for ExpenseError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ExpenseError::InvalidAmount => (
                StatusCode::BAD_REQUEST,
                "invalid_amount",
                "Amount must be positive, at most 9999999999.99, with at most 2 decimal places",
            ),
            ExpenseError::ReminderAfterDueDate => (
                StatusCode::BAD_REQUEST,
                "invalid_reminder_date",
                "Reminder date must be on or before the due date",
            ),
            ExpenseError::ExpenseNotFound => (
                StatusCode::NOT_FOUND,
                "expense_not_found",
                "Expense not found",
            ),
            ExpenseError::Unauthorized => (
                StatusCode::FORBIDDEN,
                "unauthorized",
                "Unauthorized to access this expense",
            ),
            ExpenseError::DatabaseError(ref msg) => {
                error!(error = %msg, "Expense request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "Internal server error",
                )
            }
        };

        ErrorResponse::new(error_type, message).into_response_with(status)
    }
}

/// Handler for creating an expense
///
/// The reminder for the expense is sent on the first sweep on or after `reminder_date`.
#[utoipa::path(
    post,
    path = "/api/expenses",
    request_body = CreateExpenseRequest,
    responses(
        (status = 201, description = "Expense successfully created", body = Expense),
        (status = 400, description = "Validation error (non-positive amount, reminder after due date)", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "expenses"
)]
pub async fn create_expense_handler(
    State(expense_service): State<Arc<dyn ExpenseService>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Json(request): Json<CreateExpenseRequest>,
) -> Result<(StatusCode, Json<Expense>), Response> {
    if let Err(validation_errors) = request.validate() {
        return Err(validation_error_response(&validation_errors));
    }

    match expense_service
        .create_expense(auth_user.user_id, request)
        .await
    {
        Ok(expense) => Ok((StatusCode::CREATED, Json(expense))),
        Err(e) => Err(e.into_response()),
    }
}

/// Handler for listing expenses
///
/// Returns the authenticated user's expenses sorted by due date ascending.
#[utoipa::path(
    get,
    path = "/api/expenses",
    params(ExpenseFilters),
    responses(
        (status = 200, description = "List of expenses", body = Vec<Expense>),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "expenses"
)]
pub async fn list_expenses_handler(
    State(expense_service): State<Arc<dyn ExpenseService>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Query(filters): Query<ExpenseFilters>,
) -> Result<Json<Vec<Expense>>, Response> {
    match expense_service
        .list_expenses(auth_user.user_id, filters)
        .await
    {
        Ok(expenses) => Ok(Json(expenses)),
        Err(e) => Err(e.into_response()),
    }
}

/// Handler for fetching a single expense
#[utoipa::path(
    get,
    path = "/api/expenses/{id}",
    params(
        ("id" = Uuid, Path, description = "Expense ID")
    ),
    responses(
        (status = 200, description = "The expense", body = Expense),
        (status = 403, description = "User doesn't own the expense", body = ErrorResponse),
        (status = 404, description = "Expense not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "expenses"
)]
pub async fn get_expense_handler(
    State(expense_service): State<Arc<dyn ExpenseService>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(expense_id): Path<Uuid>,
) -> Result<Json<Expense>, Response> {
    match expense_service
        .get_expense(auth_user.user_id, expense_id)
        .await
    {
        Ok(expense) => Ok(Json(expense)),
        Err(e) => Err(e.into_response()),
    }
}

/// Handler for updating an expense
///
/// Moving `reminder_date` re-arms the reminder for this occurrence.
#[utoipa::path(
    put,
    path = "/api/expenses/{id}",
    params(
        ("id" = Uuid, Path, description = "Expense ID")
    ),
    request_body = UpdateExpenseRequest,
    responses(
        (status = 200, description = "Expense successfully updated", body = Expense),
        (status = 400, description = "Validation error (non-positive amount, reminder after due date)", body = ErrorResponse),
        (status = 403, description = "User doesn't own the expense", body = ErrorResponse),
        (status = 404, description = "Expense not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "expenses"
)]
pub async fn update_expense_handler(
    State(expense_service): State<Arc<dyn ExpenseService>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(expense_id): Path<Uuid>,
    Json(request): Json<UpdateExpenseRequest>,
) -> Result<Json<Expense>, Response> {
    if let Err(validation_errors) = request.validate() {
        return Err(validation_error_response(&validation_errors));
    }

    match expense_service
        .update_expense(auth_user.user_id, expense_id, request)
        .await
    {
        Ok(expense) => Ok(Json(expense)),
        Err(e) => Err(e.into_response()),
    }
}

/// Handler for toggling the paid flag of an expense
#[utoipa::path(
    post,
    path = "/api/expenses/{id}/paid",
    params(
        ("id" = Uuid, Path, description = "Expense ID")
    ),
    responses(
        (status = 200, description = "Paid flag toggled", body = Expense),
        (status = 403, description = "User doesn't own the expense", body = ErrorResponse),
        (status = 404, description = "Expense not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "expenses"
)]
pub async fn toggle_paid_handler(
    State(expense_service): State<Arc<dyn ExpenseService>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(expense_id): Path<Uuid>,
) -> Result<Json<Expense>, Response> {
    match expense_service
        .toggle_paid(auth_user.user_id, expense_id)
        .await
    {
        Ok(expense) => Ok(Json(expense)),
        Err(e) => Err(e.into_response()),
    }
}

/// Handler for deleting an expense
#[utoipa::path(
    delete,
    path = "/api/expenses/{id}",
    params(
        ("id" = Uuid, Path, description = "Expense ID")
    ),
    responses(
        (status = 204, description = "Expense successfully deleted"),
        (status = 403, description = "User doesn't own the expense", body = ErrorResponse),
        (status = 404, description = "Expense not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "expenses"
)]
pub async fn delete_expense_handler(
    State(expense_service): State<Arc<dyn ExpenseService>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(expense_id): Path<Uuid>,
) -> Result<StatusCode, Response> {
    match expense_service
        .delete_expense(auth_user.user_id, expense_id)
        .await
    {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(e.into_response()),
    }
}

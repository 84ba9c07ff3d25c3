use axum::{
    Router,
    extract::FromRef,
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::ErrorResponse;
use crate::handlers::auth_handlers::{login_handler, register_handler};
use crate::handlers::expense_handlers::{
    create_expense_handler, delete_expense_handler, get_expense_handler, list_expenses_handler,
    toggle_paid_handler, update_expense_handler,
};
use crate::handlers::reminder_handlers::{pending_reminders_handler, run_sweep_handler};
use crate::middleware::auth_middleware::{AdminToken, admin_middleware, auth_middleware};
use crate::models::auth::{AuthToken, LoginRequest};
use crate::models::expense::{CreateExpenseRequest, Expense, ExpenseCategory, UpdateExpenseRequest};
use crate::models::reminder::{DueReminder, SweepReport};
use crate::models::user::{CreateUserRequest, User};
use crate::services::auth_service::AuthService;
use crate::services::expense_service::ExpenseService;
use crate::services::reminder_service::ReminderService;

/// Services shared by every handler
#[derive(Clone, FromRef)]
pub struct AppState {
    pub auth_service: Arc<dyn AuthService>,
    pub expense_service: Arc<dyn ExpenseService>,
    pub reminder_service: Arc<dyn ReminderService>,
}

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::auth_handlers::register_handler,
        crate::handlers::auth_handlers::login_handler,
        crate::handlers::expense_handlers::create_expense_handler,
        crate::handlers::expense_handlers::list_expenses_handler,
        crate::handlers::expense_handlers::get_expense_handler,
        crate::handlers::expense_handlers::update_expense_handler,
        crate::handlers::expense_handlers::toggle_paid_handler,
        crate::handlers::expense_handlers::delete_expense_handler,
        crate::handlers::reminder_handlers::run_sweep_handler,
        crate::handlers::reminder_handlers::pending_reminders_handler,
    ),
    components(
        schemas(
            User, CreateUserRequest, LoginRequest, AuthToken, ErrorResponse,
            Expense, ExpenseCategory, CreateExpenseRequest, UpdateExpenseRequest,
            DueReminder, SweepReport
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Authentication endpoints"),
        (name = "expenses", description = "Expense management endpoints"),
        (name = "reminders", description = "Operator endpoints for the reminder engine")
    ),
    info(
        title = "Expense Reminder API",
        version = "0.1.0",
        description = "REST API for tracking expenses and emailing due-date reminders",
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "admin_token",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

/// Build the application router.
///
/// The reminder endpoints are only mounted when an admin token is configured.
pub fn build_router(state: AppState, admin_token: Option<String>) -> Router {
    let expense_routes = Router::new()
        .route(
            "/api/expenses",
            post(create_expense_handler).get(list_expenses_handler),
        )
        .route(
            "/api/expenses/{id}",
            get(get_expense_handler)
                .put(update_expense_handler)
                .delete(delete_expense_handler),
        )
        .route("/api/expenses/{id}/paid", post(toggle_paid_handler))
        .route_layer(middleware::from_fn_with_state(
            state.auth_service.clone(),
            auth_middleware,
        ));

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/api/auth/register", post(register_handler))
        .route("/api/auth/login", post(login_handler))
        .merge(expense_routes);

    if let Some(token) = admin_token {
        let admin_routes = Router::new()
            .route("/api/admin/reminders/run", post(run_sweep_handler))
            .route(
                "/api/admin/reminders/pending",
                get(pending_reminders_handler),
            )
            .route_layer(middleware::from_fn_with_state(
                AdminToken::new(token),
                admin_middleware,
            ));
        app = app.merge(admin_routes);
    }

    app.with_state(state)
        .merge(SwaggerUi::new("/api/docs").url("/api/docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

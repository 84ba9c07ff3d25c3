use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};

use expense_reminder::app::{AppState, build_router};
use expense_reminder::config::Config;
use expense_reminder::init_tracing;
use expense_reminder::repositories::expense_repository::PostgresExpenseRepository;
use expense_reminder::repositories::user_repository::PostgresUserRepository;
use expense_reminder::scheduler::ReminderScheduler;
use expense_reminder::services::auth_service::{AuthService, AuthServiceImpl};
use expense_reminder::services::expense_service::{ExpenseService, ExpenseServiceImpl};
use expense_reminder::services::notifier::notifier_from_config;
use expense_reminder::services::reminder_service::{ReminderService, ReminderServiceImpl};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    // Create database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    info!("Connected to database");

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations completed");

    // Initialize repositories
    let user_repository = Arc::new(PostgresUserRepository::new(pool.clone()));
    let expense_repository = Arc::new(PostgresExpenseRepository::new(pool.clone()));

    // Initialize services
    let notifier = notifier_from_config(&config.email)?;
    let auth_service: Arc<dyn AuthService> = Arc::new(AuthServiceImpl::new(
        user_repository,
        config.jwt_secret.clone(),
    ));
    let expense_service: Arc<dyn ExpenseService> =
        Arc::new(ExpenseServiceImpl::new(expense_repository.clone()));
    let reminder_service: Arc<dyn ReminderService> =
        Arc::new(ReminderServiceImpl::new(expense_repository, notifier));

    let scheduler = if config.scheduler.enabled {
        Some(ReminderScheduler::start(
            reminder_service.clone(),
            config.scheduler,
        ))
    } else {
        warn!("Reminder scheduler disabled; reminders only go out on manual runs");
        None
    };

    if config.admin_token.is_none() {
        info!("ADMIN_TOKEN not set; reminder admin routes are disabled");
    }

    let state = AppState {
        auth_service,
        expense_service,
        reminder_service,
    };
    let app = build_router(state, config.admin_token.clone());

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running on http://{}", addr);
    info!("API Docs: http://{}/api/docs", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(scheduler) = scheduler {
        scheduler.stop().await;
    }
    pool.close().await;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

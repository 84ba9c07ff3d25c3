use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use async_trait::async_trait;
use chrono::{Days, Months, NaiveDate, Utc};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use expense_reminder::app::{AppState, build_router};
use expense_reminder::repositories::memory::{InMemoryExpenseRepository, InMemoryUserRepository};
use expense_reminder::services::auth_service::AuthServiceImpl;
use expense_reminder::services::expense_service::ExpenseServiceImpl;
use expense_reminder::services::notifier::{
    DeliveryReceipt, Notifier, NotifierError, ReminderMessage,
};
use expense_reminder::services::reminder_service::ReminderServiceImpl;

const ADMIN_TOKEN: &str = "test-admin-token";

/// Notifier that records every reminder it is asked to send
#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<ReminderMessage>>,
}

impl RecordingNotifier {
    fn sent(&self) -> Vec<ReminderMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_reminder(
        &self,
        message: &ReminderMessage,
    ) -> Result<DeliveryReceipt, NotifierError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(message.clone());
        Ok(DeliveryReceipt {
            message_id: format!("test-{}", sent.len()),
        })
    }
}

/// Test fixture wiring the full router over in-memory storage
struct TestContext {
    app: Router,
    notifier: Arc<RecordingNotifier>,
    expenses: Arc<InMemoryExpenseRepository>,
}

impl TestContext {
    fn new() -> Self {
        Self::with_admin_token(Some(ADMIN_TOKEN))
    }

    fn with_admin_token(admin_token: Option<&str>) -> Self {
        let users = Arc::new(InMemoryUserRepository::new());
        let expenses = Arc::new(InMemoryExpenseRepository::new(users.clone()));
        let notifier = Arc::new(RecordingNotifier::default());

        let state = AppState {
            auth_service: Arc::new(
                AuthServiceImpl::new(users, "test_secret".to_string()).with_hash_cost(4),
            ),
            expense_service: Arc::new(ExpenseServiceImpl::new(expenses.clone())),
            reminder_service: Arc::new(ReminderServiceImpl::new(
                expenses.clone(),
                notifier.clone(),
            )),
        };

        Self {
            app: build_router(state, admin_token.map(str::to_string)),
            notifier,
            expenses,
        }
    }

    async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::String(
                String::from_utf8_lossy(&bytes).into_owned(),
            ))
        };

        (status, value)
    }

    /// Register a user and return a bearer token for them
    async fn user_token(&self, email: &str) -> String {
        let (status, _) = self
            .request(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({
                    "name": "Test User",
                    "email": email,
                    "password": "password123"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = self
            .request(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "email": email, "password": "password123" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        body["token"].as_str().unwrap().to_string()
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn expense_body(name: &str, due: NaiveDate, reminder: NaiveDate, recurring: bool) -> Value {
    json!({
        "name": name,
        "category": "utilities",
        "amount": 85.5,
        "due_date": due.to_string(),
        "reminder_date": reminder.to_string(),
        "recurring": recurring
    })
}

#[tokio::test]
async fn test_health_check() {
    let ctx = TestContext::new();

    let (status, body) = ctx.request("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".to_string()));
}

#[tokio::test]
async fn test_expense_routes_require_token() {
    let ctx = TestContext::new();

    let (status, _) = ctx.request("GET", "/api/expenses", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_and_list_expenses() {
    let ctx = TestContext::new();
    let token = ctx.user_token("owner@example.com").await;
    let due = today() + Days::new(10);

    let (status, created) = ctx
        .request(
            "POST",
            "/api/expenses",
            Some(&token),
            Some(expense_body("Electricity", due, due - Days::new(3), false)),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["notified"], false);
    assert_eq!(created["paid"], false);

    let (status, list) = ctx
        .request("GET", "/api/expenses?paid=false", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["id"], created["id"]);
}

#[tokio::test]
async fn test_reminder_after_due_date_is_rejected() {
    let ctx = TestContext::new();
    let token = ctx.user_token("owner@example.com").await;
    let due = today() + Days::new(10);

    let (status, body) = ctx
        .request(
            "POST",
            "/api/expenses",
            Some(&token),
            Some(expense_body("Electricity", due, due + Days::new(1), false)),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert!(ctx.expenses.all().unwrap().is_empty());
}

#[tokio::test]
async fn test_other_users_expense_is_forbidden() {
    let ctx = TestContext::new();
    let owner = ctx.user_token("owner@example.com").await;
    let intruder = ctx.user_token("intruder@example.com").await;
    let due = today() + Days::new(10);

    let (_, created) = ctx
        .request(
            "POST",
            "/api/expenses",
            Some(&owner),
            Some(expense_body("Rent", due, due, false)),
        )
        .await;
    let uri = format!("/api/expenses/{}", created["id"].as_str().unwrap());

    let (get_status, _) = ctx.request("GET", &uri, Some(&intruder), None).await;
    let (delete_status, _) = ctx.request("DELETE", &uri, Some(&intruder), None).await;

    assert_eq!(get_status, StatusCode::FORBIDDEN);
    assert_eq!(delete_status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_routes_require_admin_token() {
    let ctx = TestContext::new();
    let user = ctx.user_token("owner@example.com").await;

    let (missing, _) = ctx
        .request("POST", "/api/admin/reminders/run", None, None)
        .await;
    let (user_jwt, _) = ctx
        .request("POST", "/api/admin/reminders/run", Some(&user), None)
        .await;

    assert_eq!(missing, StatusCode::UNAUTHORIZED);
    assert_eq!(user_jwt, StatusCode::UNAUTHORIZED);
    assert!(ctx.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_admin_routes_absent_without_configured_token() {
    let ctx = TestContext::with_admin_token(None);

    let (status, _) = ctx
        .request("POST", "/api/admin/reminders/run", Some(ADMIN_TOKEN), None)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_manual_sweep_sends_due_reminders_once() {
    let ctx = TestContext::new();
    let token = ctx.user_token("owner@example.com").await;
    let due = today() + Days::new(3);
    let reminder = today() - Days::new(1);

    ctx.request(
        "POST",
        "/api/expenses",
        Some(&token),
        Some(expense_body("Internet", due, reminder, true)),
    )
    .await;
    ctx.request(
        "POST",
        "/api/expenses",
        Some(&token),
        Some(expense_body("Insurance", due, due, false)),
    )
    .await;

    let (status, pending) = ctx
        .request(
            "GET",
            "/api/admin/reminders/pending",
            Some(ADMIN_TOKEN),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending.as_array().unwrap().len(), 1);
    assert_eq!(pending[0]["name"], "Internet");

    let (status, report) = ctx
        .request("POST", "/api/admin/reminders/run", Some(ADMIN_TOKEN), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["found"], 1);
    assert_eq!(report["sent"], 1);
    assert_eq!(report["failed"], 0);
    assert_eq!(report["successors_created"], 1);

    let sent = ctx.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to_email, "owner@example.com");
    assert_eq!(sent[0].subject(), format!("Reminder: Internet due {}", due));

    // The successor is due next month, so nothing is pending now
    let (_, pending) = ctx
        .request(
            "GET",
            "/api/admin/reminders/pending",
            Some(ADMIN_TOKEN),
            None,
        )
        .await;
    assert!(pending.as_array().unwrap().is_empty());

    let (_, report) = ctx
        .request("POST", "/api/admin/reminders/run", Some(ADMIN_TOKEN), None)
        .await;
    assert_eq!(report["found"], 0);
    assert_eq!(ctx.notifier.sent().len(), 1);

    let (_, list) = ctx
        .request("GET", "/api/expenses?recurring=true", Some(&token), None)
        .await;
    let internet: Vec<&Value> = list
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["name"] == "Internet")
        .collect();
    assert_eq!(internet.len(), 2);
    assert_eq!(internet[0]["notified"], true);
    assert_eq!(internet[1]["notified"], false);
    assert_eq!(
        internet[1]["due_date"],
        (due + Months::new(1)).to_string()
    );
}

#[tokio::test]
async fn test_moving_reminder_date_rearms_reminder() {
    let ctx = TestContext::new();
    let token = ctx.user_token("owner@example.com").await;
    let due = today() + Days::new(5);

    let (_, created) = ctx
        .request(
            "POST",
            "/api/expenses",
            Some(&token),
            Some(expense_body("Gym", due, today(), false)),
        )
        .await;
    ctx.request("POST", "/api/admin/reminders/run", Some(ADMIN_TOKEN), None)
        .await;
    assert_eq!(ctx.notifier.sent().len(), 1);

    let uri = format!("/api/expenses/{}", created["id"].as_str().unwrap());
    let (status, updated) = ctx
        .request(
            "PUT",
            &uri,
            Some(&token),
            Some(json!({ "reminder_date": (today() - Days::new(1)).to_string() })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["notified"], false);

    let (_, report) = ctx
        .request("POST", "/api/admin/reminders/run", Some(ADMIN_TOKEN), None)
        .await;
    assert_eq!(report["sent"], 1);
    assert_eq!(ctx.notifier.sent().len(), 2);
}

#[tokio::test]
async fn test_amount_outside_column_range_is_rejected() {
    let ctx = TestContext::new();
    let token = ctx.user_token("owner@example.com").await;
    let due = today() + Days::new(10);

    for amount in [json!(0.001), json!(10000000000u64)] {
        let mut body = expense_body("Electricity", due, due, false);
        body["amount"] = amount;

        let (status, response) = ctx
            .request("POST", "/api/expenses", Some(&token), Some(body))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"], "validation_error");
    }
    assert!(ctx.expenses.all().unwrap().is_empty());
}

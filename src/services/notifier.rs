use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::config::EmailConfig;
use crate::models::expense::ExpenseCategory;
use crate::models::reminder::DueReminder;

/// Notifier errors; none of them are retried by the notifier itself
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("Email transport failed: {0}")]
    Transport(String),

    #[error("Email provider rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Unexpected email provider response: {0}")]
    InvalidResponse(String),
}

/// Proof of delivery returned by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub message_id: String,
}

/// A rendered reminder for one expense occurrence
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderMessage {
    pub to_email: String,
    pub owner_name: String,
    pub expense_name: String,
    pub amount: Decimal,
    pub category: ExpenseCategory,
    pub due_date: NaiveDate,
    /// The due date had already passed on the day the reminder went out
    pub overdue: bool,
}

impl ReminderMessage {
    pub fn for_due_reminder(reminder: &DueReminder, today: NaiveDate) -> Self {
        Self {
            to_email: reminder.owner_email.clone(),
            owner_name: reminder.owner_name.clone(),
            expense_name: reminder.name.clone(),
            amount: reminder.amount,
            category: reminder.category,
            due_date: reminder.due_date,
            overdue: reminder.due_date < today,
        }
    }

    pub fn subject(&self) -> String {
        let prefix = if self.overdue { "Overdue" } else { "Reminder" };
        format!("{}: {} due {}", prefix, self.expense_name, self.due_date)
    }

    pub fn text_body(&self) -> String {
        let lead = if self.overdue {
            "this payment is past its due date"
        } else {
            "this payment is coming up"
        };
        format!(
            "Hi {},\n\n{}:\n\n  Expense:  {}\n  Amount:   {:.2}\n  Category: {}\n  Due date: {}\n",
            self.owner_name,
            lead,
            self.expense_name,
            self.amount,
            self.category.label(),
            self.due_date
        )
    }

    pub fn html_body(&self) -> String {
        let lead = if self.overdue {
            "this payment is past its due date"
        } else {
            "this payment is coming up"
        };
        format!(
            "<p>Hi {},</p><p>{}:</p><table>\
             <tr><td>Expense</td><td><strong>{}</strong></td></tr>\
             <tr><td>Amount</td><td>{:.2}</td></tr>\
             <tr><td>Category</td><td>{}</td></tr>\
             <tr><td>Due date</td><td>{}</td></tr>\
             </table>",
            escape_html(&self.owner_name),
            lead,
            escape_html(&self.expense_name),
            self.amount,
            self.category.label(),
            self.due_date
        )
    }
}

fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Delivers reminder messages to an email address
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one reminder. A slow provider blocks until its own timeout fires.
    async fn send_reminder(
        &self,
        message: &ReminderMessage,
    ) -> Result<DeliveryReceipt, NotifierError>;
}

#[derive(Debug, Serialize)]
struct EmailPayload<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: String,
    text: String,
    html: String,
}

#[derive(Debug, Deserialize)]
struct EmailResponse {
    id: String,
}

/// Notifier backed by a JSON transactional email API
pub struct HttpEmailNotifier {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpEmailNotifier {
    pub fn new(
        api_url: String,
        api_key: String,
        from: String,
        timeout: Duration,
    ) -> Result<Self, NotifierError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifierError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            api_key,
            from,
        })
    }

    fn payload<'a>(&'a self, message: &'a ReminderMessage) -> EmailPayload<'a> {
        EmailPayload {
            from: &self.from,
            to: vec![message.to_email.as_str()],
            subject: message.subject(),
            text: message.text_body(),
            html: message.html_body(),
        }
    }
}

#[async_trait]
impl Notifier for HttpEmailNotifier {
    async fn send_reminder(
        &self,
        message: &ReminderMessage,
    ) -> Result<DeliveryReceipt, NotifierError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&self.payload(message))
            .send()
            .await
            .map_err(|e| NotifierError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifierError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: EmailResponse = response
            .json()
            .await
            .map_err(|e| NotifierError::InvalidResponse(e.to_string()))?;

        Ok(DeliveryReceipt {
            message_id: body.id,
        })
    }
}

/// Notifier that only writes the rendered reminder to the log
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_reminder(
        &self,
        message: &ReminderMessage,
    ) -> Result<DeliveryReceipt, NotifierError> {
        let message_id = format!("log-{}", Uuid::new_v4());
        info!(
            message_id = %message_id,
            to = %message.to_email,
            subject = %message.subject(),
            "Email delivery disabled, reminder logged instead"
        );
        Ok(DeliveryReceipt { message_id })
    }
}

/// Build the notifier selected by configuration
pub fn notifier_from_config(config: &EmailConfig) -> Result<Arc<dyn Notifier>, NotifierError> {
    match &config.api_key {
        Some(api_key) => Ok(Arc::new(HttpEmailNotifier::new(
            config.api_url.clone(),
            api_key.clone(),
            config.from.clone(),
            config.timeout,
        )?)),
        None => Ok(Arc::new(LogNotifier)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::State,
        http::{HeaderMap, StatusCode, header},
        routing::post,
    };
    use std::net::SocketAddr;
    use std::str::FromStr;
    use std::sync::Mutex;

    type SeenAuth = Arc<Mutex<Option<String>>>;

    async fn accept_email(
        State(seen): State<SeenAuth>,
        headers: HeaderMap,
    ) -> Json<serde_json::Value> {
        let auth = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        *seen.lock().unwrap() = auth;
        Json(serde_json::json!({ "id": "abc" }))
    }

    /// Local stand-in for the email API, returns its address and the last Authorization header
    async fn spawn_email_api() -> (SocketAddr, SeenAuth) {
        let seen = SeenAuth::default();
        let app = Router::new()
            .route("/emails", post(accept_email))
            .route(
                "/rejected",
                post(|| async { (StatusCode::UNPROCESSABLE_ENTITY, "invalid from address") }),
            )
            .route("/garbage", post(|| async { "not json" }))
            .with_state(seen.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (addr, seen)
    }

    fn http_notifier(url: String) -> HttpEmailNotifier {
        HttpEmailNotifier::new(
            url,
            "key".to_string(),
            "reminders@example.com".to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn message(overdue: bool) -> ReminderMessage {
        ReminderMessage {
            to_email: "jane@example.com".to_string(),
            owner_name: "Jane <Doe>".to_string(),
            expense_name: "Rent".to_string(),
            amount: Decimal::from_str("1200").unwrap(),
            category: ExpenseCategory::Housing,
            due_date: NaiveDate::from_str("2024-03-15").unwrap(),
            overdue,
        }
    }

    #[test]
    fn test_subject_for_upcoming_payment() {
        assert_eq!(message(false).subject(), "Reminder: Rent due 2024-03-15");
    }

    #[test]
    fn test_subject_for_overdue_payment() {
        assert_eq!(message(true).subject(), "Overdue: Rent due 2024-03-15");
    }

    #[test]
    fn test_text_body_lists_expense_details() {
        let body = message(false).text_body();
        assert!(body.contains("Amount:   1200.00"));
        assert!(body.contains("Category: Housing"));
        assert!(body.contains("Due date: 2024-03-15"));
    }

    #[test]
    fn test_html_body_escapes_user_input() {
        let body = message(false).html_body();
        assert!(body.contains("Jane &lt;Doe&gt;"));
        assert!(!body.contains("<Doe>"));
    }

    #[test]
    fn test_message_marks_overdue_when_due_date_passed() {
        let reminder = DueReminder {
            expense_id: Uuid::new_v4(),
            name: "Rent".to_string(),
            amount: Decimal::from_str("1200").unwrap(),
            category: ExpenseCategory::Housing,
            due_date: NaiveDate::from_str("2024-03-15").unwrap(),
            reminder_date: NaiveDate::from_str("2024-03-10").unwrap(),
            recurring: false,
            owner_name: "Jane".to_string(),
            owner_email: "jane@example.com".to_string(),
        };

        let on_time =
            ReminderMessage::for_due_reminder(&reminder, NaiveDate::from_str("2024-03-15").unwrap());
        let late =
            ReminderMessage::for_due_reminder(&reminder, NaiveDate::from_str("2024-03-16").unwrap());

        assert!(!on_time.overdue);
        assert!(late.overdue);
        assert_eq!(late.to_email, "jane@example.com");
    }

    #[test]
    fn test_http_payload_shape() {
        let notifier = HttpEmailNotifier::new(
            "http://localhost/emails".to_string(),
            "key".to_string(),
            "Reminders <reminders@example.com>".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();
        let message = message(false);

        let payload = serde_json::to_value(notifier.payload(&message)).unwrap();

        assert_eq!(payload["from"], "Reminders <reminders@example.com>");
        assert_eq!(payload["to"][0], "jane@example.com");
        assert_eq!(payload["subject"], "Reminder: Rent due 2024-03-15");
        assert!(payload["html"].as_str().unwrap().contains("Rent"));
    }

    #[tokio::test]
    async fn test_log_notifier_always_succeeds() {
        let receipt = LogNotifier.send_reminder(&message(false)).await.unwrap();
        assert!(receipt.message_id.starts_with("log-"));
    }

    #[tokio::test]
    async fn test_http_notifier_returns_provider_message_id() {
        let (addr, seen) = spawn_email_api().await;
        let notifier = http_notifier(format!("http://{}/emails", addr));

        let receipt = notifier.send_reminder(&message(false)).await.unwrap();

        assert_eq!(receipt.message_id, "abc");
        assert_eq!(seen.lock().unwrap().as_deref(), Some("Bearer key"));
    }

    #[tokio::test]
    async fn test_http_notifier_reports_rejection_with_body() {
        let (addr, _) = spawn_email_api().await;
        let notifier = http_notifier(format!("http://{}/rejected", addr));

        let result = notifier.send_reminder(&message(false)).await;

        match result {
            Err(NotifierError::Rejected { status, body }) => {
                assert_eq!(status, 422);
                assert_eq!(body, "invalid from address");
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_notifier_rejects_unparseable_response() {
        let (addr, _) = spawn_email_api().await;
        let notifier = http_notifier(format!("http://{}/garbage", addr));

        let result = notifier.send_reminder(&message(false)).await;

        assert!(matches!(result, Err(NotifierError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_http_notifier_reports_unreachable_provider() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let notifier = http_notifier(format!("http://{}/emails", addr));

        let result = notifier.send_reminder(&message(false)).await;

        assert!(matches!(result, Err(NotifierError::Transport(_))));
    }
}

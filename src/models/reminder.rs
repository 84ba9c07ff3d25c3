use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::expense::ExpenseCategory;

/// One row of the due set, joined with the owner's contact details
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow, PartialEq)]
pub struct DueReminder {
    pub expense_id: Uuid,
    pub name: String,
    pub amount: Decimal,
    pub category: ExpenseCategory,
    pub due_date: NaiveDate,
    pub reminder_date: NaiveDate,
    pub recurring: bool,
    pub owner_name: String,
    pub owner_email: String,
}

/// Counters produced by a single reminder sweep
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[schema(example = json!({
    "found": 3,
    "sent": 2,
    "failed": 1,
    "successors_created": 1
}))]
pub struct SweepReport {
    /// Size of the due set
    pub found: usize,
    /// Reminders delivered and marked as notified
    pub sent: usize,
    /// Reminders left unnotified for the next sweep
    pub failed: usize,
    /// Next-month occurrences inserted for recurring expenses
    pub successors_created: usize,
}

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::Type;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::validation::{validate_positive_amount, validate_reminder_window};

/// Fixed set of expense categories
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash, Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    Housing,
    Utilities,
    Insurance,
    Subscriptions,
    Loans,
    CreditCard,
    Transportation,
    Healthcare,
    Education,
    Groceries,
    Entertainment,
    Other,
}

impl ExpenseCategory {
    /// Human readable label used in reminder emails
    pub fn label(&self) -> &'static str {
        match self {
            ExpenseCategory::Housing => "Housing",
            ExpenseCategory::Utilities => "Utilities",
            ExpenseCategory::Insurance => "Insurance",
            ExpenseCategory::Subscriptions => "Subscriptions",
            ExpenseCategory::Loans => "Loans",
            ExpenseCategory::CreditCard => "Credit card",
            ExpenseCategory::Transportation => "Transportation",
            ExpenseCategory::Healthcare => "Healthcare",
            ExpenseCategory::Education => "Education",
            ExpenseCategory::Groceries => "Groceries",
            ExpenseCategory::Entertainment => "Entertainment",
            ExpenseCategory::Other => "Other",
        }
    }
}

/// One expense occurrence owned by a single user
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Expense {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub category: ExpenseCategory,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub reminder_date: NaiveDate,
    pub recurring: bool,
    /// Set once the reminder for this occurrence has been delivered
    pub notified: bool,
    pub paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values needed to insert a new expense row.
///
/// `notified` always starts false, so it is not part of the insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    pub user_id: Uuid,
    pub name: String,
    pub category: ExpenseCategory,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub reminder_date: NaiveDate,
    pub recurring: bool,
}

/// Column changes applied by a partial update. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpenseChanges {
    pub name: Option<String>,
    pub category: Option<ExpenseCategory>,
    pub amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub reminder_date: Option<NaiveDate>,
    pub recurring: Option<bool>,
    pub notified: Option<bool>,
}

impl ExpenseChanges {
    pub fn is_empty(&self) -> bool {
        *self == ExpenseChanges::default()
    }

    /// Apply the changes to an in-memory copy of the row
    pub fn apply_to(&self, expense: &mut Expense) {
        if let Some(name) = &self.name {
            expense.name = name.clone();
        }
        if let Some(category) = self.category {
            expense.category = category;
        }
        if let Some(amount) = self.amount {
            expense.amount = amount;
        }
        if let Some(due_date) = self.due_date {
            expense.due_date = due_date;
        }
        if let Some(reminder_date) = self.reminder_date {
            expense.reminder_date = reminder_date;
        }
        if let Some(recurring) = self.recurring {
            expense.recurring = recurring;
        }
        if let Some(notified) = self.notified {
            expense.notified = notified;
        }
    }
}

/// Request payload for creating a new expense
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_reminder_window"))]
#[schema(example = json!({
    "name": "Rent",
    "category": "housing",
    "amount": 1200.00,
    "due_date": "2024-03-15",
    "reminder_date": "2024-03-10",
    "recurring": true
}))]
pub struct CreateExpenseRequest {
    #[validate(length(min = 1, max = 120, message = "Name must be between 1 and 120 characters"))]
    pub name: String,

    pub category: ExpenseCategory,

    #[validate(custom(function = "validate_positive_amount"))]
    #[schema(minimum = 0.01, example = 1200.00)]
    pub amount: Decimal,

    #[schema(format = "date", example = "2024-03-15")]
    pub due_date: NaiveDate,

    #[schema(format = "date", example = "2024-03-10")]
    pub reminder_date: NaiveDate,

    #[schema(default = false)]
    pub recurring: Option<bool>,
}

/// Request payload for updating an existing expense
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "amount": 1250.00,
    "reminder_date": "2024-03-08"
}))]
pub struct UpdateExpenseRequest {
    #[validate(length(min = 1, max = 120, message = "Name must be between 1 and 120 characters"))]
    pub name: Option<String>,

    pub category: Option<ExpenseCategory>,

    #[validate(custom(function = "validate_positive_amount"))]
    #[schema(minimum = 0.01, example = 1250.00)]
    pub amount: Option<Decimal>,

    #[schema(format = "date", example = "2024-03-15")]
    pub due_date: Option<NaiveDate>,

    #[schema(format = "date", example = "2024-03-08")]
    pub reminder_date: Option<NaiveDate>,

    pub recurring: Option<bool>,
}

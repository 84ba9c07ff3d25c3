use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::models::expense::{
    CreateExpenseRequest, Expense, ExpenseChanges, NewExpense, UpdateExpenseRequest,
};
use crate::models::filters::ExpenseFilters;
use crate::repositories::RepositoryError;
use crate::repositories::expense_repository::ExpenseRepository;
use crate::validation::is_storable_amount;

/// Expense service errors
#[derive(Debug, thiserror::Error)]
pub enum ExpenseError {
    #[error("Invalid amount: must be positive with at most 2 decimal places")]
    InvalidAmount,

    #[error("Reminder date must be on or before the due date")]
    ReminderAfterDueDate,

    #[error("Expense not found")]
    ExpenseNotFound,

    #[error("Unauthorized to access this expense")]
    Unauthorized,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<RepositoryError> for ExpenseError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound => ExpenseError::ExpenseNotFound,
            RepositoryError::DatabaseError(msg) => ExpenseError::DatabaseError(msg),
            RepositoryError::ConstraintViolation(msg) => ExpenseError::DatabaseError(msg),
        }
    }
}

/// Trait defining expense service operations
#[async_trait]
pub trait ExpenseService: Send + Sync {
    /// Create a new expense
    async fn create_expense(
        &self,
        user_id: Uuid,
        request: CreateExpenseRequest,
    ) -> Result<Expense, ExpenseError>;

    /// List the user's expenses, sorted by due date ascending
    async fn list_expenses(
        &self,
        user_id: Uuid,
        filters: ExpenseFilters,
    ) -> Result<Vec<Expense>, ExpenseError>;

    /// Get a single expense owned by the user
    async fn get_expense(&self, user_id: Uuid, expense_id: Uuid) -> Result<Expense, ExpenseError>;

    /// Update an existing expense
    async fn update_expense(
        &self,
        user_id: Uuid,
        expense_id: Uuid,
        request: UpdateExpenseRequest,
    ) -> Result<Expense, ExpenseError>;

    /// Flip the paid flag of an expense
    async fn toggle_paid(&self, user_id: Uuid, expense_id: Uuid) -> Result<Expense, ExpenseError>;

    /// Delete an expense
    async fn delete_expense(&self, user_id: Uuid, expense_id: Uuid) -> Result<(), ExpenseError>;
}

/// Implementation of ExpenseService
pub struct ExpenseServiceImpl {
    expense_repository: Arc<dyn ExpenseRepository>,
}

impl ExpenseServiceImpl {
    pub fn new(expense_repository: Arc<dyn ExpenseRepository>) -> Self {
        Self { expense_repository }
    }

    /// Load an expense and verify the user owns it
    async fn owned_expense(&self, user_id: Uuid, expense_id: Uuid) -> Result<Expense, ExpenseError> {
        let expense = self
            .expense_repository
            .find_by_id(expense_id)
            .await?
            .ok_or(ExpenseError::ExpenseNotFound)?;

        if expense.user_id != user_id {
            return Err(ExpenseError::Unauthorized);
        }

        Ok(expense)
    }
}

/// Translate an update request into column changes.
///
/// A reminder date that differs from the stored one is a new notification
/// obligation, so `notified` goes back to false in the same write.
fn changes_for(existing: &Expense, request: UpdateExpenseRequest) -> ExpenseChanges {
    let reminder_moved = request
        .reminder_date
        .is_some_and(|date| date != existing.reminder_date);

    ExpenseChanges {
        name: request.name,
        category: request.category,
        amount: request.amount,
        due_date: request.due_date,
        reminder_date: request.reminder_date,
        recurring: request.recurring,
        notified: reminder_moved.then_some(false),
    }
}

#[async_trait]
impl ExpenseService for ExpenseServiceImpl {
    async fn create_expense(
        &self,
        user_id: Uuid,
        request: CreateExpenseRequest,
    ) -> Result<Expense, ExpenseError> {
        if !is_storable_amount(&request.amount) {
            return Err(ExpenseError::InvalidAmount);
        }

        if request.reminder_date > request.due_date {
            return Err(ExpenseError::ReminderAfterDueDate);
        }

        let expense = self
            .expense_repository
            .create(NewExpense {
                user_id,
                name: request.name,
                category: request.category,
                amount: request.amount,
                due_date: request.due_date,
                reminder_date: request.reminder_date,
                recurring: request.recurring.unwrap_or(false),
            })
            .await?;

        info!(expense_id = %expense.id, user_id = %user_id, "Expense created");
        Ok(expense)
    }

    async fn list_expenses(
        &self,
        user_id: Uuid,
        filters: ExpenseFilters,
    ) -> Result<Vec<Expense>, ExpenseError> {
        Ok(self.expense_repository.find_by_user(user_id, filters).await?)
    }

    async fn get_expense(&self, user_id: Uuid, expense_id: Uuid) -> Result<Expense, ExpenseError> {
        self.owned_expense(user_id, expense_id).await
    }

    async fn update_expense(
        &self,
        user_id: Uuid,
        expense_id: Uuid,
        request: UpdateExpenseRequest,
    ) -> Result<Expense, ExpenseError> {
        let existing = self.owned_expense(user_id, expense_id).await?;

        if request.amount.is_some_and(|amount| !is_storable_amount(&amount)) {
            return Err(ExpenseError::InvalidAmount);
        }

        // Check the merged dates, not just the submitted ones
        let due_date = request.due_date.unwrap_or(existing.due_date);
        let reminder_date = request.reminder_date.unwrap_or(existing.reminder_date);
        if reminder_date > due_date {
            return Err(ExpenseError::ReminderAfterDueDate);
        }

        let changes = changes_for(&existing, request);
        if changes.is_empty() {
            return Ok(existing);
        }

        let reset = changes.notified == Some(false) && existing.notified;
        let updated = self.expense_repository.update(expense_id, changes).await?;

        if reset {
            info!(expense_id = %expense_id, "Reminder date changed, reminder re-armed");
        }
        Ok(updated)
    }

    async fn toggle_paid(&self, user_id: Uuid, expense_id: Uuid) -> Result<Expense, ExpenseError> {
        let existing = self.owned_expense(user_id, expense_id).await?;

        let paid = !existing.paid;
        let paid_at = paid.then(Utc::now);

        Ok(self
            .expense_repository
            .set_paid(expense_id, paid, paid_at)
            .await?)
    }

    async fn delete_expense(&self, user_id: Uuid, expense_id: Uuid) -> Result<(), ExpenseError> {
        self.owned_expense(user_id, expense_id).await?;
        self.expense_repository.delete(expense_id).await?;

        info!(expense_id = %expense_id, "Expense deleted");
        Ok(())
    }
}

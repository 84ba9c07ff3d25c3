//! In-process repositories backed by `Mutex`-guarded collections.
//!
//! They honour the same ordering and ownership rules as the Postgres
//! repositories, which makes them usable for local runs and for tests
//! that exercise services without a database.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::models::expense::{Expense, ExpenseChanges, NewExpense};
use crate::models::filters::ExpenseFilters;
use crate::models::reminder::DueReminder;
use crate::models::user::User;
use crate::repositories::RepositoryError;
use crate::repositories::expense_repository::ExpenseRepository;
use crate::repositories::user_repository::UserRepository;

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::DatabaseError("in-memory store lock poisoned".to_string()))
}

/// In-memory implementation of UserRepository
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<Vec<User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let users = lock(&self.users)?;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(
        &self,
        name: String,
        email: String,
        password_hash: String,
    ) -> Result<User, RepositoryError> {
        let mut users = lock(&self.users)?;

        if users.iter().any(|u| u.email == email) {
            return Err(RepositoryError::ConstraintViolation(
                "Email already exists".to_string(),
            ));
        }

        let user = User {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            created_at: Utc::now(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let users = lock(&self.users)?;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }
}

/// In-memory implementation of ExpenseRepository.
///
/// Rows are kept in insertion order, which is the tie-breaker when two
/// expenses share a due date.
pub struct InMemoryExpenseRepository {
    users: Arc<InMemoryUserRepository>,
    expenses: Mutex<Vec<Expense>>,
}

impl InMemoryExpenseRepository {
    pub fn new(users: Arc<InMemoryUserRepository>) -> Self {
        Self {
            users,
            expenses: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of every stored row, in insertion order
    pub fn all(&self) -> Result<Vec<Expense>, RepositoryError> {
        Ok(lock(&self.expenses)?.clone())
    }

    fn modify<F>(&self, id: Uuid, change: F) -> Result<Expense, RepositoryError>
    where
        F: FnOnce(&mut Expense),
    {
        let mut expenses = lock(&self.expenses)?;
        let expense = expenses
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(RepositoryError::NotFound)?;
        change(expense);
        expense.updated_at = Utc::now();
        Ok(expense.clone())
    }
}

#[async_trait]
impl ExpenseRepository for InMemoryExpenseRepository {
    async fn create(&self, expense: NewExpense) -> Result<Expense, RepositoryError> {
        if self.users.find_by_id(expense.user_id)?.is_none() {
            return Err(RepositoryError::ConstraintViolation(
                "Owner does not exist".to_string(),
            ));
        }

        let now = Utc::now();
        let stored = Expense {
            id: Uuid::new_v4(),
            user_id: expense.user_id,
            name: expense.name,
            category: expense.category,
            amount: expense.amount,
            due_date: expense.due_date,
            reminder_date: expense.reminder_date,
            recurring: expense.recurring,
            notified: false,
            paid: false,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };

        lock(&self.expenses)?.push(stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Expense>, RepositoryError> {
        let expenses = lock(&self.expenses)?;
        Ok(expenses.iter().find(|e| e.id == id).cloned())
    }

    async fn find_by_user(
        &self,
        user_id: Uuid,
        filters: ExpenseFilters,
    ) -> Result<Vec<Expense>, RepositoryError> {
        let expenses = lock(&self.expenses)?;
        let mut matching: Vec<Expense> = expenses
            .iter()
            .filter(|e| e.user_id == user_id)
            .filter(|e| filters.matches_due_date(e.due_date))
            .filter(|e| filters.paid.is_none_or(|paid| e.paid == paid))
            .filter(|e| filters.recurring.is_none_or(|recurring| e.recurring == recurring))
            .cloned()
            .collect();

        matching.sort_by_key(|e| e.due_date);
        Ok(matching)
    }

    async fn update(&self, id: Uuid, changes: ExpenseChanges) -> Result<Expense, RepositoryError> {
        self.modify(id, |expense| changes.apply_to(expense))
    }

    async fn set_paid(
        &self,
        id: Uuid,
        paid: bool,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<Expense, RepositoryError> {
        self.modify(id, |expense| {
            expense.paid = paid;
            expense.paid_at = paid_at;
        })
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let mut expenses = lock(&self.expenses)?;
        let before = expenses.len();
        expenses.retain(|e| e.id != id);

        if expenses.len() == before {
            Err(RepositoryError::NotFound)
        } else {
            Ok(())
        }
    }

    async fn find_due_reminders(
        &self,
        as_of: NaiveDate,
    ) -> Result<Vec<DueReminder>, RepositoryError> {
        let expenses = lock(&self.expenses)?.clone();

        let mut due = Vec::new();
        for expense in expenses
            .into_iter()
            .filter(|e| !e.notified && e.reminder_date <= as_of)
        {
            // Inner join: rows without an owner are not reported
            let Some(owner) = self.users.find_by_id(expense.user_id)? else {
                continue;
            };
            due.push(DueReminder {
                expense_id: expense.id,
                name: expense.name,
                amount: expense.amount,
                category: expense.category,
                due_date: expense.due_date,
                reminder_date: expense.reminder_date,
                recurring: expense.recurring,
                owner_name: owner.name,
                owner_email: owner.email,
            });
        }

        due.sort_by_key(|d| d.due_date);
        Ok(due)
    }

    async fn mark_notified(
        &self,
        id: Uuid,
        reminder_date: NaiveDate,
    ) -> Result<bool, RepositoryError> {
        let mut expenses = lock(&self.expenses)?;
        match expenses
            .iter_mut()
            .find(|e| e.id == id && e.reminder_date == reminder_date)
        {
            Some(expense) => {
                expense.notified = true;
                expense.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn occurrence_exists(
        &self,
        user_id: Uuid,
        name: &str,
        due_date: NaiveDate,
    ) -> Result<bool, RepositoryError> {
        let expenses = lock(&self.expenses)?;
        Ok(expenses
            .iter()
            .any(|e| e.user_id == user_id && e.name == name && e.due_date == due_date))
    }

    async fn get_owner_id(&self, id: Uuid) -> Result<Option<Uuid>, RepositoryError> {
        let expenses = lock(&self.expenses)?;
        Ok(expenses.iter().find(|e| e.id == id).map(|e| e.user_id))
    }
}

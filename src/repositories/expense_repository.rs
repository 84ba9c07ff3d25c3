use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::expense::{Expense, ExpenseChanges, NewExpense};
use crate::models::filters::ExpenseFilters;
use crate::models::reminder::DueReminder;
use crate::repositories::RepositoryError;

const EXPENSE_COLUMNS: &str = "id, user_id, name, category, amount, due_date, reminder_date, \
     recurring, notified, paid, paid_at, created_at, updated_at";

/// Trait defining expense repository operations
#[async_trait]
pub trait ExpenseRepository: Send + Sync {
    /// Insert a new expense; `notified` and `paid` start false
    async fn create(&self, expense: NewExpense) -> Result<Expense, RepositoryError>;

    /// Find an expense by ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Expense>, RepositoryError>;

    /// Find all expenses for a user, sorted by due date ascending
    async fn find_by_user(
        &self,
        user_id: Uuid,
        filters: ExpenseFilters,
    ) -> Result<Vec<Expense>, RepositoryError>;

    /// Apply a partial update and return the stored row
    async fn update(&self, id: Uuid, changes: ExpenseChanges) -> Result<Expense, RepositoryError>;

    /// Set the payment state of an expense
    async fn set_paid(
        &self,
        id: Uuid,
        paid: bool,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<Expense, RepositoryError>;

    /// Delete an expense by ID
    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError>;

    /// Unnotified expenses whose reminder date is on or before `as_of`,
    /// ordered by due date ascending
    async fn find_due_reminders(
        &self,
        as_of: NaiveDate,
    ) -> Result<Vec<DueReminder>, RepositoryError>;

    /// Record that the reminder for this occurrence was delivered.
    ///
    /// Only marks the row while its reminder date still equals `reminder_date`;
    /// returns false when the row was rescheduled or deleted in the meantime.
    async fn mark_notified(
        &self,
        id: Uuid,
        reminder_date: NaiveDate,
    ) -> Result<bool, RepositoryError>;

    /// Whether the owner already has an occurrence with this name and due date
    async fn occurrence_exists(
        &self,
        user_id: Uuid,
        name: &str,
        due_date: NaiveDate,
    ) -> Result<bool, RepositoryError>;

    /// Owner of an expense, if the expense still exists
    async fn get_owner_id(&self, id: Uuid) -> Result<Option<Uuid>, RepositoryError>;
}

/// PostgreSQL implementation of ExpenseRepository
pub struct PostgresExpenseRepository {
    pool: PgPool,
}

impl PostgresExpenseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExpenseRepository for PostgresExpenseRepository {
    async fn create(&self, expense: NewExpense) -> Result<Expense, RepositoryError> {
        let now = Utc::now();
        let query = format!(
            r#"
            INSERT INTO expenses (
                id, user_id, name, category, amount, due_date, reminder_date,
                recurring, notified, paid, paid_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE, FALSE, NULL, $9, $9)
            RETURNING {EXPENSE_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Expense>(&query)
            .bind(Uuid::new_v4())
            .bind(expense.user_id)
            .bind(expense.name)
            .bind(expense.category)
            .bind(expense.amount)
            .bind(expense.due_date)
            .bind(expense.reminder_date)
            .bind(expense.recurring)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Expense>, RepositoryError> {
        let query = format!("SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = $1");

        sqlx::query_as::<_, Expense>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)
    }

    async fn find_by_user(
        &self,
        user_id: Uuid,
        filters: ExpenseFilters,
    ) -> Result<Vec<Expense>, RepositoryError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {EXPENSE_COLUMNS} FROM expenses WHERE user_id = "));
        builder.push_bind(user_id);

        if let Some(from) = filters.from {
            builder.push(" AND due_date >= ").push_bind(from);
        }
        if let Some(to) = filters.to {
            builder.push(" AND due_date <= ").push_bind(to);
        }
        if let Some(paid) = filters.paid {
            builder.push(" AND paid = ").push_bind(paid);
        }
        if let Some(recurring) = filters.recurring {
            builder.push(" AND recurring = ").push_bind(recurring);
        }

        builder.push(" ORDER BY due_date ASC, created_at ASC, id ASC");

        builder
            .build_query_as::<Expense>()
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)
    }

    async fn update(&self, id: Uuid, changes: ExpenseChanges) -> Result<Expense, RepositoryError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE expenses SET ");
        let mut assignments = builder.separated(", ");

        if let Some(name) = changes.name {
            assignments.push("name = ").push_bind_unseparated(name);
        }
        if let Some(category) = changes.category {
            assignments.push("category = ").push_bind_unseparated(category);
        }
        if let Some(amount) = changes.amount {
            assignments.push("amount = ").push_bind_unseparated(amount);
        }
        if let Some(due_date) = changes.due_date {
            assignments.push("due_date = ").push_bind_unseparated(due_date);
        }
        if let Some(reminder_date) = changes.reminder_date {
            assignments
                .push("reminder_date = ")
                .push_bind_unseparated(reminder_date);
        }
        if let Some(recurring) = changes.recurring {
            assignments.push("recurring = ").push_bind_unseparated(recurring);
        }
        if let Some(notified) = changes.notified {
            assignments.push("notified = ").push_bind_unseparated(notified);
        }
        assignments.push("updated_at = NOW()");

        builder.push(" WHERE id = ").push_bind(id);
        builder.push(format!(" RETURNING {EXPENSE_COLUMNS}"));

        builder
            .build_query_as::<Expense>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn set_paid(
        &self,
        id: Uuid,
        paid: bool,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<Expense, RepositoryError> {
        let query = format!(
            r#"
            UPDATE expenses
            SET paid = $2,
                paid_at = $3,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {EXPENSE_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Expense>(&query)
            .bind(id)
            .bind(paid)
            .bind(paid_at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM expenses
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Err(RepositoryError::NotFound)
        } else {
            Ok(())
        }
    }

    async fn find_due_reminders(
        &self,
        as_of: NaiveDate,
    ) -> Result<Vec<DueReminder>, RepositoryError> {
        sqlx::query_as::<_, DueReminder>(
            r#"
            SELECT
                e.id AS expense_id,
                e.name,
                e.amount,
                e.category,
                e.due_date,
                e.reminder_date,
                e.recurring,
                u.name AS owner_name,
                u.email AS owner_email
            FROM expenses e
            JOIN users u ON u.id = e.user_id
            WHERE e.reminder_date <= $1
                AND e.notified = FALSE
            ORDER BY e.due_date ASC, e.created_at ASC, e.id ASC
            "#,
        )
        .bind(as_of)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)
    }

    async fn mark_notified(
        &self,
        id: Uuid,
        reminder_date: NaiveDate,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE expenses
            SET notified = TRUE,
                updated_at = NOW()
            WHERE id = $1
                AND reminder_date = $2
            "#,
        )
        .bind(id)
        .bind(reminder_date)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn occurrence_exists(
        &self,
        user_id: Uuid,
        name: &str,
        due_date: NaiveDate,
    ) -> Result<bool, RepositoryError> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM expenses
                WHERE user_id = $1 AND name = $2 AND due_date = $3
            )
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(due_date)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)
    }

    async fn get_owner_id(&self, id: Uuid) -> Result<Option<Uuid>, RepositoryError> {
        sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM expenses WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)
    }
}

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::models::expense::Expense;
use crate::models::reminder::{DueReminder, SweepReport};
use crate::repositories::RepositoryError;
use crate::repositories::expense_repository::ExpenseRepository;
use crate::services::notifier::{Notifier, NotifierError, ReminderMessage};
use crate::services::recurrence::{RecurrenceError, next_occurrence};

/// Reminder service errors
#[derive(Debug, thiserror::Error)]
pub enum ReminderError {
    #[error("Failed to load due reminders: {0}")]
    DueSetQuery(String),
}

/// Why a single due reminder was left unnotified
#[derive(Debug, thiserror::Error)]
enum DeliveryError {
    #[error("notifier failed: {0}")]
    Notifier(#[from] NotifierError),

    #[error("sent but could not be marked notified: {0}")]
    MarkNotified(RepositoryError),
}

/// Why the next occurrence of a recurring expense was not created
#[derive(Debug, thiserror::Error)]
enum SuccessorError {
    #[error("expense no longer exists")]
    OwnerMissing,

    #[error(transparent)]
    Recurrence(#[from] RecurrenceError),

    #[error(transparent)]
    Store(#[from] RepositoryError),
}

/// Trait defining reminder engine operations
#[async_trait]
pub trait ReminderService: Send + Sync {
    /// Run one sweep as of `now`, waiting for a sweep already in progress to finish first
    async fn run_sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, ReminderError>;

    /// Run one sweep as of `now` unless another sweep is in progress, in which case `None`
    async fn try_run_sweep(
        &self,
        now: DateTime<Utc>,
    ) -> Option<Result<SweepReport, ReminderError>>;

    /// The due set a sweep started at `now` would process
    async fn pending_reminders(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<DueReminder>, ReminderError>;
}

/// Implementation of ReminderService.
///
/// Items are processed one at a time. `sweep_lock` keeps two sweeps from
/// reading the same unnotified row before either has marked it.
pub struct ReminderServiceImpl {
    expense_repository: Arc<dyn ExpenseRepository>,
    notifier: Arc<dyn Notifier>,
    sweep_lock: Mutex<()>,
}

impl ReminderServiceImpl {
    pub fn new(expense_repository: Arc<dyn ExpenseRepository>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            expense_repository,
            notifier,
            sweep_lock: Mutex::new(()),
        }
    }

    async fn load_due_set(&self, today: NaiveDate) -> Result<Vec<DueReminder>, ReminderError> {
        self.expense_repository
            .find_due_reminders(today)
            .await
            .map_err(|e| ReminderError::DueSetQuery(e.to_string()))
    }

    /// Caller must hold `sweep_lock`
    async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, ReminderError> {
        let today = now.date_naive();

        let due = match self.load_due_set(today).await {
            Ok(due) => due,
            Err(e) => {
                error!(%today, error = %e, "Reminder sweep aborted");
                return Err(e);
            }
        };

        let mut report = SweepReport {
            found: due.len(),
            ..SweepReport::default()
        };

        if due.is_empty() {
            debug!(%today, "No reminders due");
            return Ok(report);
        }

        info!(%today, found = report.found, "Processing due reminders");

        for reminder in &due {
            match self.deliver(reminder, today).await {
                Ok(marked) => {
                    report.sent += 1;
                    if marked && reminder.recurring && self.create_successor(reminder).await {
                        report.successors_created += 1;
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        expense_id = %reminder.expense_id,
                        error = %e,
                        "Reminder left pending for the next sweep"
                    );
                }
            }
        }

        info!(
            found = report.found,
            sent = report.sent,
            failed = report.failed,
            successors_created = report.successors_created,
            "Reminder sweep finished"
        );

        Ok(report)
    }

    /// Send the reminder, then mark it notified.
    ///
    /// Returns false when the expense was rescheduled or deleted while the
    /// message was in flight; the row then stays pending under its new date.
    async fn deliver(
        &self,
        reminder: &DueReminder,
        today: NaiveDate,
    ) -> Result<bool, DeliveryError> {
        let message = ReminderMessage::for_due_reminder(reminder, today);
        let receipt = self.notifier.send_reminder(&message).await?;

        let marked = self
            .expense_repository
            .mark_notified(reminder.expense_id, reminder.reminder_date)
            .await
            .map_err(DeliveryError::MarkNotified)?;

        if marked {
            info!(
                expense_id = %reminder.expense_id,
                message_id = %receipt.message_id,
                "Reminder sent"
            );
        } else {
            info!(
                expense_id = %reminder.expense_id,
                message_id = %receipt.message_id,
                "Reminder sent but expense changed meanwhile, left pending"
            );
        }
        Ok(marked)
    }

    /// Failures are logged and not retried; the notified flag stays set
    async fn create_successor(&self, reminder: &DueReminder) -> bool {
        match self.insert_successor(reminder).await {
            Ok(Some(next)) => {
                info!(
                    expense_id = %reminder.expense_id,
                    next_expense_id = %next.id,
                    due_date = %next.due_date,
                    "Created next recurring expense"
                );
                true
            }
            Ok(None) => {
                debug!(
                    expense_id = %reminder.expense_id,
                    "Next recurring expense already exists"
                );
                false
            }
            Err(e) => {
                error!(
                    expense_id = %reminder.expense_id,
                    error = %e,
                    "Failed to create next recurring expense"
                );
                false
            }
        }
    }

    /// `None` when a re-sent reminder finds its successor already in place
    async fn insert_successor(
        &self,
        reminder: &DueReminder,
    ) -> Result<Option<Expense>, SuccessorError> {
        let owner_id = self
            .expense_repository
            .get_owner_id(reminder.expense_id)
            .await?
            .ok_or(SuccessorError::OwnerMissing)?;

        let next = next_occurrence(reminder, owner_id)?;
        if self
            .expense_repository
            .occurrence_exists(next.user_id, &next.name, next.due_date)
            .await?
        {
            return Ok(None);
        }

        Ok(Some(self.expense_repository.create(next).await?))
    }
}

#[async_trait]
impl ReminderService for ReminderServiceImpl {
    async fn run_sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, ReminderError> {
        let _guard = self.sweep_lock.lock().await;
        self.sweep(now).await
    }

    async fn try_run_sweep(
        &self,
        now: DateTime<Utc>,
    ) -> Option<Result<SweepReport, ReminderError>> {
        let _guard = self.sweep_lock.try_lock().ok()?;
        Some(self.sweep(now).await)
    }

    async fn pending_reminders(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<DueReminder>, ReminderError> {
        self.load_due_set(now.date_naive()).await
    }
}

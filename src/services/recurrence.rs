use chrono::{Months, NaiveDate};
use uuid::Uuid;

use crate::models::expense::NewExpense;
use crate::models::reminder::DueReminder;

/// Errors raised while computing the next occurrence of a recurring expense
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RecurrenceError {
    #[error("Expense is not recurring")]
    NotRecurring,

    #[error("Date {0} cannot be advanced by one month")]
    DateOutOfRange(NaiveDate),
}

/// Advance a date by exactly one calendar month.
///
/// The day of month is preserved; when the target month is shorter the
/// result is clamped to its last day (Jan 31 -> Feb 28/29).
pub fn add_one_month(date: NaiveDate) -> Result<NaiveDate, RecurrenceError> {
    date.checked_add_months(Months::new(1))
        .ok_or(RecurrenceError::DateOutOfRange(date))
}

/// Build the successor occurrence of a notified recurring expense.
///
/// Due and reminder dates both move forward one month; everything else
/// is carried over and the successor starts unnotified.
pub fn next_occurrence(
    reminder: &DueReminder,
    owner_id: Uuid,
) -> Result<NewExpense, RecurrenceError> {
    if !reminder.recurring {
        return Err(RecurrenceError::NotRecurring);
    }

    Ok(NewExpense {
        user_id: owner_id,
        name: reminder.name.clone(),
        category: reminder.category,
        amount: reminder.amount,
        due_date: add_one_month(reminder.due_date)?,
        reminder_date: add_one_month(reminder.reminder_date)?,
        recurring: true,
    })
}

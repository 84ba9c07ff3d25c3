pub mod auth_service;
pub mod expense_service;
pub mod notifier;
pub mod recurrence;
pub mod reminder_service;

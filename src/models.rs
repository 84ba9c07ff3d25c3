pub mod auth;
pub mod expense;
pub mod filters;
pub mod reminder;
pub mod user;

pub use auth::{AuthToken, LoginRequest};
pub use expense::{
    CreateExpenseRequest, Expense, ExpenseCategory, ExpenseChanges, NewExpense,
    UpdateExpenseRequest,
};
pub use filters::ExpenseFilters;
pub use reminder::{DueReminder, SweepReport};
pub use user::{CreateUserRequest, User};

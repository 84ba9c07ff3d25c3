use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

/// Query parameters accepted by the expense listing endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExpenseFilters {
    /// Earliest due date to include
    pub from: Option<NaiveDate>,
    /// Latest due date to include
    pub to: Option<NaiveDate>,
    pub paid: Option<bool>,
    pub recurring: Option<bool>,
}

impl ExpenseFilters {
    /// Returns true when the due date lies inside the requested window
    pub fn matches_due_date(&self, due_date: NaiveDate) -> bool {
        self.from.is_none_or(|from| due_date >= from) && self.to.is_none_or(|to| due_date <= to)
    }
}

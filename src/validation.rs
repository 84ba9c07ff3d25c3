use rust_decimal::Decimal;
use validator::ValidationError;

use crate::models::expense::CreateExpenseRequest;

/// Largest amount the `NUMERIC(12, 2)` column holds
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

/// Amounts are stored with cents precision
const AMOUNT_SCALE: u32 = 2;

/// True when the amount is positive, has at most two decimal places and fits the column
pub fn is_storable_amount(amount: &Decimal) -> bool {
    *amount > Decimal::ZERO && amount.normalize().scale() <= AMOUNT_SCALE && *amount <= MAX_AMOUNT
}

/// Validates that an amount is positive (greater than 0) and storable as-is
pub fn validate_positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    let (code, message) = if *amount <= Decimal::ZERO {
        ("invalid_amount", "Amount must be greater than 0")
    } else if amount.normalize().scale() > AMOUNT_SCALE {
        ("invalid_amount_precision", "Amount must have at most 2 decimal places")
    } else if *amount > MAX_AMOUNT {
        ("amount_too_large", "Amount must not exceed 9999999999.99")
    } else {
        return Ok(());
    };

    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    Err(error)
}

/// Validates that the reminder fires on or before the due date
pub fn validate_reminder_window(request: &CreateExpenseRequest) -> Result<(), ValidationError> {
    if request.reminder_date > request.due_date {
        let mut error = ValidationError::new("invalid_reminder_date");
        error.message = Some("Reminder date must be on or before the due date".into());
        return Err(error);
    }
    Ok(())
}

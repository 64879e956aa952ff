// Inventory engine
pub mod cost_calculator;
pub mod reconciliation;
pub mod stock_ledger;
pub mod unit_conversion;

// Persistence-facing services
pub mod activity_materials;
pub mod ledger_writer;
pub mod materials;

use rust_decimal::Decimal;
use validator::ValidationError;

pub(crate) fn validate_positive_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if *value > Decimal::ZERO {
        Ok(())
    } else {
        let mut err = ValidationError::new("range");
        err.message = Some("Quantity must be greater than 0".into());
        Err(err)
    }
}

pub(crate) fn validate_non_negative_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if *value >= Decimal::ZERO {
        Ok(())
    } else {
        let mut err = ValidationError::new("range");
        err.message = Some("Value must not be negative".into());
        Err(err)
    }
}

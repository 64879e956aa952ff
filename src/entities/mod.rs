use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub mod activity_material;
pub mod expense;
pub mod material;
pub mod stock_movement;
pub mod unit_of_measure;

pub use unit_of_measure::UnitOfMeasure;

/// Largest value a `DECIMAL(16, 4)` quantity column can hold.
pub const MAX_STORED_QUANTITY: Decimal = dec!(999999999999.9999);

/// Fractional digits kept by quantity and money columns.
pub const STORED_SCALE: u32 = 4;

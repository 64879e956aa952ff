use crate::entities::material;
use crate::errors::ServiceError;
use rust_decimal::{Decimal, RoundingStrategy};

/// Money is kept to four decimal places, the precision of the ledger columns.
pub const MONEY_SCALE: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignmentCost {
    pub total_cost: Decimal,
    /// Cost of one unit of the quantity the caller typed.
    pub unit_display_price: Decimal,
}

impl AssignmentCost {
    pub const ZERO: Self = Self {
        total_cost: Decimal::ZERO,
        unit_display_price: Decimal::ZERO,
    };
}

pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Package price spread over the package content.
pub fn per_base_unit_price(material: &material::Model) -> Decimal {
    material.price_per_package / material.effective_content_per_package()
}

/// Price of `amount_base` base units, multiplying before dividing so whole
/// packages cost exactly the package price.
pub fn base_quantity_cost(
    material: &material::Model,
    amount_base: Decimal,
) -> Result<Decimal, ServiceError> {
    material
        .price_per_package
        .checked_mul(amount_base)
        .and_then(|gross| gross.checked_div(material.effective_content_per_package()))
        .map(round_money)
        .ok_or_else(|| {
            ServiceError::QuantityOutOfRange(format!(
                "{}: cost of {} base units overflows",
                material.name, amount_base
            ))
        })
}

pub fn unit_price(total: Decimal, quantity: Decimal) -> Decimal {
    if quantity > Decimal::ZERO {
        round_money(total / quantity)
    } else {
        Decimal::ZERO
    }
}

/// Cost booked when `amount_base` of `material` is assigned to an activity.
///
/// Tools cost nothing on assignment; they are charged through depreciation
/// and damage instead.
pub fn compute_assignment_cost(
    material: &material::Model,
    amount_base: Decimal,
    display_quantity: Decimal,
) -> Result<AssignmentCost, ServiceError> {
    if !material.is_consumable() {
        return Ok(AssignmentCost::ZERO);
    }
    let total_cost = base_quantity_cost(material, amount_base)?;
    Ok(AssignmentCost {
        total_cost,
        unit_display_price: unit_price(total_cost, display_quantity),
    })
}

/// Full price of the tool unit retired when a usage cycle completes.
pub fn depreciation_charge(material: &material::Model) -> Decimal {
    round_money(per_base_unit_price(material))
}

pub fn damage_charge(
    material: &material::Model,
    damaged_base: Decimal,
) -> Result<Decimal, ServiceError> {
    base_quantity_cost(material, damaged_base)
}

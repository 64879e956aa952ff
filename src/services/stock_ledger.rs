//! Stock ledger: in-memory mutations of a material's physical and usage counters.
//!
//! Every function validates before it mutates, so a returned error leaves the
//! material untouched. Persisting the result is the caller's job.

use crate::entities::{material, MAX_STORED_QUANTITY};
use crate::errors::ServiceError;
use rust_decimal::Decimal;

/// What a successful decrement requires the caller to record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecrementOutcome {
    pub must_log_egress: bool,
    pub must_charge_depreciation: bool,
    /// Physical units taken out of `quantity`.
    pub removed: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RevertOutcome {
    /// Physical units put back into `quantity`.
    pub restored: Decimal,
}

fn ensure_non_negative(amount_base: Decimal, operation: &str) -> Result<(), ServiceError> {
    if amount_base < Decimal::ZERO {
        return Err(ServiceError::InvalidInput(format!(
            "{} amount must not be negative, got {}",
            operation, amount_base
        )));
    }
    Ok(())
}

fn checked_stock_add(
    material: &material::Model,
    current: Decimal,
    amount: Decimal,
) -> Result<Decimal, ServiceError> {
    current
        .checked_add(amount)
        .filter(|total| *total <= MAX_STORED_QUANTITY)
        .ok_or_else(|| {
            ServiceError::QuantityOutOfRange(format!(
                "{}: {} + {} exceeds the storable maximum {}",
                material.name, current, amount, MAX_STORED_QUANTITY
            ))
        })
}

/// Takes `amount_base` out of a material for an assignment.
///
/// Consumables lose stock. Tools with a usage threshold accumulate uses and
/// retire one physical unit on the cycle that reaches the threshold, after
/// which the counter restarts at zero. Unlimited-use tools are untouched.
pub fn decrement_stock(
    material: &mut material::Model,
    amount_base: Decimal,
) -> Result<DecrementOutcome, ServiceError> {
    ensure_non_negative(amount_base, "decrement")?;

    if material.is_consumable() {
        if material.quantity < amount_base {
            return Err(ServiceError::InsufficientStock(format!(
                "{}: available {}, requested {}",
                material.name, material.quantity, amount_base
            )));
        }
        material.quantity -= amount_base;
        return Ok(DecrementOutcome {
            must_log_egress: !amount_base.is_zero(),
            must_charge_depreciation: false,
            removed: amount_base,
        });
    }

    let Some(threshold) = material.depreciation_threshold() else {
        return Ok(DecrementOutcome::default());
    };

    let uses = material.current_uses.checked_add(amount_base).ok_or_else(|| {
        ServiceError::QuantityOutOfRange(format!(
            "{}: usage counter overflow adding {}",
            material.name, amount_base
        ))
    })?;

    if uses < threshold {
        material.current_uses = uses;
        return Ok(DecrementOutcome::default());
    }

    if material.quantity < Decimal::ONE {
        return Err(ServiceError::InsufficientStock(format!(
            "{}: no unit left to retire after {} uses",
            material.name, uses
        )));
    }

    material.quantity -= Decimal::ONE;
    material.current_uses = Decimal::ZERO;
    Ok(DecrementOutcome {
        must_log_egress: true,
        must_charge_depreciation: true,
        removed: Decimal::ONE,
    })
}

/// Gives `amount_base` back to a material, undoing a decrement.
///
/// For tools the usage counter goes down; when it drops below zero whole
/// units are borrowed back into `quantity`, one threshold's worth of uses each.
pub fn revert_stock(
    material: &mut material::Model,
    amount_base: Decimal,
) -> Result<RevertOutcome, ServiceError> {
    ensure_non_negative(amount_base, "revert")?;

    if material.is_consumable() {
        material.quantity = checked_stock_add(material, material.quantity, amount_base)?;
        return Ok(RevertOutcome {
            restored: amount_base,
        });
    }

    let Some(threshold) = material.depreciation_threshold() else {
        return Ok(RevertOutcome::default());
    };

    let mut uses = material.current_uses - amount_base;
    let mut borrowed = Decimal::ZERO;
    if uses < Decimal::ZERO && material.quantity >= Decimal::ZERO {
        borrowed = (-uses / threshold).ceil();
        uses += borrowed * threshold;
    }
    let quantity = checked_stock_add(material, material.quantity, borrowed)?;

    material.quantity = quantity;
    material.current_uses = uses.max(Decimal::ZERO);
    Ok(RevertOutcome { restored: borrowed })
}

/// Marks `uses` as no longer in progress. The counter never goes below zero.
pub fn release_uses(material: &mut material::Model, uses: Decimal) -> Result<(), ServiceError> {
    ensure_non_negative(uses, "release")?;
    material.current_uses = (material.current_uses - uses).max(Decimal::ZERO);
    Ok(())
}

/// Permanently removes up to `units` from stock. Returns how many were removed.
pub fn retire_units(material: &mut material::Model, units: Decimal) -> Result<Decimal, ServiceError> {
    ensure_non_negative(units, "retire")?;
    let removed = units.min(material.quantity.max(Decimal::ZERO));
    material.quantity -= removed;
    Ok(removed)
}

/// Adds purchased or returned physical stock.
pub fn receive_stock(material: &mut material::Model, amount_base: Decimal) -> Result<(), ServiceError> {
    ensure_non_negative(amount_base, "receive")?;
    material.quantity = checked_stock_add(material, material.quantity, amount_base)?;
    Ok(())
}

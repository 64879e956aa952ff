//! Unit conversion table.
//!
//! Mass units convert to grams and volume units to milliliters through exact
//! decimal factors. Package units (box, sack, bag, bundle, roll, unit) carry no
//! factor: they count 1:1 among themselves and, for a material stocked by mass
//! or volume, resolve through the material's content per package.

use crate::entities::{
    material::{self, BaseUnit, ConsumptionType, ContentMeasureCategory},
    UnitOfMeasure, MAX_STORED_QUANTITY, STORED_SCALE,
};
use crate::errors::ServiceError;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

pub const GRAMS_PER_KILOGRAM: Decimal = dec!(1000);
pub const GRAMS_PER_GRAM: Decimal = dec!(1);
pub const GRAMS_PER_MILLIGRAM: Decimal = dec!(0.001);
pub const GRAMS_PER_POUND: Decimal = dec!(453.592);
pub const MILLILITERS_PER_LITER: Decimal = dec!(1000);
pub const MILLILITERS_PER_MILLILITER: Decimal = dec!(1);
pub const MILLILITERS_PER_CUBIC_CENTIMETER: Decimal = dec!(1);

impl UnitOfMeasure {
    /// Multiplicative factor against the unit's base (gram or milliliter).
    /// Package units have none.
    pub fn base_factor(&self) -> Option<Decimal> {
        match self {
            Self::Kilogram => Some(GRAMS_PER_KILOGRAM),
            Self::Gram => Some(GRAMS_PER_GRAM),
            Self::Milligram => Some(GRAMS_PER_MILLIGRAM),
            Self::Pound => Some(GRAMS_PER_POUND),
            Self::Liter => Some(MILLILITERS_PER_LITER),
            Self::Milliliter => Some(MILLILITERS_PER_MILLILITER),
            Self::CubicCentimeter => Some(MILLILITERS_PER_CUBIC_CENTIMETER),
            Self::Box | Self::Sack | Self::Bag | Self::Bundle | Self::Roll | Self::Unit => None,
        }
    }

    pub fn is_mass(&self) -> bool {
        matches!(
            self,
            Self::Kilogram | Self::Gram | Self::Milligram | Self::Pound
        )
    }

    pub fn is_volume(&self) -> bool {
        matches!(self, Self::Liter | Self::Milliliter | Self::CubicCentimeter)
    }

    pub fn is_package(&self) -> bool {
        matches!(
            self,
            Self::Box | Self::Sack | Self::Bag | Self::Bundle | Self::Roll | Self::Unit
        )
    }
}

pub fn is_mass_unit(unit: UnitOfMeasure) -> bool {
    unit.is_mass()
}

pub fn is_volume_unit(unit: UnitOfMeasure) -> bool {
    unit.is_volume()
}

pub fn is_package_unit(unit: UnitOfMeasure) -> bool {
    unit.is_package()
}

/// Parses a caller-supplied unit symbol.
///
/// Milligrams always resolve, even when written with a trailing period
/// ("mg.") that the regular lookup rejects.
pub fn parse_unit(symbol: &str) -> Result<UnitOfMeasure, ServiceError> {
    symbol.parse::<UnitOfMeasure>().or_else(|err| {
        let normalized = symbol.trim().trim_end_matches('.').to_lowercase();
        if normalized == "mg" {
            Ok(UnitOfMeasure::Milligram)
        } else {
            Err(err)
        }
    })
}

/// Converts `quantity` expressed in `unit` into the unit's base.
///
/// Package units pass through 1:1; resolving them against a material's
/// content is [`quantity_to_base`]'s job.
pub fn convert_to_base(quantity: Decimal, unit: UnitOfMeasure) -> Result<Decimal, ServiceError> {
    if unit.is_package() {
        return Ok(quantity);
    }
    let factor = unit
        .base_factor()
        .ok_or_else(|| ServiceError::UnsupportedUnit(unit.to_string()))?;
    quantity.checked_mul(factor).ok_or_else(|| {
        ServiceError::QuantityOutOfRange(format!("{} {} does not fit in base units", quantity, unit))
    })
}

/// Inverse of [`convert_to_base`] for units with a fixed factor.
pub fn convert_from_base(
    quantity_base: Decimal,
    unit: UnitOfMeasure,
) -> Result<Decimal, ServiceError> {
    let factor = unit
        .base_factor()
        .filter(|factor| !factor.is_zero())
        .ok_or_else(|| {
            ServiceError::UnsupportedUnit(format!("{} has no fixed base factor", unit))
        })?;
    quantity_base.checked_div(factor).ok_or_else(|| {
        ServiceError::QuantityOutOfRange(format!("{} cannot be expressed in {}", quantity_base, unit))
    })
}

/// `package_count` packages of `content_per_package` base units each.
pub fn resolve_package_quantity(
    package_count: Decimal,
    content_per_package: Decimal,
) -> Result<Decimal, ServiceError> {
    package_count.checked_mul(content_per_package).ok_or_else(|| {
        ServiceError::QuantityOutOfRange(format!(
            "{} packages of {} do not fit in base units",
            package_count, content_per_package
        ))
    })
}

/// Canonical stock unit for a new material. Fixed for the material's lifetime.
pub fn determine_base_unit(
    consumption_type: ConsumptionType,
    category: ContentMeasureCategory,
) -> BaseUnit {
    match (consumption_type, category) {
        (ConsumptionType::NonConsumable, _) => BaseUnit::Unit,
        (ConsumptionType::Consumable, ContentMeasureCategory::Mass) => BaseUnit::Gram,
        (ConsumptionType::Consumable, ContentMeasureCategory::Volume) => BaseUnit::Milliliter,
        (ConsumptionType::Consumable, ContentMeasureCategory::NotMeasured) => BaseUnit::Gram,
    }
}

/// Converts a quantity into a stock tracked in `base_unit`.
///
/// Package units resolve through `content_per_package` when the stock is
/// measured by mass or volume, and count 1:1 against a `UNIT` stock. Mass and
/// volume units only apply to stocks of the same dimension.
///
/// The result is rounded to [`STORED_SCALE`] places, midpoint away from zero,
/// and must not exceed [`MAX_STORED_QUANTITY`].
pub fn measure_to_base(
    base_unit: BaseUnit,
    content_per_package: Decimal,
    quantity: Decimal,
    unit: UnitOfMeasure,
) -> Result<Decimal, ServiceError> {
    if quantity.is_sign_negative() && !quantity.is_zero() {
        return Err(ServiceError::InvalidInput(format!(
            "quantity must not be negative, got {} {}",
            quantity, unit
        )));
    }

    let raw = if unit.is_package() {
        if base_unit.is_measured() {
            resolve_package_quantity(quantity, content_per_package)?
        } else {
            quantity
        }
    } else {
        let compatible = match base_unit {
            BaseUnit::Gram => unit.is_mass(),
            BaseUnit::Milliliter => unit.is_volume(),
            BaseUnit::Unit => false,
        };
        if !compatible {
            return Err(ServiceError::UnsupportedUnit(format!(
                "{} cannot measure a stock tracked in {}",
                unit,
                base_unit.as_unit()
            )));
        }
        convert_to_base(quantity, unit)?
    };

    let base = round_to_stored_scale(raw);
    if base > MAX_STORED_QUANTITY {
        return Err(ServiceError::QuantityOutOfRange(format!(
            "{} {} is {} {}, above the storable maximum {}",
            quantity,
            unit,
            base,
            base_unit.as_unit(),
            MAX_STORED_QUANTITY
        )));
    }
    Ok(base)
}

/// Rounds a base quantity to the scale its columns store.
pub fn round_to_stored_scale(quantity: Decimal) -> Decimal {
    quantity.round_dp_with_strategy(STORED_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Converts a quantity of `material` expressed in `unit` into its base unit.
pub fn quantity_to_base(
    material: &material::Model,
    quantity: Decimal,
    unit: UnitOfMeasure,
) -> Result<Decimal, ServiceError> {
    measure_to_base(
        material.base_unit,
        material.effective_content_per_package(),
        quantity,
        unit,
    )
}

use crate::errors::ServiceError;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Units a caller may express a material quantity in.
///
/// Mass and volume units convert through a fixed factor table; package units
/// (box, sack, bag, bundle, roll, unit) only resolve through a material's
/// content per package. Stored by symbol.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum UnitOfMeasure {
    #[sea_orm(string_value = "kg")]
    #[serde(rename = "kg")]
    Kilogram,
    #[sea_orm(string_value = "g")]
    #[serde(rename = "g")]
    Gram,
    #[sea_orm(string_value = "mg")]
    #[serde(rename = "mg")]
    Milligram,
    #[sea_orm(string_value = "lb")]
    #[serde(rename = "lb")]
    Pound,
    #[sea_orm(string_value = "L")]
    #[serde(rename = "L")]
    Liter,
    #[sea_orm(string_value = "ml")]
    #[serde(rename = "ml")]
    Milliliter,
    #[sea_orm(string_value = "cm3")]
    #[serde(rename = "cm3")]
    CubicCentimeter,
    #[sea_orm(string_value = "box")]
    #[serde(rename = "box")]
    Box,
    #[sea_orm(string_value = "sack")]
    #[serde(rename = "sack")]
    Sack,
    #[sea_orm(string_value = "bag")]
    #[serde(rename = "bag")]
    Bag,
    #[sea_orm(string_value = "bundle")]
    #[serde(rename = "bundle")]
    Bundle,
    #[sea_orm(string_value = "roll")]
    #[serde(rename = "roll")]
    Roll,
    #[sea_orm(string_value = "unit")]
    #[serde(rename = "unit")]
    Unit,
}

impl UnitOfMeasure {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Kilogram => "kg",
            Self::Gram => "g",
            Self::Milligram => "mg",
            Self::Pound => "lb",
            Self::Liter => "L",
            Self::Milliliter => "ml",
            Self::CubicCentimeter => "cm3",
            Self::Box => "box",
            Self::Sack => "sack",
            Self::Bag => "bag",
            Self::Bundle => "bundle",
            Self::Roll => "roll",
            Self::Unit => "unit",
        }
    }

    /// Exact lookup of a symbol or one of its accepted spellings.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let normalized = symbol.trim().to_lowercase();
        let unit = match normalized.as_str() {
            "kg" | "kgs" | "kilo" | "kilos" | "kilogram" | "kilograms" | "kilogramo"
            | "kilogramos" => Self::Kilogram,
            "g" | "gr" | "grs" | "gram" | "grams" | "gramo" | "gramos" => Self::Gram,
            "mg" | "milligram" | "milligrams" | "miligramo" | "miligramos" => Self::Milligram,
            "lb" | "lbs" | "pound" | "pounds" | "libra" | "libras" => Self::Pound,
            "l" | "lt" | "lts" | "liter" | "liters" | "litre" | "litres" | "litro" | "litros" => {
                Self::Liter
            }
            "ml" | "milliliter" | "milliliters" | "millilitre" | "millilitres" | "mililitro"
            | "mililitros" => Self::Milliliter,
            "cm3" | "cm³" | "cc" => Self::CubicCentimeter,
            "box" | "boxes" | "caja" | "cajas" => Self::Box,
            "sack" | "sacks" | "bulto" | "bultos" | "saco" | "sacos" => Self::Sack,
            "bag" | "bags" | "bolsa" | "bolsas" => Self::Bag,
            "bundle" | "bundles" | "paquete" | "paquetes" | "atado" | "atados" => Self::Bundle,
            "roll" | "rolls" | "rollo" | "rollos" => Self::Roll,
            "unit" | "units" | "u" | "und" | "unidad" | "unidades" => Self::Unit,
            _ => return None,
        };
        Some(unit)
    }
}

impl fmt::Display for UnitOfMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for UnitOfMeasure {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_symbol(s).ok_or_else(|| ServiceError::UnsupportedUnit(s.trim().to_string()))
    }
}

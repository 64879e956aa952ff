use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether assigning a material physically removes it from stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsumptionType {
    #[sea_orm(string_value = "CONSUMABLE")]
    Consumable,
    /// Tools and equipment: marked in use, depreciated by usage cycles.
    #[sea_orm(string_value = "NON_CONSUMABLE")]
    NonConsumable,
}

/// What a package of the material contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum ContentMeasureCategory {
    #[sea_orm(string_value = "MASS")]
    #[serde(rename = "MASS")]
    Mass,
    #[sea_orm(string_value = "VOLUME")]
    #[serde(rename = "VOLUME")]
    Volume,
    #[sea_orm(string_value = "NONE")]
    #[serde(rename = "NONE")]
    NotMeasured,
}

/// Canonical unit a material's stock is stored in. Fixed at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BaseUnit {
    #[sea_orm(string_value = "GRAM")]
    Gram,
    #[sea_orm(string_value = "MILLILITER")]
    Milliliter,
    #[sea_orm(string_value = "UNIT")]
    Unit,
}

impl BaseUnit {
    pub fn as_unit(&self) -> super::UnitOfMeasure {
        match self {
            BaseUnit::Gram => super::UnitOfMeasure::Gram,
            BaseUnit::Milliliter => super::UnitOfMeasure::Milliliter,
            BaseUnit::Unit => super::UnitOfMeasure::Unit,
        }
    }

    /// Gram and milliliter stocks are measured; package units resolve against them.
    pub fn is_measured(&self) -> bool {
        matches!(self, BaseUnit::Gram | BaseUnit::Milliliter)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "materials")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub consumption_type: ConsumptionType,
    pub content_measure_category: ContentMeasureCategory,
    pub base_unit: BaseUnit,
    /// Always in `base_unit`.
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub quantity: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub price_per_package: Decimal,
    /// Base units per package. Unset means one.
    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub content_per_package: Option<Decimal>,
    /// Non-consumables only. Unset means unlimited uses and no depreciation.
    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub total_uses_per_unit: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub current_uses: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn is_consumable(&self) -> bool {
        self.consumption_type == ConsumptionType::Consumable
    }

    /// Usage threshold that retires one unit, when the material depreciates.
    pub fn depreciation_threshold(&self) -> Option<Decimal> {
        match self.consumption_type {
            ConsumptionType::NonConsumable => {
                self.total_uses_per_unit.filter(|total| *total > Decimal::ZERO)
            }
            ConsumptionType::Consumable => None,
        }
    }

    /// Content per package with the default of one applied.
    pub fn effective_content_per_package(&self) -> Decimal {
        self.content_per_package
            .filter(|content| *content > Decimal::ZERO)
            .unwrap_or(Decimal::ONE)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::activity_material::Entity")]
    ActivityMaterial,
    #[sea_orm(has_many = "super::stock_movement::Entity")]
    StockMovement,
}

impl Related<super::activity_material::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ActivityMaterial.def()
    }
}

impl Related<super::stock_movement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockMovement.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();
        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }
        active_model.updated_at = Set(now);
        Ok(active_model)
    }
}

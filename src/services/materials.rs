use crate::{
    db::{transaction, DbPool},
    entities::{
        material::{self, ConsumptionType, ContentMeasureCategory, Entity as Material},
        stock_movement::{self, Entity as StockMovement},
        UnitOfMeasure, MAX_STORED_QUANTITY,
    },
    errors::ServiceError,
    services::{
        ledger_writer::{self, LedgerContext, MovementDraft},
        stock_ledger,
        unit_conversion::{determine_base_unit, measure_to_base, quantity_to_base},
        validate_non_negative_decimal,
    },
};
use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Input for registering a new material.
///
/// `quantity` is the opening stock expressed in `unit`. `content_per_package`
/// is expressed in `content_unit` (defaults to the material's base unit) and
/// is stored converted to base units.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewMaterial {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub consumption_type: ConsumptionType,
    pub content_measure_category: ContentMeasureCategory,
    #[validate(custom = "validate_non_negative_decimal")]
    pub quantity: Decimal,
    pub unit: UnitOfMeasure,
    #[validate(custom = "validate_non_negative_decimal")]
    pub price_per_package: Decimal,
    pub content_per_package: Option<Decimal>,
    pub content_unit: Option<UnitOfMeasure>,
    pub total_uses_per_unit: Option<Decimal>,
}

impl NewMaterial {
    fn validate_optional_fields(&self) -> Result<(), ServiceError> {
        if let Some(content) = self.content_per_package {
            if content <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "content_per_package must be greater than 0".to_string(),
                ));
            }
        }
        if let Some(total_uses) = self.total_uses_per_unit {
            if self.consumption_type == ConsumptionType::Consumable {
                return Err(ServiceError::ValidationError(
                    "total_uses_per_unit only applies to non-consumable materials".to_string(),
                ));
            }
            if total_uses <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "total_uses_per_unit must be greater than 0".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Service for the material catalogue and its stock levels
#[derive(Clone)]
pub struct MaterialService {
    db_pool: Arc<DbPool>,
}

impl MaterialService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Registers a material, fixing its base unit and opening stock.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn register_material(
        &self,
        input: NewMaterial,
        actor_id: Option<Uuid>,
    ) -> Result<material::Model, ServiceError> {
        input.validate()?;
        input.validate_optional_fields()?;

        let base_unit = determine_base_unit(input.consumption_type, input.content_measure_category);
        let content_per_package = match input.content_per_package {
            Some(content) => {
                let content_unit = input.content_unit.unwrap_or_else(|| base_unit.as_unit());
                Some(measure_to_base(base_unit, Decimal::ONE, content, content_unit)?)
            }
            None => None,
        };
        let effective_content = content_per_package
            .filter(|content| *content > Decimal::ZERO)
            .unwrap_or(Decimal::ONE);
        let opening_stock = measure_to_base(base_unit, effective_content, input.quantity, input.unit)?;
        if opening_stock > MAX_STORED_QUANTITY {
            return Err(ServiceError::QuantityOutOfRange(format!(
                "{}: opening stock {} exceeds the storable maximum {}",
                input.name, opening_stock, MAX_STORED_QUANTITY
            )));
        }

        let now = Utc::now();
        let new_material = material::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            consumption_type: Set(input.consumption_type),
            content_measure_category: Set(input.content_measure_category),
            base_unit: Set(base_unit),
            quantity: Set(opening_stock),
            price_per_package: Set(input.price_per_package),
            content_per_package: Set(content_per_package),
            total_uses_per_unit: Set(input.total_uses_per_unit),
            current_uses: Set(Decimal::ZERO),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let txn = transaction::begin(&self.db_pool).await?;
        let result: Result<material::Model, ServiceError> = async {
            let created = new_material.insert(&txn).await.map_err(ServiceError::db_error)?;
            if created.quantity > Decimal::ZERO {
                ledger_writer::record_movement(
                    &txn,
                    &LedgerContext::standalone(actor_id),
                    MovementDraft::ingress(created.id, created.quantity, "initial stock"),
                )
                .await?;
            }
            Ok(created)
        }
        .await;
        let created = transaction::finish(txn, result, "register_material").await?;

        counter!("farm_inventory.materials_registered", 1);
        info!(
            material_id = %created.id,
            base_unit = ?created.base_unit,
            quantity = %created.quantity,
            "material registered"
        );
        Ok(created)
    }

    /// Books a purchase or restock of `quantity` `unit` into the material.
    #[instrument(skip(self))]
    pub async fn receive_stock(
        &self,
        material_id: Uuid,
        quantity: Decimal,
        unit: UnitOfMeasure,
        actor_id: Option<Uuid>,
    ) -> Result<material::Model, ServiceError> {
        if quantity <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "received quantity must be greater than 0".to_string(),
            ));
        }

        let txn = transaction::begin(&self.db_pool).await?;
        let result: Result<material::Model, ServiceError> = async {
            let mut material = find_material_for_update(&txn, material_id).await?;
            let amount_base = quantity_to_base(&material, quantity, unit)?;
            stock_ledger::receive_stock(&mut material, amount_base)?;
            let updated = persist_stock_levels(&txn, &material).await?;
            ledger_writer::record_movement(
                &txn,
                &LedgerContext::standalone(actor_id),
                MovementDraft::ingress(
                    material_id,
                    amount_base,
                    format!("stock received: {} {}", quantity.normalize(), unit),
                ),
            )
            .await?;
            Ok(updated)
        }
        .await;
        let updated = transaction::finish(txn, result, "receive_stock").await?;

        counter!("farm_inventory.stock_received", 1);
        info!(material_id = %material_id, quantity = %updated.quantity, "stock received");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn get_material(&self, material_id: Uuid) -> Result<material::Model, ServiceError> {
        Material::find_by_id(material_id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or(ServiceError::MaterialNotFound(material_id))
    }

    /// Audit trail of a material, oldest first.
    #[instrument(skip(self))]
    pub async fn list_movements(
        &self,
        material_id: Uuid,
    ) -> Result<Vec<stock_movement::Model>, ServiceError> {
        StockMovement::find()
            .filter(stock_movement::Column::MaterialId.eq(material_id))
            .order_by_asc(stock_movement::Column::CreatedAt)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }
}

/// Reads a material and locks its row for the rest of the transaction.
pub async fn find_material_for_update<C: ConnectionTrait>(
    db: &C,
    material_id: Uuid,
) -> Result<material::Model, ServiceError> {
    Material::find_by_id(material_id)
        .lock_exclusive()
        .one(db)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or(ServiceError::MaterialNotFound(material_id))
}

/// Writes back the counters the stock ledger mutates.
pub async fn persist_stock_levels<C: ConnectionTrait>(
    db: &C,
    material: &material::Model,
) -> Result<material::Model, ServiceError> {
    let mut active: material::ActiveModel = material.clone().into();
    active.quantity = Set(material.quantity);
    active.current_uses = Set(material.current_uses);
    active.update(db).await.map_err(ServiceError::db_error)
}

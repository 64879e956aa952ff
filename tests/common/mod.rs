#![allow(dead_code)]

use std::sync::Arc;

use farm_inventory::{
    db::{self, DbConfig, DbPool},
    entities::{
        material::{self, ConsumptionType, ContentMeasureCategory},
        UnitOfMeasure,
    },
    services::materials::NewMaterial,
    ActivityMaterialService, MaterialService,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Services wired to a fresh, migrated in-memory SQLite database.
pub struct TestEnv {
    pub db: Arc<DbPool>,
    pub materials: MaterialService,
    pub activities: ActivityMaterialService,
}

impl TestEnv {
    pub async fn new() -> Self {
        let pool = db::establish_connection_with_config(&DbConfig::in_memory())
            .await
            .expect("failed to open in-memory database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations");
        let db = Arc::new(pool);
        Self {
            materials: MaterialService::new(db.clone()),
            activities: ActivityMaterialService::new(db.clone()),
            db,
        }
    }

    /// 50 kg sacks of fertilizer at 50000 each, `sacks` in stock.
    pub async fn fertilizer(&self, sacks: Decimal) -> material::Model {
        self.materials
            .register_material(
                NewMaterial {
                    name: "Fertilizer NPK".to_string(),
                    consumption_type: ConsumptionType::Consumable,
                    content_measure_category: ContentMeasureCategory::Mass,
                    quantity: sacks,
                    unit: UnitOfMeasure::Sack,
                    price_per_package: dec!(50000),
                    content_per_package: Some(dec!(50)),
                    content_unit: Some(UnitOfMeasure::Kilogram),
                    total_uses_per_unit: None,
                },
                None,
            )
            .await
            .expect("failed to register fertilizer")
    }

    /// 1 L bottles of herbicide at 2000 each, `liters` in stock.
    pub async fn herbicide(&self, liters: Decimal) -> material::Model {
        self.materials
            .register_material(
                NewMaterial {
                    name: "Herbicide".to_string(),
                    consumption_type: ConsumptionType::Consumable,
                    content_measure_category: ContentMeasureCategory::Volume,
                    quantity: liters,
                    unit: UnitOfMeasure::Liter,
                    price_per_package: dec!(2000),
                    content_per_package: Some(dec!(1000)),
                    content_unit: None,
                    total_uses_per_unit: None,
                },
                None,
            )
            .await
            .expect("failed to register herbicide")
    }

    /// Machetes worth 300 each, retired after `uses` uses.
    pub async fn machete(&self, units: Decimal, uses: Decimal) -> material::Model {
        self.materials
            .register_material(
                NewMaterial {
                    name: "Machete".to_string(),
                    consumption_type: ConsumptionType::NonConsumable,
                    content_measure_category: ContentMeasureCategory::NotMeasured,
                    quantity: units,
                    unit: UnitOfMeasure::Unit,
                    price_per_package: dec!(300),
                    content_per_package: None,
                    content_unit: None,
                    total_uses_per_unit: Some(uses),
                },
                None,
            )
            .await
            .expect("failed to register machete")
    }

    pub async fn stock_of(&self, material_id: uuid::Uuid) -> material::Model {
        self.materials
            .get_material(material_id)
            .await
            .expect("material should exist")
    }
}

mod common;

use assert_matches::assert_matches;
use common::TestEnv;
use farm_inventory::{
    entities::{
        material::{BaseUnit, ConsumptionType, ContentMeasureCategory},
        stock_movement::MovementType,
        UnitOfMeasure,
    },
    services::materials::NewMaterial,
    ServiceError,
};
use rstest::rstest;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn seed_material(name: &str) -> NewMaterial {
    NewMaterial {
        name: name.to_string(),
        consumption_type: ConsumptionType::Consumable,
        content_measure_category: ContentMeasureCategory::Mass,
        quantity: dec!(2),
        unit: UnitOfMeasure::Kilogram,
        price_per_package: dec!(8000),
        content_per_package: Some(dec!(1)),
        content_unit: Some(UnitOfMeasure::Kilogram),
        total_uses_per_unit: None,
    }
}

#[tokio::test]
async fn registration_fixes_base_unit_and_opening_stock() {
    let env = TestEnv::new().await;
    let fertilizer = env.fertilizer(dec!(4)).await;

    assert_eq!(fertilizer.base_unit, BaseUnit::Gram);
    assert_eq!(fertilizer.content_per_package, Some(dec!(50000)));
    assert_eq!(fertilizer.quantity, dec!(200000));
    assert_eq!(fertilizer.current_uses, Decimal::ZERO);

    let movements = env.materials.list_movements(fertilizer.id).await.unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].movement_type, MovementType::Ingress);
    assert_eq!(movements[0].amount, dec!(200000));
    assert_eq!(movements[0].reason, "initial stock");
}

#[rstest]
#[case(ConsumptionType::Consumable, ContentMeasureCategory::Volume, UnitOfMeasure::Liter, BaseUnit::Milliliter)]
#[case(ConsumptionType::Consumable, ContentMeasureCategory::NotMeasured, UnitOfMeasure::Box, BaseUnit::Gram)]
#[case(ConsumptionType::NonConsumable, ContentMeasureCategory::Mass, UnitOfMeasure::Unit, BaseUnit::Unit)]
#[tokio::test]
async fn base_unit_follows_consumption_and_category(
    #[case] consumption_type: ConsumptionType,
    #[case] category: ContentMeasureCategory,
    #[case] unit: UnitOfMeasure,
    #[case] expected: BaseUnit,
) {
    let env = TestEnv::new().await;
    let material = env
        .materials
        .register_material(
            NewMaterial {
                consumption_type,
                content_measure_category: category,
                unit,
                content_per_package: None,
                content_unit: None,
                ..seed_material("Generic")
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(material.base_unit, expected);
}

#[tokio::test]
async fn empty_registration_records_no_movement() {
    let env = TestEnv::new().await;
    let material = env
        .materials
        .register_material(
            NewMaterial {
                quantity: Decimal::ZERO,
                ..seed_material("Seeds")
            },
            Some(Uuid::new_v4()),
        )
        .await
        .unwrap();
    assert_eq!(material.quantity, Decimal::ZERO);
    assert!(env.materials.list_movements(material.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn registration_rejects_invalid_input() {
    let env = TestEnv::new().await;

    let blank = env
        .materials
        .register_material(seed_material(""), None)
        .await;
    assert_matches!(blank, Err(ServiceError::ValidationError(_)));

    let negative = env
        .materials
        .register_material(
            NewMaterial {
                quantity: dec!(-1),
                ..seed_material("Lime")
            },
            None,
        )
        .await;
    assert_matches!(negative, Err(ServiceError::ValidationError(_)));

    let uses_on_consumable = env
        .materials
        .register_material(
            NewMaterial {
                total_uses_per_unit: Some(dec!(5)),
                ..seed_material("Lime")
            },
            None,
        )
        .await;
    assert_matches!(uses_on_consumable, Err(ServiceError::ValidationError(_)));

    let wrong_dimension = env
        .materials
        .register_material(
            NewMaterial {
                unit: UnitOfMeasure::Liter,
                ..seed_material("Lime")
            },
            None,
        )
        .await;
    assert_matches!(wrong_dimension, Err(ServiceError::UnsupportedUnit(_)));
}

#[tokio::test]
async fn opening_stock_beyond_storable_maximum_is_rejected() {
    let env = TestEnv::new().await;
    let err = env
        .materials
        .register_material(
            NewMaterial {
                quantity: dec!(1000000000000),
                unit: UnitOfMeasure::Gram,
                ..seed_material("Sand")
            },
            None,
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::QuantityOutOfRange(_));
}

#[tokio::test]
async fn receiving_stock_converts_to_base_units() {
    let env = TestEnv::new().await;
    let fertilizer = env.fertilizer(dec!(1)).await;

    let updated = env
        .materials
        .receive_stock(fertilizer.id, dec!(2), UnitOfMeasure::Sack, None)
        .await
        .unwrap();
    assert_eq!(updated.quantity, dec!(150000));

    let updated = env
        .materials
        .receive_stock(fertilizer.id, dec!(500), UnitOfMeasure::Gram, None)
        .await
        .unwrap();
    assert_eq!(updated.quantity, dec!(150500));

    let movements = env.materials.list_movements(fertilizer.id).await.unwrap();
    assert_eq!(movements.len(), 3);
    assert!(movements.iter().all(|m| m.movement_type == MovementType::Ingress));
}

#[tokio::test]
async fn receiving_stock_validates_input() {
    let env = TestEnv::new().await;
    let herbicide = env.herbicide(dec!(1)).await;

    let zero = env
        .materials
        .receive_stock(herbicide.id, Decimal::ZERO, UnitOfMeasure::Liter, None)
        .await;
    assert_matches!(zero, Err(ServiceError::ValidationError(_)));

    let missing = env
        .materials
        .receive_stock(Uuid::new_v4(), dec!(1), UnitOfMeasure::Liter, None)
        .await;
    assert_matches!(missing, Err(ServiceError::MaterialNotFound(_)));

    let wrong_unit = env
        .materials
        .receive_stock(herbicide.id, dec!(1), UnitOfMeasure::Kilogram, None)
        .await;
    assert_matches!(wrong_unit, Err(ServiceError::UnsupportedUnit(_)));
    assert_eq!(env.stock_of(herbicide.id).await.quantity, dec!(1000));
}

#[tokio::test]
async fn unknown_material_is_reported() {
    let env = TestEnv::new().await;
    let id = Uuid::new_v4();
    assert_matches!(
        env.materials.get_material(id).await,
        Err(ServiceError::MaterialNotFound(missing)) if missing == id
    );
}

mod common;

use assert_matches::assert_matches;
use common::TestEnv;
use farm_inventory::{
    entities::{
        expense::{self, ExpenseCategory, ExpenseDirection},
        stock_movement::MovementType,
        UnitOfMeasure,
    },
    services::{
        activity_materials::{
            AssignMaterialsRequest, MaterialLine, ReturnLine, ReturnMaterialsRequest, SkipReason,
        },
        reconciliation::ReturnedQuantities,
    },
    ServiceError,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn assign_request(activity_id: Uuid, lines: Vec<MaterialLine>) -> AssignMaterialsRequest {
    AssignMaterialsRequest {
        activity_id,
        lot_id: Some(Uuid::new_v4()),
        actor_id: None,
        materials: lines,
    }
}

fn line(material_id: Uuid, quantity: Decimal, unit: UnitOfMeasure) -> MaterialLine {
    MaterialLine {
        material_id,
        quantity,
        unit,
    }
}

fn good_return(material_id: Uuid, good: Decimal) -> ReturnLine {
    ReturnLine {
        material_id,
        returned_good: good,
        returned_damaged: Decimal::ZERO,
        unit: None,
    }
}

fn net_cost(expenses: &[expense::Model]) -> Decimal {
    expenses.iter().fold(Decimal::ZERO, |acc, e| match e.direction {
        ExpenseDirection::Egress => acc + e.amount,
        ExpenseDirection::Ingress => acc - e.amount,
    })
}

fn count_category(expenses: &[expense::Model], category: ExpenseCategory) -> usize {
    expenses.iter().filter(|e| e.category == category).count()
}

#[tokio::test]
async fn partial_return_books_only_what_was_consumed() {
    let env = TestEnv::new().await;
    let fertilizer = env.fertilizer(dec!(2)).await;
    assert_eq!(fertilizer.quantity, dec!(100000));
    let activity_id = Uuid::new_v4();

    let outcome = env
        .activities
        .assign_materials(assign_request(
            activity_id,
            vec![line(fertilizer.id, dec!(10), UnitOfMeasure::Kilogram)],
        ))
        .await
        .unwrap();
    let assignment = &outcome.assignments[0];
    assert_eq!(assignment.quantity_base, dec!(10000));
    assert_eq!(assignment.cost, dec!(10000));
    assert_eq!(outcome.expenses.len(), 1);
    assert_eq!(outcome.expenses[0].category, ExpenseCategory::MaterialAssignment);
    assert_eq!(env.stock_of(fertilizer.id).await.quantity, dec!(90000));

    let returned = env
        .activities
        .return_materials(ReturnMaterialsRequest {
            activity_id,
            actor_id: None,
            lines: vec![good_return(fertilizer.id, dec!(4))],
        })
        .await
        .unwrap();
    assert!(returned.skipped.is_empty());
    let result = &returned.reconciled[0];
    assert_eq!(result.consumed_base, dec!(6000));
    assert_eq!(result.good_base, dec!(4000));
    assert!(result.expense_id.is_some());

    assert_eq!(env.stock_of(fertilizer.id).await.quantity, dec!(94000));

    let reconciled = env
        .activities
        .get_assignment(activity_id, fertilizer.id)
        .await
        .unwrap();
    assert!(reconciled.is_reconciled());
    assert_eq!(reconciled.quantity_base, dec!(6000));
    assert_eq!(reconciled.quantity_display, dec!(6));
    assert_eq!(reconciled.cost, dec!(6000));
    assert_eq!(reconciled.returned_good_base, Some(dec!(4000)));

    let expenses = env.activities.list_expenses(activity_id).await.unwrap();
    assert_eq!(expenses.len(), 3);
    assert_eq!(count_category(&expenses, ExpenseCategory::AssignmentReversal), 1);
    assert_eq!(count_category(&expenses, ExpenseCategory::MaterialConsumption), 1);
    assert_eq!(net_cost(&expenses), dec!(6000));
    assert!(expenses.iter().all(|e| e.lot_id == assignment.lot_id));
}

#[tokio::test]
async fn full_return_zeroes_the_assignment() {
    let env = TestEnv::new().await;
    let herbicide = env.herbicide(dec!(5)).await;
    let activity_id = Uuid::new_v4();

    env.activities
        .assign_materials(assign_request(
            activity_id,
            vec![line(herbicide.id, dec!(500), UnitOfMeasure::Milliliter)],
        ))
        .await
        .unwrap();
    let outcome = env
        .activities
        .return_materials(ReturnMaterialsRequest {
            activity_id,
            actor_id: None,
            lines: vec![ReturnLine {
                material_id: herbicide.id,
                returned_good: dec!(0.5),
                returned_damaged: Decimal::ZERO,
                unit: Some(UnitOfMeasure::Liter),
            }],
        })
        .await
        .unwrap();

    let result = &outcome.reconciled[0];
    assert_eq!(result.consumed_base, Decimal::ZERO);
    assert_eq!(result.expense_id, None);
    assert_eq!(env.stock_of(herbicide.id).await.quantity, dec!(5000));

    let assignment = env
        .activities
        .get_assignment(activity_id, herbicide.id)
        .await
        .unwrap();
    assert_eq!(assignment.quantity_base, Decimal::ZERO);
    assert_eq!(assignment.cost, Decimal::ZERO);

    let expenses = env.activities.list_expenses(activity_id).await.unwrap();
    assert_eq!(net_cost(&expenses), Decimal::ZERO);
}

#[tokio::test]
async fn whole_package_costs_the_package_price() {
    let env = TestEnv::new().await;
    let fertilizer = env.fertilizer(dec!(3)).await;

    let outcome = env
        .activities
        .assign_materials(assign_request(
            Uuid::new_v4(),
            vec![line(fertilizer.id, dec!(1), UnitOfMeasure::Sack)],
        ))
        .await
        .unwrap();
    assert_eq!(outcome.assignments[0].quantity_base, dec!(50000));
    assert_eq!(outcome.assignments[0].cost, dec!(50000));
    assert_eq!(outcome.expenses[0].unit_price, dec!(50000));
    assert_eq!(env.stock_of(fertilizer.id).await.quantity, dec!(100000));
}

#[tokio::test]
async fn insufficient_stock_rolls_back_the_whole_batch() {
    let env = TestEnv::new().await;
    let herbicide = env.herbicide(dec!(5)).await;
    let fertilizer = env.fertilizer(dec!(1)).await;
    let activity_id = Uuid::new_v4();

    let err = env
        .activities
        .assign_materials(assign_request(
            activity_id,
            vec![
                line(herbicide.id, dec!(2), UnitOfMeasure::Liter),
                line(fertilizer.id, dec!(60), UnitOfMeasure::Kilogram),
            ],
        ))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));

    assert_eq!(env.stock_of(herbicide.id).await.quantity, dec!(5000));
    assert_eq!(env.stock_of(fertilizer.id).await.quantity, dec!(50000));
    assert!(env.activities.list_assignments(activity_id).await.unwrap().is_empty());
    assert!(env.activities.list_expenses(activity_id).await.unwrap().is_empty());
    let movements = env.materials.list_movements(herbicide.id).await.unwrap();
    assert_eq!(movements.len(), 1, "only the opening stock movement survives");
}

#[tokio::test]
async fn incompatible_unit_is_rejected() {
    let env = TestEnv::new().await;
    let herbicide = env.herbicide(dec!(5)).await;

    let err = env
        .activities
        .assign_materials(assign_request(
            Uuid::new_v4(),
            vec![line(herbicide.id, dec!(1), UnitOfMeasure::Kilogram)],
        ))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::UnsupportedUnit(_));
    assert_eq!(env.stock_of(herbicide.id).await.quantity, dec!(5000));
}

#[tokio::test]
async fn assignment_batch_validation() {
    let env = TestEnv::new().await;
    let herbicide = env.herbicide(dec!(5)).await;
    let activity_id = Uuid::new_v4();

    let empty = env
        .activities
        .assign_materials(assign_request(activity_id, vec![]))
        .await;
    assert_matches!(empty, Err(ServiceError::ValidationError(_)));

    let duplicated = env
        .activities
        .assign_materials(assign_request(
            activity_id,
            vec![
                line(herbicide.id, dec!(1), UnitOfMeasure::Liter),
                line(herbicide.id, dec!(1), UnitOfMeasure::Liter),
            ],
        ))
        .await;
    assert_matches!(duplicated, Err(ServiceError::ValidationError(_)));

    let zero = env
        .activities
        .assign_materials(assign_request(
            activity_id,
            vec![line(herbicide.id, Decimal::ZERO, UnitOfMeasure::Liter)],
        ))
        .await;
    assert_matches!(zero, Err(ServiceError::ValidationError(_)));

    let missing = Uuid::new_v4();
    let unknown = env
        .activities
        .assign_materials(assign_request(
            activity_id,
            vec![line(missing, dec!(1), UnitOfMeasure::Liter)],
        ))
        .await;
    assert_matches!(unknown, Err(ServiceError::MaterialNotFound(id)) if id == missing);
}

#[tokio::test]
async fn assigning_the_same_material_twice_conflicts() {
    let env = TestEnv::new().await;
    let herbicide = env.herbicide(dec!(5)).await;
    let activity_id = Uuid::new_v4();

    env.activities
        .assign_materials(assign_request(
            activity_id,
            vec![line(herbicide.id, dec!(1), UnitOfMeasure::Liter)],
        ))
        .await
        .unwrap();
    let again = env
        .activities
        .assign_materials(assign_request(
            activity_id,
            vec![line(herbicide.id, dec!(1), UnitOfMeasure::Liter)],
        ))
        .await;
    assert_matches!(again, Err(ServiceError::Conflict(_)));
    assert_eq!(env.stock_of(herbicide.id).await.quantity, dec!(4000));
}

#[tokio::test]
async fn repeated_and_unknown_return_lines_are_skipped() {
    let env = TestEnv::new().await;
    let herbicide = env.herbicide(dec!(5)).await;
    let activity_id = Uuid::new_v4();

    env.activities
        .assign_materials(assign_request(
            activity_id,
            vec![line(herbicide.id, dec!(2), UnitOfMeasure::Liter)],
        ))
        .await
        .unwrap();
    env.activities
        .return_materials(ReturnMaterialsRequest {
            activity_id,
            actor_id: None,
            lines: vec![good_return(herbicide.id, dec!(1))],
        })
        .await
        .unwrap();

    let stranger = Uuid::new_v4();
    let second = env
        .activities
        .return_materials(ReturnMaterialsRequest {
            activity_id,
            actor_id: None,
            lines: vec![good_return(herbicide.id, dec!(1)), good_return(stranger, dec!(1))],
        })
        .await
        .unwrap();

    assert!(second.reconciled.is_empty());
    assert_eq!(second.skipped.len(), 2);
    assert_eq!(second.skipped[0].reason, SkipReason::AlreadyReconciled);
    assert_eq!(second.skipped[1].material_id, stranger);
    assert_eq!(second.skipped[1].reason, SkipReason::NoAssignment);
    assert_eq!(env.stock_of(herbicide.id).await.quantity, dec!(4000));
}

#[tokio::test]
async fn returning_more_than_assigned_consumes_nothing() {
    let env = TestEnv::new().await;
    let herbicide = env.herbicide(dec!(5)).await;
    let activity_id = Uuid::new_v4();

    env.activities
        .assign_materials(assign_request(
            activity_id,
            vec![line(herbicide.id, dec!(1), UnitOfMeasure::Liter)],
        ))
        .await
        .unwrap();
    let outcome = env
        .activities
        .return_materials(ReturnMaterialsRequest {
            activity_id,
            actor_id: None,
            lines: vec![good_return(herbicide.id, dec!(2))],
        })
        .await
        .unwrap();

    assert_eq!(outcome.reconciled[0].consumed_base, Decimal::ZERO);
    assert_eq!(env.stock_of(herbicide.id).await.quantity, dec!(6000));
}

#[tokio::test]
async fn reconcile_material_requires_an_open_assignment() {
    let env = TestEnv::new().await;
    let herbicide = env.herbicide(dec!(5)).await;
    let activity_id = Uuid::new_v4();
    let returned = ReturnedQuantities {
        good: dec!(1),
        damaged: Decimal::ZERO,
        unit: None,
    };

    let missing = env
        .activities
        .reconcile_material(activity_id, herbicide.id, returned, None)
        .await;
    assert_matches!(missing, Err(ServiceError::AssignmentNotFound { .. }));

    env.activities
        .assign_materials(assign_request(
            activity_id,
            vec![line(herbicide.id, dec!(3), UnitOfMeasure::Liter)],
        ))
        .await
        .unwrap();
    let first = env
        .activities
        .reconcile_material(activity_id, herbicide.id, returned, None)
        .await
        .unwrap();
    assert_eq!(first.consumed_base, dec!(2000));

    let second = env
        .activities
        .reconcile_material(activity_id, herbicide.id, returned, None)
        .await;
    assert_matches!(second, Err(ServiceError::Conflict(_)));
    assert_eq!(env.stock_of(herbicide.id).await.quantity, dec!(3000));
}

#[tokio::test]
async fn replace_reverts_previous_assignments() {
    let env = TestEnv::new().await;
    let herbicide = env.herbicide(dec!(5)).await;
    let fertilizer = env.fertilizer(dec!(1)).await;
    let activity_id = Uuid::new_v4();

    env.activities
        .assign_materials(assign_request(
            activity_id,
            vec![line(herbicide.id, dec!(2), UnitOfMeasure::Liter)],
        ))
        .await
        .unwrap();

    let outcome = env
        .activities
        .replace_materials(assign_request(
            activity_id,
            vec![line(fertilizer.id, dec!(10), UnitOfMeasure::Kilogram)],
        ))
        .await
        .unwrap();
    assert_eq!(outcome.assignments.len(), 1);
    assert_eq!(outcome.assignments[0].material_id, fertilizer.id);

    assert_eq!(env.stock_of(herbicide.id).await.quantity, dec!(5000));
    assert_eq!(env.stock_of(fertilizer.id).await.quantity, dec!(40000));

    let assignments = env.activities.list_assignments(activity_id).await.unwrap();
    assert_eq!(assignments.len(), 1);
    let expenses = env.activities.list_expenses(activity_id).await.unwrap();
    assert_eq!(net_cost(&expenses), dec!(10000));

    let movements = env.materials.list_movements(herbicide.id).await.unwrap();
    assert_eq!(
        movements
            .iter()
            .filter(|m| m.movement_type == MovementType::Ingress)
            .count(),
        2
    );
}

#[tokio::test]
async fn replace_after_return_conflicts() {
    let env = TestEnv::new().await;
    let herbicide = env.herbicide(dec!(5)).await;
    let activity_id = Uuid::new_v4();

    env.activities
        .assign_materials(assign_request(
            activity_id,
            vec![line(herbicide.id, dec!(2), UnitOfMeasure::Liter)],
        ))
        .await
        .unwrap();
    env.activities
        .return_materials(ReturnMaterialsRequest {
            activity_id,
            actor_id: None,
            lines: vec![good_return(herbicide.id, dec!(1))],
        })
        .await
        .unwrap();

    let replaced = env
        .activities
        .replace_materials(assign_request(
            activity_id,
            vec![line(herbicide.id, dec!(1), UnitOfMeasure::Liter)],
        ))
        .await;
    assert_matches!(replaced, Err(ServiceError::Conflict(_)));
    assert_eq!(env.stock_of(herbicide.id).await.quantity, dec!(4000));
}

#[tokio::test]
async fn release_restores_open_assignments_only() {
    let env = TestEnv::new().await;
    let herbicide = env.herbicide(dec!(5)).await;
    let fertilizer = env.fertilizer(dec!(1)).await;
    let activity_id = Uuid::new_v4();

    env.activities
        .assign_materials(assign_request(
            activity_id,
            vec![
                line(herbicide.id, dec!(2), UnitOfMeasure::Liter),
                line(fertilizer.id, dec!(5), UnitOfMeasure::Kilogram),
            ],
        ))
        .await
        .unwrap();
    env.activities
        .return_materials(ReturnMaterialsRequest {
            activity_id,
            actor_id: None,
            lines: vec![good_return(fertilizer.id, dec!(1))],
        })
        .await
        .unwrap();

    let outcome = env
        .activities
        .release_materials(activity_id, None)
        .await
        .unwrap();
    assert_eq!(outcome.removed, 2);
    assert_eq!(outcome.reverted, 1);

    assert_eq!(env.stock_of(herbicide.id).await.quantity, dec!(5000));
    assert_eq!(env.stock_of(fertilizer.id).await.quantity, dec!(46000));
    assert!(env.activities.list_assignments(activity_id).await.unwrap().is_empty());

    let again = env
        .activities
        .release_materials(activity_id, None)
        .await
        .unwrap();
    assert_eq!(again.removed, 0);
}

#[tokio::test]
async fn tool_is_depreciated_on_the_use_that_reaches_its_threshold() {
    let env = TestEnv::new().await;
    let machete = env.machete(dec!(2), dec!(3)).await;
    let activities: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();

    let mut outcomes = Vec::new();
    for activity_id in &activities {
        outcomes.push(
            env.activities
                .assign_materials(assign_request(
                    *activity_id,
                    vec![line(machete.id, dec!(1), UnitOfMeasure::Unit)],
                ))
                .await
                .unwrap(),
        );
    }

    assert!(outcomes[0].expenses.is_empty());
    assert!(outcomes[1].expenses.is_empty());
    assert_eq!(outcomes[2].expenses.len(), 1);
    let depreciation = &outcomes[2].expenses[0];
    assert_eq!(depreciation.category, ExpenseCategory::Depreciation);
    assert_eq!(depreciation.amount, dec!(300));
    assert!(outcomes.iter().all(|o| o.assignments[0].cost.is_zero()));

    let stock = env.stock_of(machete.id).await;
    assert_eq!(stock.quantity, dec!(1));
    assert_eq!(stock.current_uses, Decimal::ZERO);

    let movements = env.materials.list_movements(machete.id).await.unwrap();
    let egress: Vec<_> = movements
        .iter()
        .filter(|m| m.movement_type == MovementType::Egress)
        .collect();
    assert_eq!(egress.len(), 1);
    assert_eq!(egress[0].amount, dec!(1));
}

#[tokio::test]
async fn releasing_a_depreciating_assignment_gives_the_unit_back() {
    let env = TestEnv::new().await;
    let machete = env.machete(dec!(1), dec!(2)).await;
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    for activity_id in [first, second] {
        env.activities
            .assign_materials(assign_request(
                activity_id,
                vec![line(machete.id, dec!(1), UnitOfMeasure::Unit)],
            ))
            .await
            .unwrap();
    }
    assert_eq!(env.stock_of(machete.id).await.quantity, Decimal::ZERO);

    let outcome = env.activities.release_materials(second, None).await.unwrap();
    assert_eq!(outcome.reverted, 1);

    let stock = env.stock_of(machete.id).await;
    assert_eq!(stock.quantity, dec!(1));
    assert_eq!(stock.current_uses, dec!(1));

    let expenses = env.activities.list_expenses(second).await.unwrap();
    assert_eq!(net_cost(&expenses), Decimal::ZERO);
}

#[tokio::test]
async fn exhausted_tool_cannot_be_assigned() {
    let env = TestEnv::new().await;
    let machete = env.machete(dec!(1), dec!(1)).await;

    env.activities
        .assign_materials(assign_request(
            Uuid::new_v4(),
            vec![line(machete.id, dec!(1), UnitOfMeasure::Unit)],
        ))
        .await
        .unwrap();
    let err = env
        .activities
        .assign_materials(assign_request(
            Uuid::new_v4(),
            vec![line(machete.id, dec!(1), UnitOfMeasure::Unit)],
        ))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));
}

#[tokio::test]
async fn damaged_tools_are_retired_and_charged() {
    let env = TestEnv::new().await;
    let machete = env.machete(dec!(2), dec!(10)).await;
    let activity_id = Uuid::new_v4();

    env.activities
        .assign_materials(assign_request(
            activity_id,
            vec![line(machete.id, dec!(1), UnitOfMeasure::Unit)],
        ))
        .await
        .unwrap();
    assert_eq!(env.stock_of(machete.id).await.current_uses, dec!(1));

    let outcome = env
        .activities
        .return_materials(ReturnMaterialsRequest {
            activity_id,
            actor_id: None,
            lines: vec![ReturnLine {
                material_id: machete.id,
                returned_good: Decimal::ZERO,
                returned_damaged: dec!(1),
                unit: None,
            }],
        })
        .await
        .unwrap();
    let result = &outcome.reconciled[0];
    assert_eq!(result.consumed_base, dec!(1));
    assert!(result.damage_expense_id.is_some());

    let stock = env.stock_of(machete.id).await;
    assert_eq!(stock.quantity, dec!(1));
    assert_eq!(stock.current_uses, Decimal::ZERO);

    let expenses = env.activities.list_expenses(activity_id).await.unwrap();
    assert_eq!(expenses.len(), 1);
    assert_eq!(expenses[0].category, ExpenseCategory::DamageCharge);
    assert_eq!(expenses[0].amount, dec!(300));
}

#[tokio::test]
async fn tool_returned_in_good_condition_frees_its_use() {
    let env = TestEnv::new().await;
    let machete = env.machete(dec!(2), dec!(10)).await;
    let activity_id = Uuid::new_v4();

    env.activities
        .assign_materials(assign_request(
            activity_id,
            vec![line(machete.id, dec!(1), UnitOfMeasure::Unit)],
        ))
        .await
        .unwrap();
    let outcome = env
        .activities
        .return_materials(ReturnMaterialsRequest {
            activity_id,
            actor_id: None,
            lines: vec![good_return(machete.id, dec!(1))],
        })
        .await
        .unwrap();
    assert_eq!(outcome.reconciled[0].consumed_base, Decimal::ZERO);

    let stock = env.stock_of(machete.id).await;
    assert_eq!(stock.quantity, dec!(2));
    assert_eq!(stock.current_uses, Decimal::ZERO);
    assert!(env.activities.list_expenses(activity_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn oversized_tool_return_is_rejected_without_side_effects() {
    let env = TestEnv::new().await;
    let machete = env.machete(dec!(3), dec!(10)).await;
    let activity_id = Uuid::new_v4();

    env.activities
        .assign_materials(assign_request(
            activity_id,
            vec![line(machete.id, dec!(1), UnitOfMeasure::Unit)],
        ))
        .await
        .unwrap();

    let huge = Decimal::MAX - Decimal::ONE;
    let err = env
        .activities
        .return_materials(ReturnMaterialsRequest {
            activity_id,
            actor_id: None,
            lines: vec![ReturnLine {
                material_id: machete.id,
                returned_good: huge,
                returned_damaged: huge,
                unit: None,
            }],
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::QuantityOutOfRange(_));

    let stock = env.stock_of(machete.id).await;
    assert_eq!(stock.quantity, dec!(3));
    assert_eq!(stock.current_uses, dec!(1));
    let assignments = env.activities.list_assignments(activity_id).await.unwrap();
    assert!(assignments[0].reconciled_at.is_none());
}

#[tokio::test]
async fn fractional_assignment_is_stored_at_four_decimals() {
    let env = TestEnv::new().await;
    let fertilizer = env.fertilizer(dec!(1)).await;
    let activity_id = Uuid::new_v4();

    let outcome = env
        .activities
        .assign_materials(assign_request(
            activity_id,
            vec![line(fertilizer.id, dec!(0.123457), UnitOfMeasure::Pound)],
        ))
        .await
        .unwrap();
    // 0.123457 lb = 55.999107544 g
    assert_eq!(outcome.assignments[0].quantity_base, dec!(55.9991));
    assert_eq!(env.stock_of(fertilizer.id).await.quantity, dec!(49944.0009));
}

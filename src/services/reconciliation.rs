//! Reconciliation engine.
//!
//! Compares what an activity was assigned with what came back and restates
//! the assignment as real consumption. Planning is pure; [`reconcile`]
//! persists a plan inside the caller's transaction.
//!
//! Reconciliation is single-shot: once `reconciled_at` is set on an
//! assignment, further attempts fail with [`ServiceError::Conflict`].

use crate::{
    entities::{
        activity_material,
        expense::{ExpenseCategory, ExpenseDirection},
        material, UnitOfMeasure,
    },
    errors::ServiceError,
    services::{
        cost_calculator::{base_quantity_cost, damage_charge, per_base_unit_price, round_money, unit_price},
        ledger_writer::{self, ExpenseDraft, LedgerContext, MovementDraft},
        materials::persist_stock_levels,
        stock_ledger,
        unit_conversion::quantity_to_base,
    },
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Quantities handed back from the field, both in `unit`.
///
/// When `unit` is `None` the unit chosen at assignment time applies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnedQuantities {
    pub good: Decimal,
    pub damaged: Decimal,
    pub unit: Option<UnitOfMeasure>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationPlan {
    pub material: material::Model,
    pub assignment: activity_material::Model,
    pub unit: UnitOfMeasure,
    pub good_base: Decimal,
    pub damaged_base: Decimal,
    pub consumed_base: Decimal,
    pub movements: Vec<MovementDraft>,
    pub expenses: Vec<ExpenseDraft>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub assignment_id: Uuid,
    pub material_id: Uuid,
    /// Consumables: base units actually used. Tools: units lost to damage.
    pub consumed_base: Decimal,
    pub good_base: Decimal,
    pub damaged_base: Decimal,
    /// Consumption expense, when anything was consumed.
    pub expense_id: Option<Uuid>,
    pub damage_expense_id: Option<Uuid>,
}

fn check_returned(returned: &ReturnedQuantities) -> Result<(), ServiceError> {
    if returned.good < Decimal::ZERO || returned.damaged < Decimal::ZERO {
        return Err(ServiceError::InvalidInput(format!(
            "returned quantities must not be negative (good {}, damaged {})",
            returned.good, returned.damaged
        )));
    }
    Ok(())
}

/// Computes every effect of a return without touching storage.
pub fn plan_reconciliation(
    material: &material::Model,
    assignment: &activity_material::Model,
    returned: &ReturnedQuantities,
    now: DateTime<Utc>,
) -> Result<ReconciliationPlan, ServiceError> {
    if assignment.is_reconciled() {
        return Err(ServiceError::Conflict(format!(
            "assignment {} of material {} was already reconciled",
            assignment.id, assignment.material_id
        )));
    }
    if assignment.material_id != material.id {
        return Err(ServiceError::InvalidInput(format!(
            "assignment {} belongs to material {}, not {}",
            assignment.id, assignment.material_id, material.id
        )));
    }
    check_returned(returned)?;

    let unit = returned.unit.unwrap_or(assignment.unit_of_measure);
    let good_base = quantity_to_base(material, returned.good, unit)?;
    let damaged_base = quantity_to_base(material, returned.damaged, unit)?;

    let mut plan = ReconciliationPlan {
        material: material.clone(),
        assignment: assignment.clone(),
        unit,
        good_base,
        damaged_base,
        consumed_base: Decimal::ZERO,
        movements: Vec::new(),
        expenses: Vec::new(),
    };

    if material.is_consumable() {
        plan_consumable_return(&mut plan)?;
    } else {
        plan_tool_return(&mut plan)?;
    }

    plan.assignment.reconciled_at = Some(now);
    plan.assignment.returned_good_base = Some(good_base);
    plan.assignment.returned_damaged_base = Some(damaged_base);
    Ok(plan)
}

fn plan_consumable_return(plan: &mut ReconciliationPlan) -> Result<(), ServiceError> {
    let material_id = plan.material.id;

    if plan.good_base > Decimal::ZERO {
        stock_ledger::revert_stock(&mut plan.material, plan.good_base)?;
        plan.movements.push(MovementDraft::ingress(
            material_id,
            plan.good_base,
            format!("returned unused: {}", plan.material.name),
        ));
    }

    let assigned_base = plan.assignment.quantity_base;
    let consumed_base = (assigned_base - plan.good_base).max(Decimal::ZERO);
    plan.consumed_base = consumed_base;

    // The assignment cost was booked in full; back it out before booking
    // what was really consumed.
    if plan.assignment.cost > Decimal::ZERO {
        plan.expenses.push(ExpenseDraft {
            direction: ExpenseDirection::Ingress,
            category: ExpenseCategory::AssignmentReversal,
            material_id: Some(material_id),
            amount: plan.assignment.cost,
            quantity: plan.assignment.quantity_display,
            unit: plan.assignment.unit_of_measure,
            unit_price: unit_price(plan.assignment.cost, plan.assignment.quantity_display),
            description: format!(
                "assignment settled: {} {} {}",
                plan.material.name,
                plan.assignment.quantity_display.normalize(),
                plan.assignment.unit_of_measure
            ),
        });
    }

    if consumed_base.is_zero() {
        plan.assignment.quantity_base = Decimal::ZERO;
        plan.assignment.quantity_display = Decimal::ZERO;
        plan.assignment.cost = Decimal::ZERO;
        return Ok(());
    }

    let new_cost = base_quantity_cost(&plan.material, consumed_base)?;
    let new_display = if assigned_base.is_zero() {
        Decimal::ZERO
    } else {
        plan.assignment
            .quantity_display
            .checked_mul(consumed_base)
            .and_then(|scaled| scaled.checked_div(assigned_base))
            .ok_or_else(|| {
                ServiceError::QuantityOutOfRange(format!(
                    "{}: consumed display quantity overflows",
                    plan.material.name
                ))
            })?
    };

    plan.assignment.quantity_base = consumed_base;
    plan.assignment.quantity_display = new_display;
    plan.assignment.cost = new_cost;

    plan.expenses.push(ExpenseDraft {
        direction: ExpenseDirection::Egress,
        category: ExpenseCategory::MaterialConsumption,
        material_id: Some(material_id),
        amount: new_cost,
        quantity: new_display,
        unit: plan.assignment.unit_of_measure,
        unit_price: unit_price(new_cost, new_display),
        description: format!(
            "consumption: {} {} {}",
            plan.material.name,
            round_money(new_display).normalize(),
            plan.assignment.unit_of_measure
        ),
    });
    Ok(())
}

fn plan_tool_return(plan: &mut ReconciliationPlan) -> Result<(), ServiceError> {
    let material_id = plan.material.id;
    let base_unit = plan.material.base_unit.as_unit();

    let returned_units = plan.good_base.checked_add(plan.damaged_base).ok_or_else(|| {
        ServiceError::QuantityOutOfRange(format!(
            "returned {} + {} {} of {} overflows",
            plan.good_base, plan.damaged_base, base_unit, material_id
        ))
    })?;
    stock_ledger::release_uses(&mut plan.material, returned_units)?;

    if plan.damaged_base > Decimal::ZERO {
        let removed = stock_ledger::retire_units(&mut plan.material, plan.damaged_base)?;
        if removed > Decimal::ZERO {
            plan.movements.push(MovementDraft::egress(
                material_id,
                removed,
                format!("damaged on return: {}", plan.material.name),
            ));
        }
        let charge = damage_charge(&plan.material, plan.damaged_base)?;
        plan.expenses.push(ExpenseDraft {
            direction: ExpenseDirection::Egress,
            category: ExpenseCategory::DamageCharge,
            material_id: Some(material_id),
            amount: charge,
            quantity: plan.damaged_base,
            unit: base_unit,
            unit_price: round_money(per_base_unit_price(&plan.material)),
            description: format!(
                "damage charge: {} {} {}",
                plan.material.name,
                plan.damaged_base.normalize(),
                base_unit
            ),
        });
        plan.consumed_base = plan.damaged_base;
    }

    if plan.good_base > Decimal::ZERO {
        plan.movements.push(MovementDraft::ingress(
            material_id,
            plan.good_base,
            format!("returned in good condition: {}", plan.material.name),
        ));
    }
    Ok(())
}

/// Reconciles one assignment and persists the material, the rewritten
/// assignment and the ledger entries on `db`.
pub async fn reconcile<C: ConnectionTrait>(
    db: &C,
    material: &material::Model,
    assignment: &activity_material::Model,
    returned: &ReturnedQuantities,
    ctx: &LedgerContext,
) -> Result<ReconciliationResult, ServiceError> {
    let plan = plan_reconciliation(material, assignment, returned, ctx.occurred_at)?;

    persist_stock_levels(db, &plan.material).await?;

    let mut active: activity_material::ActiveModel = plan.assignment.clone().into();
    active.quantity_base = Set(plan.assignment.quantity_base);
    active.quantity_display = Set(plan.assignment.quantity_display);
    active.cost = Set(plan.assignment.cost);
    active.reconciled_at = Set(plan.assignment.reconciled_at);
    active.returned_good_base = Set(plan.assignment.returned_good_base);
    active.returned_damaged_base = Set(plan.assignment.returned_damaged_base);
    active.update(db).await.map_err(ServiceError::db_error)?;

    let ctx = ctx.with_lot(assignment.lot_id);
    for movement in plan.movements {
        ledger_writer::record_movement(db, &ctx, movement).await?;
    }

    let mut expense_id = None;
    let mut damage_expense_id = None;
    for draft in plan.expenses {
        let category = draft.category;
        let entry = ledger_writer::record_expense(db, &ctx, draft).await?;
        match category {
            ExpenseCategory::MaterialConsumption => expense_id = Some(entry.id),
            ExpenseCategory::DamageCharge => damage_expense_id = Some(entry.id),
            _ => {}
        }
    }

    Ok(ReconciliationResult {
        assignment_id: plan.assignment.id,
        material_id: plan.material.id,
        consumed_base: plan.consumed_base,
        good_base: plan.good_base,
        damaged_base: plan.damaged_base,
        expense_id,
        damage_expense_id,
    })
}

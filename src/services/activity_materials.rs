//! Transaction orchestrator for the materials of a field activity.
//!
//! Every public operation runs all of its lines, in input order, inside one
//! database transaction. Any error rolls the whole batch back.

use crate::{
    db::{transaction, DbPool},
    entities::{
        activity_material::{self, Entity as ActivityMaterial},
        expense::{self, Entity as Expense, ExpenseCategory, ExpenseDirection},
        UnitOfMeasure,
    },
    errors::ServiceError,
    services::{
        cost_calculator::{compute_assignment_cost, depreciation_charge, round_money, unit_price},
        ledger_writer::{self, ExpenseDraft, LedgerContext, MovementDraft},
        materials::{find_material_for_update, persist_stock_levels},
        reconciliation::{self, ReconciliationResult, ReturnedQuantities},
        stock_ledger,
        unit_conversion::quantity_to_base,
        validate_non_negative_decimal, validate_positive_decimal,
    },
};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// One material to assign, in the unit the user chose.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MaterialLine {
    pub material_id: Uuid,
    #[validate(custom = "validate_positive_decimal")]
    pub quantity: Decimal,
    pub unit: UnitOfMeasure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignMaterialsRequest {
    pub activity_id: Uuid,
    pub lot_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub materials: Vec<MaterialLine>,
}

/// What came back from the field for one material.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReturnLine {
    pub material_id: Uuid,
    #[validate(custom = "validate_non_negative_decimal")]
    pub returned_good: Decimal,
    #[validate(custom = "validate_non_negative_decimal")]
    pub returned_damaged: Decimal,
    /// Defaults to the unit used at assignment time.
    pub unit: Option<UnitOfMeasure>,
}

impl ReturnLine {
    fn returned(&self) -> ReturnedQuantities {
        ReturnedQuantities {
            good: self.returned_good,
            damaged: self.returned_damaged,
            unit: self.unit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnMaterialsRequest {
    pub activity_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub lines: Vec<ReturnLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssignmentOutcome {
    pub activity_id: Uuid,
    pub assignments: Vec<activity_material::Model>,
    /// Every expense booked by the operation, reversals included.
    pub expenses: Vec<expense::Model>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoAssignment,
    AlreadyReconciled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedReturn {
    pub material_id: Uuid,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReturnOutcome {
    pub activity_id: Uuid,
    pub reconciled: Vec<ReconciliationResult>,
    pub skipped: Vec<SkippedReturn>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReleaseOutcome {
    pub activity_id: Uuid,
    /// Un-reconciled assignments whose stock effect was undone.
    pub reverted: usize,
    pub removed: usize,
}

/// Service assigning, returning and releasing the materials of activities
#[derive(Clone)]
pub struct ActivityMaterialService {
    db_pool: Arc<DbPool>,
}

impl ActivityMaterialService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Assigns a batch of materials to an activity.
    #[instrument(skip(self, request), fields(activity_id = %request.activity_id, lines = request.materials.len()))]
    pub async fn assign_materials(
        &self,
        request: AssignMaterialsRequest,
    ) -> Result<AssignmentOutcome, ServiceError> {
        if request.materials.is_empty() {
            return Err(ServiceError::ValidationError(
                "at least one material is required".to_string(),
            ));
        }
        validate_material_lines(&request.materials)?;

        let ctx = LedgerContext::for_activity(request.activity_id, request.lot_id, request.actor_id);
        let txn = transaction::begin(&self.db_pool).await?;
        let result = assign_lines(&txn, &ctx, request.activity_id, &request.materials).await;
        let (assignments, expenses) = transaction::finish(txn, result, "assign_materials").await?;

        counter!("farm_inventory.materials_assigned", assignments.len() as u64);
        info!(
            assignments = assignments.len(),
            expenses = expenses.len(),
            "materials assigned to activity"
        );
        Ok(AssignmentOutcome {
            activity_id: request.activity_id,
            assignments,
            expenses,
        })
    }

    /// Replaces an activity's material list: every current assignment is
    /// reverted and removed, then the new lines are assigned.
    #[instrument(skip(self, request), fields(activity_id = %request.activity_id, lines = request.materials.len()))]
    pub async fn replace_materials(
        &self,
        request: AssignMaterialsRequest,
    ) -> Result<AssignmentOutcome, ServiceError> {
        validate_material_lines(&request.materials)?;

        let activity_id = request.activity_id;
        let ctx = LedgerContext::for_activity(activity_id, request.lot_id, request.actor_id);
        let txn = transaction::begin(&self.db_pool).await?;
        let result: Result<_, ServiceError> = async {
            let existing = assignments_of(&txn, activity_id).await?;
            if let Some(reconciled) = existing.iter().find(|a| a.is_reconciled()) {
                return Err(ServiceError::Conflict(format!(
                    "material {} of activity {} was already returned",
                    reconciled.material_id, activity_id
                )));
            }

            let mut expenses = Vec::new();
            for assignment in &existing {
                let reverted =
                    revert_assignment(&txn, &ctx.with_lot(assignment.lot_id), assignment).await?;
                expenses.extend(reverted);
                delete_assignment(&txn, assignment).await?;
            }

            let (assignments, assigned_expenses) =
                assign_lines(&txn, &ctx, activity_id, &request.materials).await?;
            expenses.extend(assigned_expenses);
            Ok((existing.len(), assignments, expenses))
        }
        .await;
        let (reverted, assignments, expenses) =
            transaction::finish(txn, result, "replace_materials").await?;

        counter!("farm_inventory.assignments_reverted", reverted as u64);
        counter!("farm_inventory.materials_assigned", assignments.len() as u64);
        info!(reverted, assignments = assignments.len(), "activity materials replaced");
        Ok(AssignmentOutcome {
            activity_id,
            assignments,
            expenses,
        })
    }

    /// Removes every assignment of an activity. Un-reconciled ones give their
    /// stock back first; reconciled ones were really consumed and just go.
    #[instrument(skip(self))]
    pub async fn release_materials(
        &self,
        activity_id: Uuid,
        actor_id: Option<Uuid>,
    ) -> Result<ReleaseOutcome, ServiceError> {
        let ctx = LedgerContext::for_activity(activity_id, None, actor_id);
        let txn = transaction::begin(&self.db_pool).await?;
        let result: Result<_, ServiceError> = async {
            let existing = assignments_of(&txn, activity_id).await?;
            let mut reverted = 0;
            for assignment in &existing {
                if !assignment.is_reconciled() {
                    revert_assignment(&txn, &ctx.with_lot(assignment.lot_id), assignment).await?;
                    reverted += 1;
                }
                delete_assignment(&txn, assignment).await?;
            }
            Ok(ReleaseOutcome {
                activity_id,
                reverted,
                removed: existing.len(),
            })
        }
        .await;
        let outcome = transaction::finish(txn, result, "release_materials").await?;

        counter!("farm_inventory.assignments_reverted", outcome.reverted as u64);
        info!(
            reverted = outcome.reverted,
            removed = outcome.removed,
            "activity materials released"
        );
        Ok(outcome)
    }

    /// Reconciles what came back from the field against each assignment.
    ///
    /// Lines without an open assignment are skipped and reported rather than
    /// failing the batch; a return may mix materials from several sources.
    #[instrument(skip(self, request), fields(activity_id = %request.activity_id, lines = request.lines.len()))]
    pub async fn return_materials(
        &self,
        request: ReturnMaterialsRequest,
    ) -> Result<ReturnOutcome, ServiceError> {
        validate_return_lines(&request.lines)?;

        let activity_id = request.activity_id;
        let ctx = LedgerContext::for_activity(activity_id, None, request.actor_id);
        let txn = transaction::begin(&self.db_pool).await?;
        let result: Result<_, ServiceError> = async {
            let mut reconciled = Vec::new();
            let mut skipped = Vec::new();
            for line in &request.lines {
                let assignment = find_assignment(&txn, activity_id, line.material_id).await?;
                let assignment = match assignment {
                    Some(a) if a.is_reconciled() => {
                        warn!(material_id = %line.material_id, "material already reconciled; skipping return line");
                        skipped.push(SkippedReturn {
                            material_id: line.material_id,
                            reason: SkipReason::AlreadyReconciled,
                        });
                        continue;
                    }
                    Some(a) => a,
                    None => {
                        warn!(material_id = %line.material_id, "no assignment to reconcile against; skipping return line");
                        skipped.push(SkippedReturn {
                            material_id: line.material_id,
                            reason: SkipReason::NoAssignment,
                        });
                        continue;
                    }
                };

                let material = find_material_for_update(&txn, line.material_id).await?;
                let result =
                    reconciliation::reconcile(&txn, &material, &assignment, &line.returned(), &ctx)
                        .await?;
                reconciled.push(result);
            }
            Ok(ReturnOutcome {
                activity_id,
                reconciled,
                skipped,
            })
        }
        .await;
        let outcome = transaction::finish(txn, result, "return_materials").await?;

        counter!("farm_inventory.materials_returned", outcome.reconciled.len() as u64);
        counter!("farm_inventory.return_lines_skipped", outcome.skipped.len() as u64);
        info!(
            reconciled = outcome.reconciled.len(),
            skipped = outcome.skipped.len(),
            "activity materials returned"
        );
        Ok(outcome)
    }

    /// Reconciles a single assignment, failing when there is nothing open to
    /// reconcile.
    #[instrument(skip(self, returned))]
    pub async fn reconcile_material(
        &self,
        activity_id: Uuid,
        material_id: Uuid,
        returned: ReturnedQuantities,
        actor_id: Option<Uuid>,
    ) -> Result<ReconciliationResult, ServiceError> {
        let ctx = LedgerContext::for_activity(activity_id, None, actor_id);
        let txn = transaction::begin(&self.db_pool).await?;
        let result: Result<_, ServiceError> = async {
            let assignment = find_assignment(&txn, activity_id, material_id)
                .await?
                .ok_or(ServiceError::AssignmentNotFound {
                    activity_id,
                    material_id,
                })?;
            let material = find_material_for_update(&txn, material_id).await?;
            reconciliation::reconcile(&txn, &material, &assignment, &returned, &ctx).await
        }
        .await;
        let outcome = transaction::finish(txn, result, "reconcile_material").await?;

        counter!("farm_inventory.materials_returned", 1);
        info!(consumed_base = %outcome.consumed_base, "material reconciled");
        Ok(outcome)
    }

    pub async fn get_assignment(
        &self,
        activity_id: Uuid,
        material_id: Uuid,
    ) -> Result<activity_material::Model, ServiceError> {
        find_assignment(&*self.db_pool, activity_id, material_id)
            .await?
            .ok_or(ServiceError::AssignmentNotFound {
                activity_id,
                material_id,
            })
    }

    pub async fn list_assignments(
        &self,
        activity_id: Uuid,
    ) -> Result<Vec<activity_material::Model>, ServiceError> {
        assignments_of(&*self.db_pool, activity_id).await
    }

    /// Expense ledger entries of an activity, oldest first.
    pub async fn list_expenses(&self, activity_id: Uuid) -> Result<Vec<expense::Model>, ServiceError> {
        Expense::find()
            .filter(expense::Column::ActivityId.eq(activity_id))
            .order_by_asc(expense::Column::CreatedAt)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }
}

fn validate_material_lines(lines: &[MaterialLine]) -> Result<(), ServiceError> {
    let mut seen = HashSet::new();
    for line in lines {
        line.validate()?;
        if !seen.insert(line.material_id) {
            return Err(ServiceError::ValidationError(format!(
                "material {} is listed more than once",
                line.material_id
            )));
        }
    }
    Ok(())
}

fn validate_return_lines(lines: &[ReturnLine]) -> Result<(), ServiceError> {
    if lines.is_empty() {
        return Err(ServiceError::ValidationError(
            "at least one return line is required".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for line in lines {
        line.validate()?;
        if !seen.insert(line.material_id) {
            return Err(ServiceError::ValidationError(format!(
                "material {} is returned more than once",
                line.material_id
            )));
        }
    }
    Ok(())
}

async fn find_assignment<C: ConnectionTrait>(
    db: &C,
    activity_id: Uuid,
    material_id: Uuid,
) -> Result<Option<activity_material::Model>, ServiceError> {
    ActivityMaterial::find()
        .filter(activity_material::Column::ActivityId.eq(activity_id))
        .filter(activity_material::Column::MaterialId.eq(material_id))
        .one(db)
        .await
        .map_err(ServiceError::db_error)
}

async fn assignments_of<C: ConnectionTrait>(
    db: &C,
    activity_id: Uuid,
) -> Result<Vec<activity_material::Model>, ServiceError> {
    ActivityMaterial::find()
        .filter(activity_material::Column::ActivityId.eq(activity_id))
        .order_by_asc(activity_material::Column::CreatedAt)
        .all(db)
        .await
        .map_err(ServiceError::db_error)
}

async fn delete_assignment<C: ConnectionTrait>(
    db: &C,
    assignment: &activity_material::Model,
) -> Result<(), ServiceError> {
    ActivityMaterial::delete_by_id(assignment.id)
        .exec(db)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(())
}

async fn assign_lines<C: ConnectionTrait>(
    db: &C,
    ctx: &LedgerContext,
    activity_id: Uuid,
    lines: &[MaterialLine],
) -> Result<(Vec<activity_material::Model>, Vec<expense::Model>), ServiceError> {
    let mut assignments = Vec::with_capacity(lines.len());
    let mut expenses = Vec::new();
    for line in lines {
        let (assignment, booked) = assign_line(db, ctx, activity_id, line).await?;
        assignments.push(assignment);
        expenses.extend(booked);
    }
    Ok((assignments, expenses))
}

async fn assign_line<C: ConnectionTrait>(
    db: &C,
    ctx: &LedgerContext,
    activity_id: Uuid,
    line: &MaterialLine,
) -> Result<(activity_material::Model, Vec<expense::Model>), ServiceError> {
    if find_assignment(db, activity_id, line.material_id).await?.is_some() {
        return Err(ServiceError::Conflict(format!(
            "material {} is already assigned to activity {}",
            line.material_id, activity_id
        )));
    }

    let mut material = find_material_for_update(db, line.material_id).await?;
    let amount_base = quantity_to_base(&material, line.quantity, line.unit)?;
    let decrement = stock_ledger::decrement_stock(&mut material, amount_base)?;
    let cost = compute_assignment_cost(&material, amount_base, line.quantity)?;
    persist_stock_levels(db, &material).await?;

    let assignment = activity_material::ActiveModel {
        id: Set(Uuid::new_v4()),
        activity_id: Set(activity_id),
        material_id: Set(material.id),
        lot_id: Set(ctx.lot_id),
        quantity_display: Set(line.quantity),
        unit_of_measure: Set(line.unit),
        quantity_base: Set(amount_base),
        cost: Set(cost.total_cost),
        reconciled_at: Set(None),
        returned_good_base: Set(None),
        returned_damaged_base: Set(None),
        created_at: Set(ctx.occurred_at),
        updated_at: Set(ctx.occurred_at),
    }
    .insert(db)
    .await
    .map_err(ServiceError::db_error)?;

    if decrement.must_log_egress {
        let reason = if material.is_consumable() {
            format!("assigned: {}", material.name)
        } else {
            format!("depreciated: {}", material.name)
        };
        ledger_writer::record_movement(
            db,
            ctx,
            MovementDraft::egress(material.id, decrement.removed, reason),
        )
        .await?;
    }

    let mut expenses = Vec::new();
    if cost.total_cost > Decimal::ZERO {
        let draft = ExpenseDraft {
            direction: ExpenseDirection::Egress,
            category: ExpenseCategory::MaterialAssignment,
            material_id: Some(material.id),
            amount: cost.total_cost,
            quantity: line.quantity,
            unit: line.unit,
            unit_price: cost.unit_display_price,
            description: format!(
                "assignment: {} {} {}",
                material.name,
                line.quantity.normalize(),
                line.unit
            ),
        };
        expenses.push(ledger_writer::record_expense(db, ctx, draft).await?);
    }

    if decrement.must_charge_depreciation {
        let charge = depreciation_charge(&material);
        let draft = ExpenseDraft {
            direction: ExpenseDirection::Egress,
            category: ExpenseCategory::Depreciation,
            material_id: Some(material.id),
            amount: charge,
            quantity: Decimal::ONE,
            unit: material.base_unit.as_unit(),
            unit_price: charge,
            description: format!("depreciation: {} 1 {}", material.name, material.base_unit.as_unit()),
        };
        expenses.push(ledger_writer::record_expense(db, ctx, draft).await?);
        counter!("farm_inventory.depreciation_charges", 1);
    }

    Ok((assignment, expenses))
}

/// Undoes the stock effect of an un-reconciled assignment and books the
/// matching ingress entries. The assignment row itself is left to the caller.
async fn revert_assignment<C: ConnectionTrait>(
    db: &C,
    ctx: &LedgerContext,
    assignment: &activity_material::Model,
) -> Result<Vec<expense::Model>, ServiceError> {
    let mut material = find_material_for_update(db, assignment.material_id).await?;
    let revert = stock_ledger::revert_stock(&mut material, assignment.quantity_base)?;
    persist_stock_levels(db, &material).await?;

    if revert.restored > Decimal::ZERO {
        ledger_writer::record_movement(
            db,
            ctx,
            MovementDraft::ingress(
                material.id,
                revert.restored,
                format!("assignment reverted: {}", material.name),
            ),
        )
        .await?;
    }

    let mut expenses = Vec::new();
    if assignment.cost > Decimal::ZERO {
        let draft = ExpenseDraft {
            direction: ExpenseDirection::Ingress,
            category: ExpenseCategory::AssignmentReversal,
            material_id: Some(material.id),
            amount: assignment.cost,
            quantity: assignment.quantity_display,
            unit: assignment.unit_of_measure,
            unit_price: unit_price(assignment.cost, assignment.quantity_display),
            description: format!(
                "assignment reverted: {} {} {}",
                material.name,
                assignment.quantity_display.normalize(),
                assignment.unit_of_measure
            ),
        };
        expenses.push(ledger_writer::record_expense(db, ctx, draft).await?);
    }

    if !material.is_consumable() && revert.restored > Decimal::ZERO {
        let charge = depreciation_charge(&material);
        let draft = ExpenseDraft {
            direction: ExpenseDirection::Ingress,
            category: ExpenseCategory::AssignmentReversal,
            material_id: Some(material.id),
            amount: round_money(charge * revert.restored),
            quantity: revert.restored,
            unit: material.base_unit.as_unit(),
            unit_price: charge,
            description: format!(
                "depreciation reverted: {} {} {}",
                material.name,
                revert.restored.normalize(),
                material.base_unit.as_unit()
            ),
        };
        expenses.push(ledger_writer::record_expense(db, ctx, draft).await?);
    }

    Ok(expenses)
}

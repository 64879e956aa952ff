//! Write-only sinks for the stock movement audit trail and the expense ledger.

use crate::entities::{
    expense::{self, ExpenseCategory, ExpenseDirection},
    stock_movement::{self, MovementType},
    UnitOfMeasure,
};
use crate::errors::ServiceError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};
use uuid::Uuid;

pub const ACTIVITY_REFERENCE: &str = "ACTIVITY";

/// Who and what an operation's ledger entries are attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerContext {
    pub activity_id: Option<Uuid>,
    pub lot_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
}

impl LedgerContext {
    pub fn for_activity(activity_id: Uuid, lot_id: Option<Uuid>, actor_id: Option<Uuid>) -> Self {
        Self {
            activity_id: Some(activity_id),
            lot_id,
            actor_id,
            occurred_at: Utc::now(),
        }
    }

    pub fn standalone(actor_id: Option<Uuid>) -> Self {
        Self {
            activity_id: None,
            lot_id: None,
            actor_id,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_lot(self, lot_id: Option<Uuid>) -> Self {
        Self { lot_id, ..self }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovementDraft {
    pub material_id: Uuid,
    pub movement_type: MovementType,
    pub amount: Decimal,
    pub reason: String,
}

impl MovementDraft {
    pub fn ingress(material_id: Uuid, amount: Decimal, reason: impl Into<String>) -> Self {
        Self {
            material_id,
            movement_type: MovementType::Ingress,
            amount,
            reason: reason.into(),
        }
    }

    pub fn egress(material_id: Uuid, amount: Decimal, reason: impl Into<String>) -> Self {
        Self {
            material_id,
            movement_type: MovementType::Egress,
            amount,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseDraft {
    pub direction: ExpenseDirection,
    pub category: ExpenseCategory,
    pub material_id: Option<Uuid>,
    pub amount: Decimal,
    pub quantity: Decimal,
    pub unit: UnitOfMeasure,
    pub unit_price: Decimal,
    pub description: String,
}

pub async fn record_movement<C: ConnectionTrait>(
    db: &C,
    ctx: &LedgerContext,
    draft: MovementDraft,
) -> Result<stock_movement::Model, ServiceError> {
    let movement = stock_movement::ActiveModel {
        id: Set(Uuid::new_v4()),
        material_id: Set(draft.material_id),
        movement_type: Set(draft.movement_type),
        amount: Set(draft.amount),
        reason: Set(draft.reason),
        reference_id: Set(ctx.activity_id),
        reference_type: Set(ctx.activity_id.map(|_| ACTIVITY_REFERENCE.to_string())),
        actor_id: Set(ctx.actor_id),
        created_at: Set(ctx.occurred_at),
    };

    movement.insert(db).await.map_err(ServiceError::db_error)
}

pub async fn record_expense<C: ConnectionTrait>(
    db: &C,
    ctx: &LedgerContext,
    draft: ExpenseDraft,
) -> Result<expense::Model, ServiceError> {
    let entry = expense::ActiveModel {
        id: Set(Uuid::new_v4()),
        direction: Set(draft.direction),
        category: Set(draft.category),
        activity_id: Set(ctx.activity_id),
        lot_id: Set(ctx.lot_id),
        material_id: Set(draft.material_id),
        amount: Set(draft.amount),
        quantity: Set(draft.quantity),
        unit: Set(draft.unit),
        unit_price: Set(draft.unit_price),
        description: Set(draft.description),
        date: Set(ctx.occurred_at),
        created_at: Set(Utc::now()),
    };

    entry.insert(db).await.map_err(ServiceError::db_error)
}

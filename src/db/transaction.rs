/*!
 * Transaction helpers
 *
 * A unit of work is opened with [`begin`], its steps run against the
 * returned transaction, and [`finish`] commits on success or rolls back on
 * any error.
 *
 * ```rust,ignore
 * let txn = transaction::begin(&db).await?;
 * let result = assign_lines(&txn, &ctx, activity_id, &lines).await;
 * let assigned = transaction::finish(txn, result, "assign_materials").await?;
 * ```
 */

use crate::errors::ServiceError;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use tracing::{debug, error, warn};

pub async fn begin(db: &DatabaseConnection) -> Result<DatabaseTransaction, ServiceError> {
    db.begin().await.map_err(|e| {
        error!(error = %e, "failed to open transaction");
        ServiceError::db_error(e)
    })
}

/// Commits `txn` when `result` is `Ok`, rolls it back otherwise.
///
/// The operation's own error wins over a rollback failure.
pub async fn finish<T>(
    txn: DatabaseTransaction,
    result: Result<T, ServiceError>,
    operation: &str,
) -> Result<T, ServiceError> {
    match result {
        Ok(value) => {
            txn.commit().await.map_err(|e| {
                error!(operation, error = %e, "commit failed");
                ServiceError::db_error(e)
            })?;
            debug!(operation, "transaction committed");
            Ok(value)
        }
        Err(err) => {
            warn!(operation, error = %err, code = err.error_code(), "rolling back transaction");
            if let Err(rollback_err) = txn.rollback().await {
                error!(operation, error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

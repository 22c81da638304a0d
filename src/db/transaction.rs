//! Transaction coordinator.
//!
//! Every multi-step workflow runs its mutations through [`with_transaction`]:
//! one transaction handle per invocation, commit when the caller's future
//! succeeds, rollback when it fails. The caller's error is propagated exactly
//! as raised so workflows can tell an insufficient balance apart from a
//! connectivity failure.

use crate::db::DbPool;
use crate::errors::ServiceError;
use futures::future::BoxFuture;
use metrics::{counter, histogram};
use sea_orm::{DatabaseTransaction, TransactionTrait};
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Executes `f` within a single database transaction scope.
///
/// Guarantees:
/// - exactly one transaction handle is opened and released per invocation,
///   on every exit path;
/// - all mutations applied by `f` become visible atomically on commit;
/// - on error the scope is rolled back and the original `ServiceError`
///   returned unchanged (a failed rollback is logged, never surfaced over
///   the causal error).
///
/// # Example
///
/// ```rust,ignore
/// let order_id = with_transaction(&db, |txn| {
///     Box::pin(async move {
///         let order_id = accessors::insert_order(txn, customer_id, OrderStatus::Processing).await?;
///         accessors::insert_order_item(txn, order_id, product_id, 2, price).await?;
///         Ok(order_id)
///     })
/// })
/// .await?;
/// ```
pub async fn with_transaction<F, T>(db: &DbPool, f: F) -> Result<T, ServiceError>
where
    F: for<'a> FnOnce(&'a DatabaseTransaction) -> BoxFuture<'a, Result<T, ServiceError>> + Send,
    T: Send,
{
    let scope_id = Uuid::new_v4();
    let start = std::time::Instant::now();

    debug!(scope_id = %scope_id, "Starting database transaction");
    counter!("orderdesk_db.transaction.started", 1);

    let txn = db.begin().await?;

    let result = match f(&txn).await {
        Ok(value) => {
            txn.commit().await?;
            counter!("orderdesk_db.transaction.committed", 1);
            debug!(scope_id = %scope_id, "Transaction committed in {:?}", start.elapsed());
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = txn.rollback().await {
                // The causal error still wins; the broken scope is gone either way.
                error!(scope_id = %scope_id, error = %rollback_err, "Transaction rollback failed");
            }
            counter!("orderdesk_db.transaction.rolled_back", 1);
            if err.is_client_error() {
                warn!(scope_id = %scope_id, error = %err, "Transaction rolled back after {:?}", start.elapsed());
            } else {
                error!(scope_id = %scope_id, error = %err, "Transaction rolled back after {:?}", start.elapsed());
            }
            Err(err)
        }
    };

    histogram!(
        "orderdesk_db.transaction.duration_seconds",
        start.elapsed().as_secs_f64()
    );

    result
}

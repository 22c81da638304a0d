use rust_decimal::Decimal;
use sea_orm::error::DbErr;

/// Error type shared by every workflow and accessor in the crate.
///
/// Workflows never swallow a cause: whatever step fails inside a transaction
/// surfaces here unchanged after the rollback has run. Callers decide how much
/// of the reason to present.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },

    #[error("Product {product_id} is not available")]
    ProductUnavailable { product_id: i64 },

    #[error("Order {order_id} is already cancelled")]
    AlreadyCancelled { order_id: i64 },
}

impl ServiceError {
    /// True for failures caused by the request rather than the store.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ServiceError::Database(_))
    }
}

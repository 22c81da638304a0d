use crate::{
    db::{with_transaction, DbPool},
    entities::customer,
    errors::ServiceError,
    events::{Event, EventSender},
    services::accessors,
};
use rust_decimal::Decimal;
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::{Validate, ValidationError};

/// Request to move credit between two customers.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TransferCreditRequest {
    pub from_customer_id: i64,
    pub to_customer_id: i64,
    #[validate(custom = "validate_positive_amount")]
    pub amount: Decimal,
}

fn validate_positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount <= Decimal::ZERO {
        let mut err = ValidationError::new("amount");
        err.message = Some("amount must be greater than zero".into());
        return Err(err);
    }
    Ok(())
}

/// Outcome of a committed credit transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub log_entry_id: i64,
    pub from_balance: Decimal,
    pub to_balance: Decimal,
}

/// Service for customer balances and the credit-transfer workflow.
#[derive(Clone)]
pub struct CustomerService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl CustomerService {
    /// Creates a new customer service instance
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Retrieves a customer by id
    pub async fn get_customer(&self, customer_id: i64) -> Result<Option<customer::Model>, ServiceError> {
        let db = &*self.db_pool;
        Ok(customer::Entity::find_by_id(customer_id).one(db).await?)
    }

    /// Reads a customer's current spendable balance
    pub async fn get_customer_balance(&self, customer_id: i64) -> Result<Decimal, ServiceError> {
        accessors::get_customer_balance(&*self.db_pool, customer_id).await
    }

    /// Transfers credit from one customer to another.
    ///
    /// Within one transaction: the source balance is read and guarded
    /// (`InsufficientFunds` when the source is missing or short), debited with
    /// an in-transaction re-check, the destination is credited (`NotFound`
    /// when it does not exist), and an audit entry is appended. Either every
    /// step commits or none does; a failure after the debit restores the
    /// source balance through rollback.
    #[instrument(skip(self, request), fields(
        from_customer_id = request.from_customer_id,
        to_customer_id = request.to_customer_id,
    ))]
    pub async fn transfer_credit(
        &self,
        request: TransferCreditRequest,
    ) -> Result<TransferReceipt, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;

        let TransferCreditRequest {
            from_customer_id,
            to_customer_id,
            amount,
        } = request;

        let db = &*self.db_pool;
        let receipt = with_transaction(db, |txn| {
            Box::pin(async move {
                let available =
                    match accessors::get_customer_balance(txn, from_customer_id).await {
                        Ok(balance) => balance,
                        // A missing source reads as having nothing to spend.
                        Err(ServiceError::NotFound(_)) => {
                            return Err(ServiceError::InsufficientFunds {
                                available: Decimal::ZERO,
                                requested: amount,
                            })
                        }
                        Err(err) => return Err(err),
                    };

                if available < amount {
                    return Err(ServiceError::InsufficientFunds {
                        available,
                        requested: amount,
                    });
                }

                let debited =
                    accessors::debit_customer_balance(txn, from_customer_id, amount).await?;
                if !debited {
                    return Err(ServiceError::InsufficientFunds {
                        available,
                        requested: amount,
                    });
                }

                // Destination existence is checked here rather than left to a
                // store constraint, so the failure mode is the same on every
                // backend. The debit above rolls back with the scope.
                let credited =
                    accessors::credit_customer_balance(txn, to_customer_id, amount).await?;
                if !credited {
                    return Err(ServiceError::NotFound(format!(
                        "Customer {} not found",
                        to_customer_id
                    )));
                }

                let entry =
                    accessors::append_transaction_log(txn, from_customer_id, to_customer_id, amount)
                        .await?;

                let from_balance =
                    accessors::get_customer_balance(txn, from_customer_id).await?;
                let to_balance = accessors::get_customer_balance(txn, to_customer_id).await?;

                Ok(TransferReceipt {
                    log_entry_id: entry.id,
                    from_balance,
                    to_balance,
                })
            })
        })
        .await?;

        info!(
            from_customer_id,
            to_customer_id,
            %amount,
            log_entry_id = receipt.log_entry_id,
            "Credit transferred successfully"
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::CreditTransferred {
                    from_customer_id,
                    to_customer_id,
                    amount,
                })
                .await
            {
                warn!(error = %e, "Failed to send credit transferred event");
            }
        }

        Ok(receipt)
    }
}

use crate::{
    db::{with_transaction, DbPool},
    entities::{customer, order, order_item, product, OrderStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    services::accessors,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveEnum, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

/// One requested line of an order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct OrderLine {
    pub product_id: i64,
    #[validate(range(min = 1, message = "quantity must be greater than zero"))]
    pub quantity: i32,
}

/// Request to place an order for a customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub customer_id: i64,
    pub items: Vec<OrderLine>,
}

impl PlaceOrderRequest {
    fn validate(&self) -> Result<(), ServiceError> {
        if self.items.is_empty() {
            return Err(ServiceError::Validation(
                "order must contain at least one item".to_string(),
            ));
        }
        for line in &self.items {
            Validate::validate(line).map_err(|e| ServiceError::Validation(e.to_string()))?;
        }
        Ok(())
    }
}

/// Outcome of a committed refund cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationSummary {
    pub order_id: i64,
    pub customer_id: i64,
    pub refunded_amount: Decimal,
}

/// An order line joined with its product's name for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemDetail {
    pub item: order_item::Model,
    pub product_name: Option<String>,
}

/// An order with its customer and items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order: order::Model,
    pub customer: customer::Model,
    pub items: Vec<OrderItemDetail>,
}

/// Service for order workflows: checked placement, refund cancellation, and
/// the multi-table order reads the back office needs.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderService {
    /// Creates a new order service instance
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Places an order after checking every requested product is available.
    ///
    /// Within one transaction: every product's `in_stock` flag is verified
    /// first (fail fast, nothing written), then the order row is created with
    /// a placeholder total, each item is inserted with a freshly read price
    /// snapshot, and the total is corrected to the accumulated sum. The order,
    /// its items, and its final total become visible atomically; a failure at
    /// any step leaves no orphan order behind.
    ///
    /// Returns the generated order identity.
    #[instrument(skip(self, request), fields(customer_id = request.customer_id, item_count = request.items.len()))]
    pub async fn place_order(&self, request: PlaceOrderRequest) -> Result<i64, ServiceError> {
        request.validate()?;

        let PlaceOrderRequest { customer_id, items } = request;

        let db = &*self.db_pool;
        let order_id = with_transaction(db, |txn| {
            Box::pin(async move {
                customer::Entity::find_by_id(customer_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Customer {} not found", customer_id))
                    })?;

                // Availability pass before anything is written.
                for line in &items {
                    let product = accessors::get_product(txn, line.product_id).await?;
                    if !product.in_stock {
                        return Err(ServiceError::ProductUnavailable {
                            product_id: line.product_id,
                        });
                    }
                }

                let order_id =
                    accessors::insert_order(txn, customer_id, OrderStatus::Processing).await?;

                let mut total_amount = Decimal::ZERO;
                for line in &items {
                    // Fresh read: the price snapshot is taken here, not during
                    // the availability pass, so the two can disagree under
                    // concurrent price updates.
                    let product = accessors::get_product(txn, line.product_id).await?;
                    accessors::insert_order_item(
                        txn,
                        order_id,
                        line.product_id,
                        line.quantity,
                        product.price,
                    )
                    .await?;
                    total_amount += product.price * Decimal::from(line.quantity);
                }

                accessors::update_order_total(txn, order_id, total_amount).await?;

                Ok(order_id)
            })
        })
        .await?;

        info!(order_id, customer_id, "Order placed successfully");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::OrderCreated(order_id)).await {
                warn!(error = %e, order_id, "Failed to send order created event");
            }
        }

        Ok(order_id)
    }

    /// Cancels an order and refunds its full total to the customer.
    ///
    /// Within one transaction: the order is loaded (`NotFound` when absent,
    /// `AlreadyCancelled` when already terminal), its status flips to
    /// cancelled, the customer is credited the full `total_amount`, and every
    /// item's product is marked back in stock. Status flip, refund, and
    /// restock flags change together or not at all.
    #[instrument(skip(self), fields(order_id = order_id))]
    pub async fn cancel_order(&self, order_id: i64) -> Result<CancellationSummary, ServiceError> {
        let db = &*self.db_pool;
        let summary = with_transaction(db, |txn| {
            Box::pin(async move {
                let order = order::Entity::find_by_id(order_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Order {} not found", order_id))
                    })?;

                if order.status == OrderStatus::Cancelled {
                    return Err(ServiceError::AlreadyCancelled { order_id });
                }

                accessors::update_order_status(txn, order_id, OrderStatus::Cancelled).await?;

                // Full refund regardless of fulfillment state.
                let credited =
                    accessors::credit_customer_balance(txn, order.customer_id, order.total_amount)
                        .await?;
                if !credited {
                    return Err(ServiceError::NotFound(format!(
                        "Customer {} not found",
                        order.customer_id
                    )));
                }

                // Coarse restock: the flag is availability, not a quantity, so
                // every product on the order is simply marked in stock again.
                let items = order_item::Entity::find()
                    .filter(order_item::Column::OrderId.eq(order_id))
                    .all(txn)
                    .await?;
                for item in &items {
                    accessors::set_product_in_stock(txn, item.product_id, true).await?;
                }

                Ok(CancellationSummary {
                    order_id,
                    customer_id: order.customer_id,
                    refunded_amount: order.total_amount,
                })
            })
        })
        .await?;

        info!(
            order_id,
            customer_id = summary.customer_id,
            refunded_amount = %summary.refunded_amount,
            "Order cancelled and refunded"
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::OrderCancelled(order_id)).await {
                warn!(error = %e, order_id, "Failed to send order cancelled event");
            }
        }

        Ok(summary)
    }

    /// Retrieves an order by id
    pub async fn get_order(&self, order_id: i64) -> Result<Option<order::Model>, ServiceError> {
        let db = &*self.db_pool;
        Ok(order::Entity::find_by_id(order_id).one(db).await?)
    }

    /// Retrieves an order with its customer and items (product names joined in).
    pub async fn get_order_with_details(
        &self,
        order_id: i64,
    ) -> Result<Option<OrderDetails>, ServiceError> {
        let db = &*self.db_pool;

        let Some(order) = order::Entity::find_by_id(order_id).one(db).await? else {
            return Ok(None);
        };

        let customer = customer::Entity::find_by_id(order.customer_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Customer {} not found", order.customer_id))
            })?;

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .find_also_related(product::Entity)
            .all(db)
            .await?
            .into_iter()
            .map(|(item, product)| OrderItemDetail {
                item,
                product_name: product.map(|p| p.name),
            })
            .collect();

        Ok(Some(OrderDetails {
            order,
            customer,
            items,
        }))
    }

    /// Updates an order's status
    #[instrument(skip(self), fields(order_id = order_id))]
    pub async fn update_order_status(
        &self,
        order_id: i64,
        status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let db = &*self.db_pool;

        let order = order::Entity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = order.status;

        let mut active: order::ActiveModel = order.into();
        active.status = Set(status);
        let updated = active.update(db).await?;

        info!(
            order_id,
            old_status = %old_status.to_value(),
            new_status = %status.to_value(),
            "Order status updated"
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::OrderStatusChanged {
                    order_id,
                    old_status: old_status.to_value(),
                    new_status: status.to_value(),
                })
                .await
            {
                warn!(error = %e, order_id, "Failed to send order status changed event");
            }
        }

        Ok(updated)
    }
}

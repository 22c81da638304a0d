//! Entity accessor primitives.
//!
//! Each function is generic over [`ConnectionTrait`], so the same accessor
//! runs against the pool for a standalone read or against a
//! [`sea_orm::DatabaseTransaction`] as one step of a workflow. None of them
//! opens a transaction of its own.

use crate::entities::{customer, order, order_item, product, transaction_log, OrderStatus};
use crate::errors::ServiceError;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};

/// Reads a customer's spendable balance.
pub async fn get_customer_balance<C: ConnectionTrait>(
    conn: &C,
    customer_id: i64,
) -> Result<Decimal, ServiceError> {
    let customer = customer::Entity::find_by_id(customer_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", customer_id)))?;
    Ok(customer.credit_limit)
}

/// Reads a product, failing with `NotFound` when it is absent.
pub async fn get_product<C: ConnectionTrait>(
    conn: &C,
    product_id: i64,
) -> Result<product::Model, ServiceError> {
    product::Entity::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
}

/// Debits a customer's balance by `amount`, but only if the balance still
/// covers it at the moment the statement runs. Returns `false` when the
/// customer is missing or the guard fails, without mutating anything.
///
/// The `credit_limit >= amount` predicate re-checks the balance inside the
/// caller's transaction, closing the check-then-act gap between a prior read
/// and this write.
pub async fn debit_customer_balance<C: ConnectionTrait>(
    conn: &C,
    customer_id: i64,
    amount: Decimal,
) -> Result<bool, ServiceError> {
    let result = customer::Entity::update_many()
        .col_expr(
            customer::Column::CreditLimit,
            Expr::col(customer::Column::CreditLimit).sub(amount),
        )
        .filter(customer::Column::Id.eq(customer_id))
        .filter(customer::Column::CreditLimit.gte(amount))
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Credits a customer's balance by `amount`. Returns `false` when the
/// customer does not exist.
pub async fn credit_customer_balance<C: ConnectionTrait>(
    conn: &C,
    customer_id: i64,
    amount: Decimal,
) -> Result<bool, ServiceError> {
    let result = customer::Entity::update_many()
        .col_expr(
            customer::Column::CreditLimit,
            Expr::col(customer::Column::CreditLimit).add(amount),
        )
        .filter(customer::Column::Id.eq(customer_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Inserts an order row with a zero placeholder total and returns its
/// generated identity. `order_date` is stamped server-side on insert.
pub async fn insert_order<C: ConnectionTrait>(
    conn: &C,
    customer_id: i64,
    status: OrderStatus,
) -> Result<i64, ServiceError> {
    let order = order::ActiveModel {
        customer_id: Set(customer_id),
        status: Set(status),
        total_amount: Set(Decimal::ZERO),
        is_priority: Set(false),
        ..Default::default()
    };
    let model = order.insert(conn).await?;
    Ok(model.id)
}

/// Inserts an order line with its price snapshot.
pub async fn insert_order_item<C: ConnectionTrait>(
    conn: &C,
    order_id: i64,
    product_id: i64,
    quantity: i32,
    unit_price: Decimal,
) -> Result<i64, ServiceError> {
    let item = order_item::ActiveModel {
        order_id: Set(order_id),
        product_id: Set(product_id),
        quantity: Set(quantity),
        unit_price: Set(unit_price),
        ..Default::default()
    };
    let model = item.insert(conn).await?;
    Ok(model.id)
}

/// Corrects an order's total to the accumulated item sum.
pub async fn update_order_total<C: ConnectionTrait>(
    conn: &C,
    order_id: i64,
    total: Decimal,
) -> Result<(), ServiceError> {
    let result = order::Entity::update_many()
        .col_expr(order::Column::TotalAmount, Expr::value(total))
        .filter(order::Column::Id.eq(order_id))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(ServiceError::NotFound(format!(
            "Order {} not found",
            order_id
        )));
    }
    Ok(())
}

/// Moves an order to `status`, returning the updated row.
pub async fn update_order_status<C: ConnectionTrait>(
    conn: &C,
    order_id: i64,
    status: OrderStatus,
) -> Result<order::Model, ServiceError> {
    let order = order::Entity::find_by_id(order_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

    let mut active: order::ActiveModel = order.into();
    active.status = Set(status);
    Ok(active.update(conn).await?)
}

/// Flips a product's availability flag.
pub async fn set_product_in_stock<C: ConnectionTrait>(
    conn: &C,
    product_id: i64,
    in_stock: bool,
) -> Result<(), ServiceError> {
    let result = product::Entity::update_many()
        .col_expr(product::Column::InStock, Expr::value(in_stock))
        .filter(product::Column::Id.eq(product_id))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(ServiceError::NotFound(format!(
            "Product {} not found",
            product_id
        )));
    }
    Ok(())
}

/// Appends an immutable audit entry for a credit movement. The timestamp is
/// stamped server-side on insert.
pub async fn append_transaction_log<C: ConnectionTrait>(
    conn: &C,
    from_customer_id: i64,
    to_customer_id: i64,
    amount: Decimal,
) -> Result<transaction_log::Model, ServiceError> {
    let entry = transaction_log::ActiveModel {
        from_customer_id: Set(from_customer_id),
        to_customer_id: Set(to_customer_id),
        amount: Set(amount),
        ..Default::default()
    };
    Ok(entry.insert(conn).await?)
}

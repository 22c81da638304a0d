//! End-to-end tests for checked order placement and refund cancellation:
//! atomic visibility, price snapshots, no orphan orders, and the idempotent
//! cancellation guard.

mod common;

use assert_matches::assert_matches;
use common::TestStore;
use orderdesk::db::with_transaction;
use orderdesk::entities::{order_item, product, OrderStatus};
use orderdesk::errors::ServiceError;
use orderdesk::services::{accessors, OrderLine, PlaceOrderRequest};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};

#[tokio::test]
async fn placing_order_totals_items_at_snapshot_prices() {
    let store = TestStore::new().await;
    let carol = store.seed_customer("Carol", dec!(0.00)).await;
    let p1 = store.seed_product("Widget", dec!(10.00), true).await;
    let p2 = store.seed_product("Gadget", dec!(5.00), true).await;

    let order_id = store
        .order_service()
        .place_order(PlaceOrderRequest {
            customer_id: carol.id,
            items: vec![
                OrderLine {
                    product_id: p1.id,
                    quantity: 2,
                },
                OrderLine {
                    product_id: p2.id,
                    quantity: 1,
                },
            ],
        })
        .await
        .expect("placement succeeds");

    let order = store
        .order_service()
        .get_order(order_id)
        .await
        .expect("fetch order")
        .expect("order exists");
    assert_eq!(order.status, OrderStatus::Processing);
    assert_eq!(order.total_amount, dec!(25.00));

    let items = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .all(&*store.pool)
        .await
        .expect("fetch items");
    assert_eq!(items.len(), 2);

    let item_sum: rust_decimal::Decimal = items
        .iter()
        .map(|i| i.unit_price * rust_decimal::Decimal::from(i.quantity))
        .sum();
    assert_eq!(order.total_amount, item_sum);
}

#[tokio::test]
async fn later_price_change_does_not_alter_recorded_items() {
    let store = TestStore::new().await;
    let carol = store.seed_customer("Carol", dec!(0.00)).await;
    let p1 = store.seed_product("Widget", dec!(10.00), true).await;

    let order_id = store
        .order_service()
        .place_order(PlaceOrderRequest {
            customer_id: carol.id,
            items: vec![OrderLine {
                product_id: p1.id,
                quantity: 3,
            }],
        })
        .await
        .expect("placement succeeds");

    // Reprice the product after the order committed.
    let mut active: product::ActiveModel = p1.into();
    active.price = Set(dec!(99.00));
    active.update(&*store.pool).await.expect("reprice");

    let items = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .all(&*store.pool)
        .await
        .expect("fetch items");
    assert_eq!(items[0].unit_price, dec!(10.00));

    let order = store
        .order_service()
        .get_order(order_id)
        .await
        .expect("fetch order")
        .expect("order exists");
    assert_eq!(order.total_amount, dec!(30.00));
}

#[tokio::test]
async fn order_with_unavailable_product_leaves_no_orphan_rows() {
    let store = TestStore::new().await;
    let carol = store.seed_customer("Carol", dec!(0.00)).await;
    let good = store.seed_product("Widget", dec!(10.00), true).await;
    let sold_out = store.seed_product("Gadget", dec!(5.00), false).await;

    let result = store
        .order_service()
        .place_order(PlaceOrderRequest {
            customer_id: carol.id,
            items: vec![
                OrderLine {
                    product_id: good.id,
                    quantity: 1,
                },
                OrderLine {
                    product_id: sold_out.id,
                    quantity: 1,
                },
            ],
        })
        .await;

    assert_matches!(
        result,
        Err(ServiceError::ProductUnavailable { product_id }) if product_id == sold_out.id
    );
    assert_eq!(store.order_count().await, 0);
    assert_eq!(store.order_item_count().await, 0);
}

#[tokio::test]
async fn order_with_missing_product_leaves_no_orphan_rows() {
    let store = TestStore::new().await;
    let carol = store.seed_customer("Carol", dec!(0.00)).await;

    let result = store
        .order_service()
        .place_order(PlaceOrderRequest {
            customer_id: carol.id,
            items: vec![OrderLine {
                product_id: 4242,
                quantity: 1,
            }],
        })
        .await;

    assert_matches!(result, Err(ServiceError::NotFound(_)));
    assert_eq!(store.order_count().await, 0);
    assert_eq!(store.order_item_count().await, 0);
}

#[tokio::test]
async fn order_for_missing_customer_fails_with_not_found() {
    let store = TestStore::new().await;
    let p1 = store.seed_product("Widget", dec!(10.00), true).await;

    let result = store
        .order_service()
        .place_order(PlaceOrderRequest {
            customer_id: 4242,
            items: vec![OrderLine {
                product_id: p1.id,
                quantity: 1,
            }],
        })
        .await;

    assert_matches!(result, Err(ServiceError::NotFound(_)));
    assert_eq!(store.order_count().await, 0);
}

#[tokio::test]
async fn coordinator_rolls_back_mid_sequence_failure_and_keeps_the_cause() {
    let store = TestStore::new().await;
    let carol = store.seed_customer("Carol", dec!(0.00)).await;
    let customer_id = carol.id;

    let result: Result<i64, ServiceError> = with_transaction(&store.pool, |txn| {
        Box::pin(async move {
            // First step mutates, second step fails; nothing may survive.
            accessors::insert_order(txn, customer_id, OrderStatus::Pending).await?;
            Err(ServiceError::Validation("injected failure".to_string()))
        })
    })
    .await;

    assert_matches!(result, Err(ServiceError::Validation(msg)) if msg == "injected failure");
    assert_eq!(store.order_count().await, 0);
}

#[tokio::test]
async fn cancelling_order_refunds_customer_and_restocks_products() {
    let store = TestStore::new().await;
    let carol = store.seed_customer("Carol", dec!(10.00)).await;
    let p1 = store.seed_product("Widget", dec!(10.00), true).await;
    let p2 = store.seed_product("Gadget", dec!(5.00), true).await;

    let order_id = store
        .order_service()
        .place_order(PlaceOrderRequest {
            customer_id: carol.id,
            items: vec![
                OrderLine {
                    product_id: p1.id,
                    quantity: 2,
                },
                OrderLine {
                    product_id: p2.id,
                    quantity: 1,
                },
            ],
        })
        .await
        .expect("placement succeeds");

    // One product sells out between placement and cancellation.
    accessors::set_product_in_stock(&*store.pool, p1.id, false)
        .await
        .expect("mark sold out");

    let summary = store
        .order_service()
        .cancel_order(order_id)
        .await
        .expect("cancellation succeeds");

    assert_eq!(summary.refunded_amount, dec!(25.00));
    assert_eq!(store.balance_of(carol.id).await, dec!(35.00));
    assert!(store.product_in_stock(p1.id).await);
    assert!(store.product_in_stock(p2.id).await);

    let order = store
        .order_service()
        .get_order(order_id)
        .await
        .expect("fetch order")
        .expect("order exists");
    assert_eq!(order.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn cancelling_twice_fails_and_leaves_balance_unchanged() {
    let store = TestStore::new().await;
    let carol = store.seed_customer("Carol", dec!(0.00)).await;
    let p1 = store.seed_product("Widget", dec!(10.00), true).await;

    let order_id = store
        .order_service()
        .place_order(PlaceOrderRequest {
            customer_id: carol.id,
            items: vec![OrderLine {
                product_id: p1.id,
                quantity: 1,
            }],
        })
        .await
        .expect("placement succeeds");

    store
        .order_service()
        .cancel_order(order_id)
        .await
        .expect("first cancellation succeeds");
    let balance_after_first = store.balance_of(carol.id).await;
    assert_eq!(balance_after_first, dec!(10.00));

    let second = store.order_service().cancel_order(order_id).await;
    assert_matches!(
        second,
        Err(ServiceError::AlreadyCancelled { order_id: id }) if id == order_id
    );
    assert_eq!(store.balance_of(carol.id).await, balance_after_first);
}

#[tokio::test]
async fn cancelling_missing_order_fails_with_not_found() {
    let store = TestStore::new().await;

    let result = store.order_service().cancel_order(4242).await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn order_details_join_customer_and_product_names() {
    let store = TestStore::new().await;
    let carol = store.seed_customer("Carol", dec!(0.00)).await;
    let p1 = store.seed_product("Widget", dec!(10.00), true).await;

    let order_id = store
        .order_service()
        .place_order(PlaceOrderRequest {
            customer_id: carol.id,
            items: vec![OrderLine {
                product_id: p1.id,
                quantity: 2,
            }],
        })
        .await
        .expect("placement succeeds");

    let details = store
        .order_service()
        .get_order_with_details(order_id)
        .await
        .expect("fetch details")
        .expect("order exists");

    assert_eq!(details.customer.id, carol.id);
    assert_eq!(details.items.len(), 1);
    assert_eq!(details.items[0].product_name.as_deref(), Some("Widget"));
    assert_eq!(details.items[0].item.quantity, 2);
}

#[tokio::test]
async fn order_status_can_be_advanced_through_the_lifecycle() {
    let store = TestStore::new().await;
    let carol = store.seed_customer("Carol", dec!(0.00)).await;
    let p1 = store.seed_product("Widget", dec!(10.00), true).await;

    let order_id = store
        .order_service()
        .place_order(PlaceOrderRequest {
            customer_id: carol.id,
            items: vec![OrderLine {
                product_id: p1.id,
                quantity: 1,
            }],
        })
        .await
        .expect("placement succeeds");

    let updated = store
        .order_service()
        .update_order_status(order_id, OrderStatus::Shipped)
        .await
        .expect("status update succeeds");
    assert_eq!(updated.status, OrderStatus::Shipped);

    let updated = store
        .order_service()
        .update_order_status(order_id, OrderStatus::Delivered)
        .await
        .expect("status update succeeds");
    assert_eq!(updated.status, OrderStatus::Delivered);
}

#[tokio::test]
async fn placement_and_cancellation_emit_events_after_commit() {
    let store = TestStore::new().await;
    let carol = store.seed_customer("Carol", dec!(0.00)).await;
    let p1 = store.seed_product("Widget", dec!(10.00), true).await;

    let (_customer_service, order_service, mut rx) = store.services_with_events();

    let order_id = order_service
        .place_order(PlaceOrderRequest {
            customer_id: carol.id,
            items: vec![OrderLine {
                product_id: p1.id,
                quantity: 1,
            }],
        })
        .await
        .expect("placement succeeds");

    order_service
        .cancel_order(order_id)
        .await
        .expect("cancellation succeeds");

    use orderdesk::events::Event;
    assert_matches!(rx.recv().await, Some(Event::OrderCreated(id)) if id == order_id);
    assert_matches!(rx.recv().await, Some(Event::OrderCancelled(id)) if id == order_id);
}

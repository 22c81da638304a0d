#![allow(dead_code)]

use orderdesk::db::{self, DbConfig, DbPool};
use orderdesk::entities::{customer, order, order_item, product, transaction_log, ProductStatus};
use orderdesk::events::EventSender;
use orderdesk::migrator::Migrator;
use orderdesk::services::{CustomerService, OrderService};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// In-memory SQLite store with the schema applied.
///
/// A single pooled connection keeps every statement on the same in-memory
/// database.
pub struct TestStore {
    pub pool: Arc<DbPool>,
}

impl TestStore {
    pub async fn new() -> Self {
        let config = DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };
        let pool = db::establish_connection_with_config(&config)
            .await
            .expect("sqlite connect");
        Migrator::up(&pool, None).await.expect("migrations");
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn customer_service(&self) -> CustomerService {
        CustomerService::new(self.pool.clone(), None)
    }

    pub fn order_service(&self) -> OrderService {
        OrderService::new(self.pool.clone(), None)
    }

    /// Services wired to an event channel, plus the receiving end.
    pub fn services_with_events(
        &self,
    ) -> (
        CustomerService,
        OrderService,
        mpsc::Receiver<orderdesk::events::Event>,
    ) {
        let (tx, rx) = mpsc::channel(16);
        let sender = Arc::new(EventSender::new(tx));
        (
            CustomerService::new(self.pool.clone(), Some(sender.clone())),
            OrderService::new(self.pool.clone(), Some(sender)),
            rx,
        )
    }

    pub async fn seed_customer(&self, name: &str, balance: Decimal) -> customer::Model {
        customer::ActiveModel {
            first_name: Set(name.to_string()),
            last_name: Set("Test".to_string()),
            email: Set(format!("{}@example.com", name.to_lowercase())),
            is_active: Set(true),
            credit_limit: Set(balance),
            ..Default::default()
        }
        .insert(&*self.pool)
        .await
        .expect("seed customer")
    }

    pub async fn seed_product(&self, name: &str, price: Decimal, in_stock: bool) -> product::Model {
        product::ActiveModel {
            name: Set(name.to_string()),
            description: Set(None),
            price: Set(price),
            category_id: Set(None),
            in_stock: Set(in_stock),
            status: Set(ProductStatus::Active),
            ..Default::default()
        }
        .insert(&*self.pool)
        .await
        .expect("seed product")
    }

    pub async fn balance_of(&self, customer_id: i64) -> Decimal {
        customer::Entity::find_by_id(customer_id)
            .one(&*self.pool)
            .await
            .expect("fetch customer")
            .expect("customer exists")
            .credit_limit
    }

    pub async fn product_in_stock(&self, product_id: i64) -> bool {
        product::Entity::find_by_id(product_id)
            .one(&*self.pool)
            .await
            .expect("fetch product")
            .expect("product exists")
            .in_stock
    }

    pub async fn order_count(&self) -> u64 {
        order::Entity::find()
            .count(&*self.pool)
            .await
            .expect("count orders")
    }

    pub async fn order_item_count(&self) -> u64 {
        order_item::Entity::find()
            .count(&*self.pool)
            .await
            .expect("count order items")
    }

    pub async fn transaction_log_count(&self) -> u64 {
        transaction_log::Entity::find()
            .count(&*self.pool)
            .await
            .expect("count transaction log")
    }
}

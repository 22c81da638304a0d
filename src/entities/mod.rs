//! Persisted entities mutated by the transactional workflows.

pub mod customer;
pub mod order;
pub mod order_item;
pub mod product;
pub mod transaction_log;

pub use order::OrderStatus;
pub use product::ProductStatus;

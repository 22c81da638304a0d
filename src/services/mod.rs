//! Workflow services and the entity accessor primitives they compose.

pub mod accessors;
pub mod customers;
pub mod orders;

pub use customers::{CustomerService, TransferCreditRequest, TransferReceipt};
pub use orders::{OrderLine, OrderService, PlaceOrderRequest};

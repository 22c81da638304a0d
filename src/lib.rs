//! orderdesk: transactional workflow core for a console-driven e-commerce
//! back office.
//!
//! The crate coordinates multi-step, multi-table mutations with
//! all-or-nothing semantics:
//!
//! - credit transfer between customers, with an audit trail;
//! - order placement with an inventory availability check;
//! - order cancellation with a full refund and restock.
//!
//! Each workflow runs its steps on one connection inside one transaction
//! scope ([`db::with_transaction`]); if any step fails, everything applied so
//! far is rolled back and the original error surfaces to the caller. The
//! console front end, bulk import, and reporting live outside this crate and
//! drive it through the services in [`services`].

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod migrator;
pub mod services;

pub use errors::ServiceError;

//! Domain events emitted by the workflow services.
//!
//! Events are sent only after a transaction has committed; a lost event never
//! implies lost data, so send failures are logged and swallowed.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Events that can occur in the back-office core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(i64),
    OrderCancelled(i64),
    OrderStatusChanged {
        order_id: i64,
        old_status: String,
        new_status: String,
    },
    CreditTransferred {
        from_customer_id: i64,
        to_customer_id: i64,
        amount: Decimal,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Drains the event channel, logging each event until every sender is dropped.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match serde_json::to_string(&event) {
            Ok(payload) => info!(%payload, "processing event"),
            Err(err) => error!(error = %err, ?event, "failed to serialize event"),
        }
    }
    warn!("event channel closed");
}

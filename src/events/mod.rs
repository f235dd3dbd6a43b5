use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

// Define the various events that can occur in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order events
    OrderCreated(Uuid),
    OrderCancelled(Uuid),

    // Payment events
    PaymentCaptured {
        payment_id: Uuid,
        order_id: Uuid,
    },
    PaymentFailed {
        payment_id: Uuid,
        order_id: Uuid,
        reason: String,
    },

    // Cart events
    CartItemAdded {
        customer_id: Uuid,
        product_id: Uuid,
    },
    CartItemRemoved {
        customer_id: Uuid,
        product_id: Uuid,
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

    /// Sends an event, logging instead of failing when the consumer is gone
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Dropping event: {}", e);
        }
    }
}

/// Processes incoming events. Consumers beyond logging (webhooks, analytics)
/// would hang off this loop.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::PaymentFailed {
                payment_id,
                order_id,
                reason,
            } => {
                warn!(
                    %payment_id,
                    %order_id,
                    %reason,
                    "Payment failure event recorded"
                );
            }
            other => info!("Received event: {:?}", other),
        }
    }

    info!("Event processing loop stopped");
}

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

/// Events emitted after successful mutations. Consumers (audit trail,
/// notifications) subscribe to the receiving end of the channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    PurchaseItemUpdated {
        item_id: Uuid,
        purchase_id: Uuid,
    },
    PurchaseItemDeleted {
        item_id: Uuid,
        purchase_id: Uuid,
    },
    PurchaseDeleted(Uuid),
    PurchaseTotalRecalculated {
        purchase_id: Uuid,
        total_amount: Decimal,
    },
    MedicineReclaimed(Uuid),
    ExpiryCleanupCompleted {
        pharmacy_id: Option<Uuid>,
        batches_processed: u64,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Convenience constructor pairing a sender with its receiver.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Event>) {
        let (sender, receiver) = mpsc::channel(buffer);
        (Self::new(sender), receiver)
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event; a closed channel is logged, never surfaced. Event
    /// delivery must not fail the mutation that produced it.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(err) = self.send(event).await {
            warn!(error = %err, "event channel closed, dropping event");
        }
    }
}

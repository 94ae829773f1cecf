//! Broadcast fan-out
//!
//! Turns one client's message into a line on every other client's
//! outbound queue.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::protocol::format_broadcast;
use crate::registry::Registry;
use crate::types::{ClientId, DisplayName};

/// Whether the sender gets its own message back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelfDelivery {
    /// Deliver to everyone except the sender
    #[default]
    Exclude,
    /// Deliver to every registered client, sender included
    Include,
}

/// Outcome of a single broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Recipients the line was queued for
    pub delivered: usize,
    /// Recipients skipped because their queue was full or closed
    pub skipped: usize,
}

/// Broadcast component
///
/// Holds the delivery lock for the whole snapshot-and-enqueue pass, so
/// broadcasts from different senders reach every recipient in the same
/// order. Enqueueing never waits on a socket; each client's writer does
/// the actual IO.
#[derive(Debug)]
pub struct Broadcaster {
    registry: Arc<Registry>,
    policy: SelfDelivery,
    delivery: Mutex<()>,
}

impl Broadcaster {
    pub fn new(registry: Arc<Registry>, policy: SelfDelivery) -> Self {
        Self {
            registry,
            policy,
            delivery: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> SelfDelivery {
        self.policy
    }

    /// Send `"<sender_name> says: <message>\n"` to the other clients
    ///
    /// A recipient that cannot take the line is logged and skipped; the
    /// rest still get it.
    pub fn deliver(
        &self,
        sender: ClientId,
        sender_name: &DisplayName,
        message: &str,
    ) -> DeliveryReport {
        let line: Arc<str> = Arc::from(format_broadcast(sender_name.as_str(), message));
        let mut report = DeliveryReport::default();

        let _guard = self.delivery.lock();
        for recipient in self.registry.snapshot() {
            if recipient.id == sender && self.policy == SelfDelivery::Exclude {
                continue;
            }

            match recipient.send(Arc::clone(&line)) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(
                        "Skipping client {} for message from {}: {}",
                        recipient.id, sender, e
                    );
                    report.skipped += 1;
                }
            }
        }

        debug!(
            "{} says: {} (delivered {}, skipped {})",
            sender_name, message, report.delivered, report.skipped
        );
        report
    }
}

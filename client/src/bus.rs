//! Interaction broadcast bus
//!
//! A participant-local publish/subscribe channel for transient signals that
//! let tools and resources coordinate without holding references to each
//! other. Signals are never replicated and carry no authority: consumers
//! always check them against their own replicated state before acting.
//!
//! Delivery is best-effort. A subscriber that falls more than [`BUS_CAPACITY`]
//! signals behind loses the oldest ones.

use log::{debug, warn};
use shared::{ActorId, EntityId};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

pub const BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// `actor` now holds `tool`; any other tool held by `actor` lets go.
    Held { actor: ActorId, tool: EntityId },
    /// Tools held by `actor` should announce themselves.
    PickupQuery { actor: ActorId },
    /// `tool` is in `actor`'s hand.
    PickupAck { actor: ActorId, tool: EntityId },
    /// `tool` left `actor`'s hand.
    DropAck { actor: ActorId, tool: EntityId },
    /// A swing by `actor` landed on `resource`.
    Chop { actor: ActorId, resource: EntityId },
}

#[derive(Debug, Clone)]
pub struct Bus {
    tx: broadcast::Sender<Signal>,
}

impl Bus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, signal: Signal) {
        debug!("bus <- {:?}", signal);
        // No subscribers is not an error for a fire-and-forget signal
        let _ = self.tx.send(signal);
    }

    /// Subscribes to every signal published from now on.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<Signal>,
}

impl Subscription {
    /// Next pending signal, if any, without blocking.
    pub fn next(&mut self) -> Option<Signal> {
        loop {
            match self.rx.try_recv() {
                Ok(signal) => return Some(signal),
                Err(TryRecvError::Lagged(missed)) => {
                    warn!("Bus subscriber lagged, {} signals lost", missed);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}

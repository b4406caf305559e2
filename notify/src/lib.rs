//! Advisory change fan-out.
//!
//! Mutating services publish a table-level "something changed" event after
//! every commit; connected views subscribe and re-run their queries on each
//! event. Events carry no payload and are never a source of truth: a dropped
//! or coalesced event can only make a view refresh late, never diverge.

use std::fmt;

use tokio::sync::broadcast;

/// Table whose rows changed. The only contract is "re-query before trusting
/// cached state for this table".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Reservations,
    ResourceKinds,
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Table::Reservations => "reservations",
            Table::ResourceKinds => "resource_kinds",
        };
        f.write_str(s)
    }
}

/// Event delivered to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    /// Rows of a single table changed.
    Touched(Table),
    /// The feed fell behind and events were dropped; re-query everything.
    Resync,
}

/// Publisher handle. Cheap to clone; every clone feeds the same subscribers.
#[derive(Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<Table>,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Announce that rows of `table` changed. Succeeds even with no
    /// subscribers connected.
    pub fn publish(&self, table: Table) {
        match self.tx.send(table) {
            Ok(receivers) => {
                tracing::debug!(table = %table, receivers, "change published");
            }
            Err(_) => {
                tracing::trace!(table = %table, "change published with no subscribers");
            }
        }
    }

    pub fn subscribe(&self) -> ChangeFeed {
        ChangeFeed {
            rx: self.tx.subscribe(),
        }
    }
}

/// Subscriber end of the fan-out.
pub struct ChangeFeed {
    rx: broadcast::Receiver<Table>,
}

impl ChangeFeed {
    /// Wait for the next change. Returns `None` once every publisher handle
    /// is gone.
    pub async fn changed(&mut self) -> Option<ChangeEvent> {
        match self.rx.recv().await {
            Ok(table) => Some(ChangeEvent::Touched(table)),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "change feed lagged; requesting full resync");
                Some(ChangeEvent::Resync)
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

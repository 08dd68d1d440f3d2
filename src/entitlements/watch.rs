//! Push-driven entitlement watches.
//!
//! Relay writes publish an [`EntitlementChange`] on the [`ChangeHub`]. Each
//! [`EntitlementWatch`] owns one task that listens for changes to its viewer
//! and recomputes the status. Dropping the watch aborts the task.

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::db::{DbPool, queries};

use super::{EntitlementStatus, load_status};

const DEFAULT_HUB_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangedTable {
    Profiles,
    Subscriptions,
    Authors,
    Enrollments,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitlementChange {
    pub user_id: String,
    pub table: ChangedTable,
}

/// In-process fan-out of entitlement row changes.
#[derive(Debug, Clone)]
pub struct ChangeHub {
    tx: broadcast::Sender<EntitlementChange>,
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new(DEFAULT_HUB_CAPACITY)
    }
}

impl ChangeHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish a change. Having no listeners is normal.
    pub fn publish(&self, user_id: &str, table: ChangedTable) {
        let _ = self.tx.send(EntitlementChange {
            user_id: user_id.to_string(),
            table,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EntitlementChange> {
        self.tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Current knowledge about a viewer's entitlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WatchState {
    /// Not computed yet. Consumers must gate as if not subscribed.
    Pending,
    Ready(EntitlementStatus),
}

impl WatchState {
    pub fn is_active(&self) -> bool {
        matches!(self, WatchState::Ready(status) if status.active)
    }
}

/// A live, cancellable view of one viewer's entitlement.
pub struct EntitlementWatch {
    rx: watch::Receiver<WatchState>,
    task: JoinHandle<()>,
}

impl EntitlementWatch {
    /// Start watching `user_id`. The first observed value is
    /// [`WatchState::Pending`]; the computed status follows.
    pub fn spawn(pool: DbPool, hub: &ChangeHub, user_id: String) -> Self {
        let (tx, rx) = watch::channel(WatchState::Pending);
        // Subscribe before the first computation so no change slips between.
        let mut changes = hub.subscribe();

        let task = tokio::spawn(async move {
            recompute(&pool, &user_id, &tx);

            loop {
                match changes.recv().await {
                    Ok(change) if change.user_id == user_id => {
                        tracing::debug!(
                            "Entitlement change for {} ({:?}), recomputing",
                            user_id,
                            change.table
                        );
                        recompute(&pool, &user_id, &tx);
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            "Entitlement watch for {} lagged by {} changes, recomputing",
                            user_id,
                            skipped
                        );
                        recompute(&pool, &user_id, &tx);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }

                if tx.is_closed() {
                    break;
                }
            }
        });

        Self { rx, task }
    }

    pub fn current(&self) -> WatchState {
        self.rx.borrow().clone()
    }

    /// Current state, marked as seen so [`changed`](Self::changed) waits
    /// for the next distinct one.
    pub fn observe(&mut self) -> WatchState {
        self.rx.borrow_and_update().clone()
    }

    pub fn receiver(&self) -> watch::Receiver<WatchState> {
        self.rx.clone()
    }

    /// Wait for the next distinct state.
    pub async fn changed(&mut self) -> Result<WatchState, watch::error::RecvError> {
        self.rx.changed().await?;
        Ok(self.rx.borrow_and_update().clone())
    }

    /// Release the watch. Equivalent to dropping it.
    pub fn close(self) {}
}

impl Drop for EntitlementWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Recompute and publish. On failure the previous state is kept, so a watch
/// that never computed stays `Pending`.
fn recompute(pool: &DbPool, user_id: &str, tx: &watch::Sender<WatchState>) {
    let conn = match pool.get() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("Entitlement watch: failed to get DB connection: {}", e);
            return;
        }
    };

    match load_status(&conn, user_id, queries::now()) {
        Ok(status) => {
            let next = WatchState::Ready(status);
            tx.send_if_modified(|current| {
                if *current == next {
                    false
                } else {
                    *current = next;
                    true
                }
            });
        }
        Err(e) => {
            tracing::warn!("Entitlement watch: failed to load status for {}: {}", user_id, e);
        }
    }
}

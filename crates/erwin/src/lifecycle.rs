//! Lifecycle notifications for supervised processes.
//!
//! Three broadcast surfaces:
//!
//! - a per-name topic that fires when that process closes
//! - a wildcard channel carrying the name of every closed process
//! - an all-closed signal that fires whenever the live set drains to empty

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::debug;

const NOTICE_CAPACITY: usize = 16;

/// Hub for process-closed and all-closed notifications.
///
/// Cheap to clone; clones share the underlying channels. Subscribers
/// unsubscribe by dropping their receiver.
#[derive(Clone)]
pub struct LifecycleHub {
    /// Per-name closed topics, created on demand and discarded once fired.
    closed_topics: Arc<RwLock<HashMap<String, broadcast::Sender<()>>>>,
    closed_tx: broadcast::Sender<String>,
    all_closed_tx: broadcast::Sender<()>,
}

impl LifecycleHub {
    pub(crate) fn new() -> Self {
        let (closed_tx, _) = broadcast::channel(NOTICE_CAPACITY);
        let (all_closed_tx, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            closed_topics: Arc::new(RwLock::new(HashMap::new())),
            closed_tx,
            all_closed_tx,
        }
    }

    /// Subscribe to the closed notification for one process name.
    ///
    /// The topic fires once per close and is then discarded, so a
    /// subscription made after a process closed waits for the next close
    /// under that name. Subscribe before triggering the close you are
    /// waiting for.
    pub async fn subscribe_process_closed(&self, name: &str) -> broadcast::Receiver<()> {
        let mut topics = self.closed_topics.write().await;
        topics
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(NOTICE_CAPACITY).0)
            .subscribe()
    }

    /// Subscribe to every closed notification; items carry the process name.
    pub fn subscribe_closed(&self) -> broadcast::Receiver<String> {
        self.closed_tx.subscribe()
    }

    /// Subscribe to the all-processes-closed signal.
    ///
    /// Fires each time the live set drains to empty, so it can fire more
    /// than once over the life of a supervisor.
    pub fn subscribe_all_closed(&self) -> broadcast::Receiver<()> {
        self.all_closed_tx.subscribe()
    }

    /// Fire the closed notifications for `name`.
    pub(crate) async fn notify_closed(&self, name: &str) {
        let topic = self.closed_topics.write().await.remove(name);
        if let Some(tx) = topic {
            let _ = tx.send(());
        }
        let _ = self.closed_tx.send(name.to_string());
        debug!(name = %name, "process closed notification");
    }

    /// Fire the all-closed signal.
    pub(crate) fn notify_all_closed(&self) {
        let _ = self.all_closed_tx.send(());
        debug!("all processes closed notification");
    }
}

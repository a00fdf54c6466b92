//! Shared in-memory message log.
//!
//! One exclusive lock guards the log, the id counter, and the clear epoch
//! together; every mutation broadcasts a [`ChangeNotification`] so that live
//! stream sessions wake up and re-derive their view from the log. Receivers
//! never consume the notification payload as data, which makes a lagged
//! broadcast receiver equivalent to a plain wake-up.

use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::types::{now_ts, Message, Role};

/// Default number of retained messages.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Notification sent after every append or clear.
///
/// Advisory only: sessions re-read the log under the lock after waking.
#[derive(Debug, Clone)]
pub struct ChangeNotification {
    /// Highest id issued so far
    pub last_id: u64,
    /// Epoch in force after the mutation
    pub epoch: u64,
}

/// Backlog returned at stream-session entry: the retained messages newer
/// than the resume point, plus the epoch in force when they were read.
#[derive(Debug, Clone)]
pub struct Backlog {
    pub messages: Vec<Message>,
    pub epoch: u64,
}

/// Result of a live session's per-wake read.
#[derive(Debug, Clone)]
pub struct LivePoll {
    /// History was wiped at least once since the session's known epoch
    pub cleared: bool,
    /// Epoch in force at read time
    pub epoch: u64,
    /// Messages to emit this pass, ascending id order
    pub pending: Vec<Message>,
}

#[derive(Debug, Default)]
struct LogState {
    messages: VecDeque<Message>,
    next_id: u64,
    epoch: u64,
}

/// Bounded append-only message log with broadcast wake-ups.
pub struct MessageLog {
    state: Mutex<LogState>,
    notify_tx: broadcast::Sender<ChangeNotification>,
    capacity: usize,
}

impl MessageLog {
    /// Create a new shared log retaining at most `capacity` messages.
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self::with_capacity(capacity))
    }

    fn with_capacity(capacity: usize) -> Self {
        let (notify_tx, _) = broadcast::channel(1024);
        Self {
            state: Mutex::new(LogState::default()),
            notify_tx,
            capacity,
        }
    }

    /// Subscribe to change notifications.
    ///
    /// Subscribe before reading the backlog: anything appended afterwards is
    /// either in the snapshot or queued on the receiver, never lost.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotification> {
        self.notify_tx.subscribe()
    }

    /// Append a message and wake all waiting sessions.
    ///
    /// Id allocation, insertion, and eviction happen in one critical
    /// section. Eviction is not a clear and does not touch the epoch.
    /// Input is validated by the ingest endpoint; this never fails.
    pub fn append(&self, role: Role, content: String, name: String) -> Message {
        let mut state = self.state.lock();

        state.next_id += 1;
        let msg = Message {
            id: state.next_id,
            ts: now_ts(),
            role,
            content,
            name,
        };
        state.messages.push_back(msg.clone());

        if state.messages.len() > self.capacity {
            state.messages.pop_front();
        }

        debug!(id = msg.id, role = %msg.role, "Appended message");

        let _ = self.notify_tx.send(ChangeNotification {
            last_id: state.next_id,
            epoch: state.epoch,
        });

        msg
    }

    /// All retained messages with id greater than `last_id`, ascending.
    pub fn snapshot_since(&self, last_id: u64) -> Vec<Message> {
        let state = self.state.lock();
        state
            .messages
            .iter()
            .filter(|m| m.id > last_id)
            .cloned()
            .collect()
    }

    /// Full current contents, oldest first.
    pub fn list_all(&self) -> Vec<Message> {
        let state = self.state.lock();
        state.messages.iter().cloned().collect()
    }

    /// Backlog for a connecting session: snapshot and epoch read together,
    /// so the session cannot pair a pre-clear snapshot with a post-clear
    /// epoch or vice versa.
    pub fn backlog(&self, after_id: u64) -> Backlog {
        let state = self.state.lock();
        Backlog {
            messages: state
                .messages
                .iter()
                .filter(|m| m.id > after_id)
                .cloned()
                .collect(),
            epoch: state.epoch,
        }
    }

    /// Current clear epoch.
    pub fn epoch(&self) -> u64 {
        self.state.lock().epoch
    }

    /// Empty the log, advance the epoch, and wake all waiting sessions.
    ///
    /// The id counter is deliberately untouched: ids issued after a clear
    /// are always higher than anything a client has seen, which is what
    /// lets resume cursors survive a wipe.
    pub fn clear(&self) {
        let mut state = self.state.lock();

        state.messages.clear();
        state.epoch += 1;

        info!(epoch = state.epoch, "Cleared history");

        let _ = self.notify_tx.send(ChangeNotification {
            last_id: state.next_id,
            epoch: state.epoch,
        });
    }

    /// A live session's per-wake read, one lock acquisition.
    ///
    /// When the epoch moved, the pass reports only the clear: pending stays
    /// empty even if post-clear messages already exist, so the peer always
    /// observes the wipe before anything appended after it. The next wake
    /// (already queued on the session's receiver) delivers those messages.
    /// When nothing moved and the wait simply timed out, pending is empty.
    pub fn poll(&self, last_seen_id: u64, known_epoch: u64, notified: bool) -> LivePoll {
        let state = self.state.lock();

        if state.epoch != known_epoch {
            return LivePoll {
                cleared: true,
                epoch: state.epoch,
                pending: Vec::new(),
            };
        }

        let pending = if notified {
            state
                .messages
                .iter()
                .filter(|m| m.id > last_seen_id)
                .cloned()
                .collect()
        } else {
            Vec::new()
        };

        LivePoll {
            cleared: false,
            epoch: state.epoch,
            pending,
        }
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

//! Event bus for task run lifecycle events.
//!
//! Uses [`tokio::sync::broadcast`] for fan-out delivery to multiple
//! subscribers. Events are fire-and-forget projections of run state --
//! dropping them is acceptable, the persisted report is the source of
//! truth.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Task run lifecycle event.
///
/// Emitted by the engine as runs progress. Identifiers are carried as
/// strings so events serialize the same way they are logged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TaskEvent {
    /// A run has started.
    Started {
        /// The run identifier.
        run_id: String,
        /// The task key.
        task: String,
    },
    /// One record failed recoverably; the run continues.
    RecordFailed {
        /// The run identifier.
        run_id: String,
        /// Name of the failed record.
        record: String,
        /// Error description.
        error: String,
    },
    /// A run finished normally.
    Completed {
        /// The run identifier.
        run_id: String,
        /// Total run duration.
        duration: Duration,
        /// Records processed.
        processed: u64,
    },
    /// A run stopped at a record boundary after a termination request.
    Terminated {
        /// The run identifier.
        run_id: String,
        /// Records processed before the stop.
        processed: u64,
    },
    /// A run aborted on a fatal error.
    Failed {
        /// The run identifier.
        run_id: String,
        /// Error description.
        error: String,
    },
}

/// Broadcast-based event bus.
///
/// Delivers events to all active subscribers. If no subscribers are
/// listening, events are silently dropped (fire-and-forget).
///
/// # Examples
///
/// ```
/// use warden_telemetry::event::{EventBus, TaskEvent};
///
/// let bus = EventBus::new(64);
/// let mut sub = bus.subscribe();
///
/// bus.emit(TaskEvent::Started {
///     run_id: "run-1".into(),
///     task: "account_aggregation".into(),
/// });
///
/// // In async context: let event = sub.recv().await;
/// assert_eq!(bus.total_emitted(), 1);
/// ```
pub struct EventBus {
    sender: broadcast::Sender<TaskEvent>,
    emitted: AtomicU64,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    ///
    /// When the channel is full, the oldest events are dropped (lagging
    /// subscribers will see a `RecvError::Lagged`).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            emitted: AtomicU64::new(0),
        }
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns silently if there are no active subscribers.
    pub fn emit(&self, event: TaskEvent) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
        // Ignore send error (no active receivers).
        let _ = self.sender.send(event);
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> TaskEventSubscriber {
        TaskEventSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    /// Total number of events emitted since creation.
    #[must_use]
    pub fn total_emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Subscription handle for receiving events from the [`EventBus`].
pub struct TaskEventSubscriber {
    receiver: broadcast::Receiver<TaskEvent>,
}

impl TaskEventSubscriber {
    /// Receive the next event, waiting asynchronously.
    ///
    /// Returns `None` if the sender has been dropped. Lagged gaps (missed
    /// events due to buffer overflow) are skipped.
    pub async fn recv(&mut self) -> Option<TaskEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Try to receive an event without blocking.
    ///
    /// Returns `None` if no event is immediately available.
    pub fn try_recv(&mut self) -> Option<TaskEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

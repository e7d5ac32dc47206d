//! Per-job event fan-out.
//!
//! Each job owns one channel holding a backlog of everything published
//! so far plus a bounded broadcast sender for live delivery. The
//! pipeline publishes progress and artifact events into it; any number
//! of stream readers subscribe and first replay the backlog, so a
//! reader that connects after processing started still sees every
//! event in order. The channel accepts exactly one terminal event,
//! after which further publishes are refused and the channel is torn
//! down once a linger window for late subscribers has passed.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::debug;

use gifsmith_models::{JobId, StreamEvent};

struct Channel {
    tx: broadcast::Sender<StreamEvent>,
    backlog: Vec<StreamEvent>,
    closed: bool,
    epoch: u64,
}

/// One reader's view of a job's events: the history published before
/// the subscription, then a live receiver for what follows. Both are
/// taken under one lock, so no event falls in the gap between them.
pub struct Subscription {
    pub backlog: Vec<StreamEvent>,
    pub live: broadcast::Receiver<StreamEvent>,
}

pub struct EventHub {
    capacity: usize,
    linger: Duration,
    channels: RwLock<HashMap<JobId, Channel>>,
}

impl EventHub {
    pub fn new(capacity: usize, linger: Duration) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            linger,
            channels: RwLock::new(HashMap::new()),
        })
    }

    /// Open a fresh channel for `job_id`, replacing any previous one. A
    /// replaced channel's pending teardown becomes a no-op through the
    /// epoch bump.
    pub fn open(&self, job_id: JobId) {
        let (tx, _) = broadcast::channel(self.capacity);
        let mut channels = self.write();
        let epoch = channels.get(&job_id).map(|c| c.epoch + 1).unwrap_or(0);
        channels.insert(
            job_id,
            Channel {
                tx,
                backlog: Vec::new(),
                closed: false,
                epoch,
            },
        );
    }

    /// Subscribe to a job's events. A closed channel still answers with
    /// its backlog (which ends in the terminal event) until the linger
    /// window tears it down; None only once the channel is gone, at
    /// which point the job's final state lives in the registry.
    pub fn subscribe(&self, job_id: JobId) -> Option<Subscription> {
        self.read().get(&job_id).map(|c| Subscription {
            backlog: c.backlog.clone(),
            live: c.tx.subscribe(),
        })
    }

    pub fn is_open(&self, job_id: JobId) -> bool {
        self.read().get(&job_id).map(|c| !c.closed).unwrap_or(false)
    }

    /// Publish an event to a job's channel. Returns false when the channel
    /// is missing or already closed by a terminal event. Publishing a
    /// terminal event closes the channel and schedules teardown after the
    /// linger window.
    pub fn publish(self: &Arc<Self>, job_id: JobId, event: StreamEvent) -> bool {
        let terminal = event.is_terminal();
        {
            let mut channels = self.write();
            let channel = match channels.get_mut(&job_id) {
                Some(c) if !c.closed => c,
                _ => return false,
            };
            channel.backlog.push(event.clone());
            // Send errors just mean no subscriber is connected right
            // now; the event is already in the backlog for whoever
            // connects later.
            let _ = channel.tx.send(event);
            if !terminal {
                return true;
            }
            channel.closed = true;
            let epoch = channel.epoch;
            let hub = Arc::clone(self);
            tokio::spawn(async move {
                tokio::time::sleep(hub.linger).await;
                hub.teardown(job_id, epoch);
            });
        }
        true
    }

    /// Remove the channel immediately, regardless of linger.
    pub fn close_now(&self, job_id: JobId) {
        self.write().remove(&job_id);
    }

    fn teardown(&self, job_id: JobId, epoch: u64) {
        let mut channels = self.write();
        if let Some(channel) = channels.get(&job_id) {
            if channel.epoch == epoch {
                channels.remove(&job_id);
                debug!(%job_id, "event channel torn down");
            }
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<JobId, Channel>> {
        self.channels.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<JobId, Channel>> {
        self.channels.write().unwrap_or_else(|e| e.into_inner())
    }
}

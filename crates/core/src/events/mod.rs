//! Lifecycle events and the synchronous event bus.
//!
//! Subscribers are optional: with none registered, publishing is a no-op.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agent::DownloadEntry;
use crate::release::{MetaFile, ReleaseState};

/// Something observable happened to a release, agent, or queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    ReleaseAdded {
        release_id: String,
        hash: String,
        name: String,
    },
    ReleaseStateChanged {
        release_id: String,
        hash: String,
        from: ReleaseState,
        to: ReleaseState,
    },
    ReleaseDeleted {
        release_id: String,
    },
    MetaFilesUpdated {
        release_id: String,
        meta_files: Vec<MetaFile>,
    },
    DownloadStateChanged {
        agent_id: String,
        entry: DownloadEntry,
    },
    AgentUpdated {
        agent_id: String,
        enabled: bool,
    },
    SampleQueueFull {
        release_id: String,
        capacity: usize,
    },
}

impl LifecycleEvent {
    /// The snake_case name used as the serialized `type` tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            LifecycleEvent::ReleaseAdded { .. } => "release_added",
            LifecycleEvent::ReleaseStateChanged { .. } => "release_state_changed",
            LifecycleEvent::ReleaseDeleted { .. } => "release_deleted",
            LifecycleEvent::MetaFilesUpdated { .. } => "meta_files_updated",
            LifecycleEvent::DownloadStateChanged { .. } => "download_state_changed",
            LifecycleEvent::AgentUpdated { .. } => "agent_updated",
            LifecycleEvent::SampleQueueFull { .. } => "sample_queue_full",
        }
    }
}

/// Receives every published event, on the publisher's task.
///
/// Implementations must return quickly; anything slow belongs behind a
/// channel owned by the subscriber.
pub trait EventSubscriber: Send + Sync {
    fn on_event(&self, event: &LifecycleEvent);
}

/// Fan-out of events to registered subscribers. Cheap to clone.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Arc<dyn EventSubscriber>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) {
        match self.subscribers.write() {
            Ok(mut subscribers) => subscribers.push(subscriber),
            Err(poisoned) => poisoned.into_inner().push(subscriber),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        match self.subscribers.read() {
            Ok(subscribers) => subscribers.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn publish(&self, event: LifecycleEvent) {
        let subscribers = match self.subscribers.read() {
            Ok(subscribers) => subscribers.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        for subscriber in subscribers {
            subscriber.on_event(&event);
        }
    }
}

/// Writes every event to the log at debug level.
pub struct LogSubscriber;

impl EventSubscriber for LogSubscriber {
    fn on_event(&self, event: &LifecycleEvent) {
        match serde_json::to_string(event) {
            Ok(json) => debug!("event {}: {}", event.event_type(), json),
            Err(_) => debug!("event {}", event.event_type()),
        }
    }
}

//! Mock sample processor and event recorder for testing.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::events::{EventSubscriber, LifecycleEvent};
use crate::release::{MetaFile, Release};
use crate::samples::{SampleError, SampleOutcome, SampleProcessor};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Mock implementation of the [`SampleProcessor`] trait.
#[derive(Debug)]
pub struct MockSampleProcessor {
    answer: Mutex<Result<SampleOutcome, String>>,
    processed: Mutex<Vec<String>>,
}

impl Default for MockSampleProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSampleProcessor {
    /// Processes every sample into an empty outcome.
    pub fn new() -> Self {
        Self {
            answer: Mutex::new(Ok(SampleOutcome::default())),
            processed: Mutex::new(Vec::new()),
        }
    }

    pub fn set_outcome(&self, outcome: SampleOutcome) {
        *lock(&self.answer) = Ok(outcome);
    }

    pub fn set_error(&self, message: &str) {
        *lock(&self.answer) = Err(message.to_string());
    }

    /// Ids of the sample meta files processed so far.
    pub fn processed(&self) -> Vec<String> {
        lock(&self.processed).clone()
    }
}

#[async_trait]
impl SampleProcessor for MockSampleProcessor {
    async fn process(
        &self,
        _release: &Release,
        sample: &MetaFile,
        _path: &Path,
    ) -> Result<SampleOutcome, SampleError> {
        lock(&self.processed).push(sample.id.clone());
        lock(&self.answer).clone().map_err(SampleError::Processing)
    }
}

/// Event subscriber keeping everything it receives.
#[derive(Debug, Default)]
pub struct RecordingSubscriber {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        lock(&self.events).clone()
    }

    /// Events whose type tag is `event_type`, e.g. `release_state_changed`.
    pub fn of_type(&self, event_type: &str) -> Vec<LifecycleEvent> {
        lock(&self.events)
            .iter()
            .filter(|e| e.event_type() == event_type)
            .cloned()
            .collect()
    }
}

impl EventSubscriber for RecordingSubscriber {
    fn on_event(&self, event: &LifecycleEvent) {
        lock(&self.events).push(event.clone());
    }
}

//! Mock discovery sources and lookup service for testing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::intake::{
    Candidate, IntakeError, LookupResult, ReleaseLookup, Source, SourceConnector, SourceRecord,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Debug, Default)]
struct SourceState {
    candidates: Vec<Candidate>,
    files: HashMap<String, Vec<u8>>,
    poll_error: Option<String>,
    polls: usize,
}

/// Mock implementation of the [`Source`] trait.
///
/// Candidates are announced in insertion order; URLs resolve to whatever
/// bytes were registered for them.
#[derive(Debug, Default)]
pub struct MockSource {
    state: Mutex<SourceState>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Announce `title` with its metadata bytes behind `url`.
    pub fn add_candidate(&self, title: &str, url: &str, bytes: Vec<u8>) {
        self.announce(title, url);
        self.set_file(url, bytes);
    }

    /// Announce `title` without anything behind `url` yet.
    pub fn announce(&self, title: &str, url: &str) {
        lock(&self.state).candidates.push(Candidate {
            title: title.to_string(),
            metadata_url: url.to_string(),
            image_url: None,
        });
    }

    /// Attach an image URL to the already announced `title`.
    pub fn set_image(&self, title: &str, url: &str, bytes: Vec<u8>) {
        let mut state = lock(&self.state);
        for candidate in state.candidates.iter_mut().filter(|c| c.title == title) {
            candidate.image_url = Some(url.to_string());
        }
        state.files.insert(url.to_string(), bytes);
    }

    pub fn set_file(&self, url: &str, bytes: Vec<u8>) {
        lock(&self.state).files.insert(url.to_string(), bytes);
    }

    pub fn clear(&self) {
        lock(&self.state).candidates.clear();
    }

    /// Fail every poll with `message` until cleared with `None`.
    pub fn set_poll_error(&self, message: Option<&str>) {
        lock(&self.state).poll_error = message.map(str::to_string);
    }

    pub fn polls(&self) -> usize {
        lock(&self.state).polls
    }
}

#[async_trait]
impl Source for MockSource {
    async fn poll(&self) -> Result<Vec<Candidate>, IntakeError> {
        let mut state = lock(&self.state);
        state.polls += 1;
        if let Some(message) = &state.poll_error {
            return Err(IntakeError::Fetch(message.clone()));
        }
        Ok(state.candidates.clone())
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, IntakeError> {
        lock(&self.state)
            .files
            .get(url)
            .cloned()
            .ok_or_else(|| IntakeError::Fetch(format!("404 for {}", url)))
    }
}

/// Mock [`SourceConnector`] handing out one [`MockSource`] per source name.
#[derive(Debug, Default)]
pub struct MockSourceConnector {
    sources: Mutex<HashMap<String, Arc<MockSource>>>,
}

impl MockSourceConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The source named `name`, creating it if nothing connected yet.
    pub fn source(&self, name: &str) -> Arc<MockSource> {
        Arc::clone(
            lock(&self.sources)
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(MockSource::new())),
        )
    }
}

impl SourceConnector for MockSourceConnector {
    fn connect(&self, record: &SourceRecord) -> Result<Arc<dyn Source>, IntakeError> {
        let source: Arc<dyn Source> = self.source(&record.name);
        Ok(source)
    }
}

/// Mock implementation of the [`ReleaseLookup`] trait.
///
/// Answers every name with the same configured result or error.
#[derive(Debug)]
pub struct MockLookup {
    answer: Mutex<Result<LookupResult, String>>,
    lookups: Mutex<Vec<String>>,
}

impl Default for MockLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLookup {
    /// A lookup that knows nothing about any release.
    pub fn new() -> Self {
        Self {
            answer: Mutex::new(Ok(LookupResult::default())),
            lookups: Mutex::new(Vec::new()),
        }
    }

    pub fn set_result(&self, result: LookupResult) {
        *lock(&self.answer) = Ok(result);
    }

    pub fn set_error(&self, message: &str) {
        *lock(&self.answer) = Err(message.to_string());
    }

    /// Names looked up so far.
    pub fn lookups(&self) -> Vec<String> {
        lock(&self.lookups).clone()
    }
}

#[async_trait]
impl ReleaseLookup for MockLookup {
    async fn lookup(&self, name: &str) -> Result<LookupResult, IntakeError> {
        lock(&self.lookups).push(name.to_string());
        lock(&self.answer).clone().map_err(IntakeError::Lookup)
    }
}

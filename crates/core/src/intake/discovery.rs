//! Periodic polling of one discovery source.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::release::{classify, SourceImage};
use crate::samples::SamplesConfig;
use crate::scheduler::{CancelSignal, Task};
use crate::store::Store;

use super::source::Source;
use super::types::{Candidate, IntakeError};
use super::worker::IntakeHandle;

/// How long a title stays in the seen cache.
pub const SEEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Polls a source, fetches and classifies new candidates, and hands them
/// to intake. Runs as the task of the source's scheduler.
pub struct SourcePoller {
    source_id: String,
    source: Arc<dyn Source>,
    store: Arc<dyn Store>,
    intake: IntakeHandle,
    samples: SamplesConfig,
    seen: Mutex<HashMap<String, Instant>>,
}

impl SourcePoller {
    pub fn new(
        source_id: impl Into<String>,
        source: Arc<dyn Source>,
        store: Arc<dyn Store>,
        intake: IntakeHandle,
        samples: SamplesConfig,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            source,
            store,
            intake,
            samples,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// One poll of the source. Returns how many releases were handed to
    /// intake.
    pub async fn poll_once(&self, cancel: &CancelSignal) -> usize {
        let candidates = match self.source.poll().await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Source {} poll failed: {}", self.source_id, e);
                self.record_check();
                return 0;
            }
        };

        let mut submitted = 0;
        for candidate in candidates {
            if cancel.is_cancelled() {
                break;
            }
            if !self.first_sighting(&candidate.title) {
                continue;
            }
            match self.ingest(&candidate).await {
                Ok(()) => {
                    self.remember(&candidate.title);
                    submitted += 1;
                }
                Err(IntakeError::ChannelClosed) => {
                    warn!("Intake closed, stopping poll of source {}", self.source_id);
                    break;
                }
                Err(e @ IntakeError::Fetch(_)) => {
                    // Retried on the next poll.
                    warn!("Source {}: {}: {}", self.source_id, candidate.title, e);
                }
                Err(e) => {
                    warn!("Source {}: skipping {}: {}", self.source_id, candidate.title, e);
                    self.remember(&candidate.title);
                }
            }
        }

        self.record_check();
        if submitted > 0 {
            info!("Source {} announced {} new releases", self.source_id, submitted);
        }
        submitted
    }

    async fn ingest(&self, candidate: &Candidate) -> Result<(), IntakeError> {
        let metadata = self.source.fetch(&candidate.metadata_url).await?;

        let image = match &candidate.image_url {
            Some(url) => match self.source.fetch(url).await {
                Ok(bytes) => Some(SourceImage {
                    extension: image_extension(url),
                    bytes,
                }),
                Err(e) => {
                    debug!("Image for {} unavailable: {}", candidate.title, e);
                    None
                }
            },
            None => None,
        };

        let new_release = classify(
            &candidate.title,
            Some(&self.source_id),
            metadata,
            image,
            &self.samples,
        )?;
        self.intake.submit(new_release).await
    }

    /// Whether the title is absent from the seen cache. Expired entries are
    /// pruned on the way.
    fn first_sighting(&self, title: &str) -> bool {
        let mut seen = match self.seen.lock() {
            Ok(seen) => seen,
            Err(poisoned) => poisoned.into_inner(),
        };
        seen.retain(|_, at| at.elapsed() < SEEN_TTL);
        !seen.contains_key(title)
    }

    fn remember(&self, title: &str) {
        let mut seen = match self.seen.lock() {
            Ok(seen) => seen,
            Err(poisoned) => poisoned.into_inner(),
        };
        seen.insert(title.to_string(), Instant::now());
    }

    fn record_check(&self) {
        let result = self.store.get_source(&self.source_id).and_then(|record| {
            let Some(mut record) = record else {
                return Ok(());
            };
            record.times_checked += 1;
            record.last_check = Some(Utc::now());
            self.store.update_source(&record)
        });
        if let Err(e) = result {
            warn!("Failed to record check of source {}: {}", self.source_id, e);
        }
    }
}

#[async_trait]
impl Task for SourcePoller {
    async fn run(&self, cancel: CancelSignal) {
        self.poll_once(&cancel).await;
    }
}

/// Extension, with dot, of an image URL's path. Unknown types become `.jpg`.
fn image_extension(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or_else(|| "jpg".to_string());
    format!(".{}", ext)
}

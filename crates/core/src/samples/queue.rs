//! Bounded sample queue and its single consumer.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::events::{EventBus, LifecycleEvent};
use crate::orchestrator::WorkingSet;
use crate::release::{MetaFile, MetaFileKind, MetaFileState, NO_INDEX};
use crate::store::{ArtifactStore, Store, StoreError};

use super::processor::SampleProcessor;

/// One downloaded sample waiting for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleJob {
    pub release_id: String,
    pub hash: String,
    pub meta_file_id: String,
}

/// Result of offering a job to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Queued,
    /// The release already has a sample queued or in processing.
    AlreadyPending,
    /// The queue is at capacity. Nothing was queued.
    Full,
    /// The consumer is gone.
    Closed,
}

/// Producer side of the sample queue. Cheap to clone.
///
/// Offering never waits: a full queue is reported back to the caller, who
/// leaves the sample `DOWNLOADED` so a later poll offers it again.
#[derive(Clone)]
pub struct SampleQueue {
    tx: mpsc::Sender<SampleJob>,
    pending: Arc<Mutex<HashSet<String>>>,
    capacity: usize,
}

impl SampleQueue {
    pub fn offer(&self, job: SampleJob) -> Offer {
        let mut pending = match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if pending.contains(&job.release_id) {
            return Offer::AlreadyPending;
        }

        let release_id = job.release_id.clone();
        match self.tx.try_send(job) {
            Ok(()) => {
                pending.insert(release_id);
                Offer::Queued
            }
            Err(mpsc::error::TrySendError::Full(_)) => Offer::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => Offer::Closed,
        }
    }

    /// Release the pending guard once a job is done.
    pub fn complete(&self, release_id: &str) {
        let mut pending = match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        pending.remove(release_id);
    }

    pub fn is_pending(&self, release_id: &str) -> bool {
        match self.pending.lock() {
            Ok(guard) => guard.contains(release_id),
            Err(poisoned) => poisoned.into_inner().contains(release_id),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Jobs waiting in the channel.
    pub fn depth(&self) -> usize {
        self.capacity.saturating_sub(self.tx.capacity())
    }
}

/// Single consumer processing samples one at a time.
pub struct SampleWorker {
    rx: mpsc::Receiver<SampleJob>,
    queue: SampleQueue,
    store: Arc<dyn Store>,
    artifacts: ArtifactStore,
    working_set: Arc<WorkingSet>,
    events: EventBus,
    processor: Arc<dyn SampleProcessor>,
}

impl SampleWorker {
    /// Consume jobs until shutdown or until every producer is dropped.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!("Sample worker started");
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Sample worker received shutdown signal");
                    break;
                }
                job = self.rx.recv() => {
                    let Some(job) = job else {
                        break;
                    };
                    self.handle(&job).await;
                    self.queue.complete(&job.release_id);
                }
            }
        }
        info!("Sample worker shutting down");
    }

    async fn handle(&self, job: &SampleJob) {
        let release = match self.store.get_release(&job.release_id) {
            Ok(Some(release)) => release,
            Ok(None) => {
                warn!("Sample job for unknown release {}", job.release_id);
                return;
            }
            Err(e) => {
                error!("Failed to load release {} for sample: {}", job.release_id, e);
                return;
            }
        };

        let Some(mut sample) = release
            .meta_files
            .iter()
            .find(|m| m.id == job.meta_file_id)
            .cloned()
        else {
            warn!("Release {} has no meta file {}", release.id, job.meta_file_id);
            return;
        };
        if sample.state != MetaFileState::Downloaded {
            debug!(
                "Sample {} of release {} is {}, skipping",
                sample.id,
                release.id,
                sample.state.as_str()
            );
            return;
        }

        let path = self.artifacts.path(&release.id, &sample.file_name);
        let mut added = Vec::new();

        match self.processor.process(&release, &sample, &path).await {
            Ok(outcome) => {
                sample.info.extend(outcome.info);
                sample.state = MetaFileState::Processed;

                for (i, shot) in outcome.screenshots.into_iter().enumerate() {
                    let file_name = format!("screen{}_{}{}", i, release.id, shot.extension);
                    if let Err(e) = self.artifacts.write(&release.id, &file_name, &shot.bytes).await {
                        error!("Failed to write screenshot for release {}: {}", release.id, e);
                        continue;
                    }
                    added.push(
                        MetaFile::new(
                            &release.id,
                            NO_INDEX,
                            MetaFileKind::ScreenImageFromSample,
                            MetaFileState::Processed,
                            file_name,
                        )
                        .with_info("sample", sample.id.clone()),
                    );
                }
                info!("Processed sample of release {}", release.name);
            }
            Err(e) => {
                error!("Sample processing failed for release {}: {}", release.name, e);
                sample.state = MetaFileState::Error;
                sample.info.insert("error".to_string(), e.to_string());
            }
        }

        for meta_file in added.iter().chain(std::iter::once(&sample)) {
            match self.store.save_meta_file(meta_file) {
                Ok(()) => {}
                Err(StoreError::NotFound(_)) => {
                    warn!("Release {} was deleted during sample processing", release.id);
                    if let Err(e) = self.artifacts.remove_release(&release.id).await {
                        warn!("Failed to remove artifacts of {}: {}", release.id, e);
                    }
                    return;
                }
                Err(e) => {
                    error!("Failed to persist meta file {}: {}", meta_file.id, e);
                    return;
                }
            }
        }

        self.working_set.update_meta_file(&release.hash, &sample).await;
        for meta_file in added {
            self.working_set.add_meta_file(&release.hash, meta_file).await;
        }

        let meta_files = match self.working_set.get(&release.hash).await {
            Some(tracked) => tracked.lock().await.meta_files.clone(),
            None => match self.store.get_release(&release.id) {
                Ok(Some(stored)) => stored.meta_files,
                _ => Vec::new(),
            },
        };
        self.events.publish(LifecycleEvent::MetaFilesUpdated {
            release_id: release.id.clone(),
            meta_files,
        });
    }
}

/// Create the sample queue and its worker.
///
/// Returns:
/// - `SampleQueue` - for offering jobs (clone this to share across tasks)
/// - `SampleWorker` - spawn this as a background task with `tokio::spawn(worker.run(shutdown))`
pub fn create_sample_system(
    capacity: usize,
    store: Arc<dyn Store>,
    artifacts: ArtifactStore,
    working_set: Arc<WorkingSet>,
    events: EventBus,
    processor: Arc<dyn SampleProcessor>,
) -> (SampleQueue, SampleWorker) {
    let capacity = capacity.max(1);
    let (tx, rx) = mpsc::channel(capacity);
    let queue = SampleQueue {
        tx,
        pending: Arc::new(Mutex::new(HashSet::new())),
        capacity,
    };
    let worker = SampleWorker {
        rx,
        queue: queue.clone(),
        store,
        artifacts,
        working_set,
        events,
        processor,
    };
    (queue, worker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::{SampleOutcome, Screenshot};
    use crate::store::SqliteStore;
    use crate::testing::{fixtures, MockSampleProcessor, RecordingSubscriber};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        store: Arc<dyn Store>,
        artifacts: ArtifactStore,
        working_set: Arc<WorkingSet>,
        events: EventBus,
        processor: Arc<MockSampleProcessor>,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        Fixture {
            artifacts: ArtifactStore::new(dir.path()),
            _dir: dir,
            store: Arc::new(SqliteStore::in_memory().unwrap()),
            working_set: Arc::new(WorkingSet::new()),
            events: EventBus::new(),
            processor: Arc::new(MockSampleProcessor::new()),
        }
    }

    fn system(f: &Fixture, capacity: usize) -> (SampleQueue, SampleWorker) {
        create_sample_system(
            capacity,
            f.store.clone(),
            f.artifacts.clone(),
            f.working_set.clone(),
            f.events.clone(),
            f.processor.clone(),
        )
    }

    fn job(release_id: &str) -> SampleJob {
        SampleJob {
            release_id: release_id.to_string(),
            hash: "h".to_string(),
            meta_file_id: "m".to_string(),
        }
    }

    #[tokio::test]
    async fn test_full_queue_rejects_without_blocking() {
        let f = fixture();
        let (queue, _worker) = system(&f, 1);

        assert_eq!(queue.offer(job("r1")), Offer::Queued);
        assert_eq!(queue.offer(job("r2")), Offer::Full);
        assert_eq!(queue.depth(), 1);
        assert!(!queue.is_pending("r2"));
    }

    #[tokio::test]
    async fn test_release_is_never_queued_twice() {
        let f = fixture();
        let (queue, _worker) = system(&f, 10);

        assert_eq!(queue.offer(job("r1")), Offer::Queued);
        assert_eq!(queue.offer(job("r1")), Offer::AlreadyPending);
        queue.complete("r1");
        assert_eq!(queue.offer(job("r1")), Offer::Queued);
    }

    #[tokio::test]
    async fn test_closed_queue() {
        let f = fixture();
        let (queue, worker) = system(&f, 10);
        drop(worker);
        assert_eq!(queue.offer(job("r1")), Offer::Closed);
    }

    async fn downloaded_sample(f: &Fixture) -> (crate::release::Release, MetaFile) {
        let mut release = fixtures::release("Sample.Release", "abcd");
        let sample = MetaFile::new(
            &release.id,
            2,
            MetaFileKind::SampleVideo,
            MetaFileState::Downloaded,
            format!("2_{}.mkv", release.id),
        );
        release.meta_files.push(sample.clone());
        f.store.insert_release(&release).unwrap();
        f.artifacts
            .write(&release.id, &sample.file_name, b"video")
            .await
            .unwrap();
        f.working_set.insert(release.clone()).await;
        (release, sample)
    }

    #[tokio::test]
    async fn test_worker_marks_sample_processed_and_adds_screenshots() {
        let f = fixture();
        let recorder = Arc::new(RecordingSubscriber::new());
        f.events.subscribe(recorder.clone());
        let (release, sample) = downloaded_sample(&f).await;

        let mut outcome = SampleOutcome::default();
        outcome.info.insert("duration".to_string(), "30".to_string());
        outcome.screenshots.push(Screenshot {
            extension: ".jpg".to_string(),
            bytes: b"jpeg".to_vec(),
        });
        f.processor.set_outcome(outcome);

        let (queue, worker) = system(&f, 10);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(worker.run(shutdown_rx));

        assert_eq!(
            queue.offer(SampleJob {
                release_id: release.id.clone(),
                hash: release.hash.clone(),
                meta_file_id: sample.id.clone(),
            }),
            Offer::Queued
        );

        let mut processed = false;
        for _ in 0..100 {
            let stored = f.store.get_release(&release.id).unwrap().unwrap();
            if stored
                .meta_files
                .iter()
                .any(|m| m.id == sample.id && m.state == MetaFileState::Processed)
            {
                processed = true;
                assert!(stored
                    .meta_files
                    .iter()
                    .any(|m| m.kind == MetaFileKind::ScreenImageFromSample));
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(processed);

        // Give the worker a moment to release the pending guard.
        for _ in 0..100 {
            if !queue.is_pending(&release.id) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(!queue.is_pending(&release.id));

        let tracked = f.working_set.get(&release.hash).await.unwrap();
        let in_memory = tracked.lock().await.clone();
        let in_memory_sample = in_memory.meta_files.iter().find(|m| m.id == sample.id).unwrap();
        assert_eq!(in_memory_sample.info.get("duration").map(String::as_str), Some("30"));
        assert!(recorder
            .events()
            .iter()
            .any(|e| e.event_type() == "meta_files_updated"));

        let _ = shutdown_tx.send(());
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_marks_failed_sample_as_error() {
        let f = fixture();
        let (release, sample) = downloaded_sample(&f).await;
        f.processor.set_error("corrupt stream");

        let (queue, worker) = system(&f, 10);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(worker.run(shutdown_rx));

        queue.offer(SampleJob {
            release_id: release.id.clone(),
            hash: release.hash.clone(),
            meta_file_id: sample.id.clone(),
        });

        let mut failed = false;
        for _ in 0..100 {
            let stored = f.store.get_release(&release.id).unwrap().unwrap();
            let stored_sample = stored.meta_files.iter().find(|m| m.id == sample.id).unwrap();
            if stored_sample.state == MetaFileState::Error {
                assert!(stored_sample.info.contains_key("error"));
                failed = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(failed);

        let _ = shutdown_tx.send(());
        handle.await.unwrap();
    }
}

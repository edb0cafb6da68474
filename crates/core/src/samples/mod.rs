//! Sample videos: selection limits, the bounded processing queue, and the
//! processing collaborator.

mod config;
mod processor;
mod queue;

pub use config::SamplesConfig;
pub use processor::{
    PassthroughSampleProcessor, SampleError, SampleOutcome, SampleProcessor, Screenshot,
};
pub use queue::{create_sample_system, Offer, SampleJob, SampleQueue, SampleWorker};

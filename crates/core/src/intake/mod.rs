//! Discovery and intake of new releases.
//!
//! Sources are polled on their own schedulers. Candidates are fetched and
//! classified there, then handed over a bounded channel to a single intake
//! consumer that deduplicates, looks up, filters, and persists them.

mod config;
mod discovery;
mod lookup;
mod policy;
mod source;
mod types;
mod worker;

pub use config::{CategoryFilterConfig, FiltersConfig, SourceSeed};
pub use discovery::{SourcePoller, SEEN_TTL};
pub use lookup::{normalize_category, HttpLookup, NoLookup, ReleaseLookup};
pub use policy::{AcceptAll, AcceptPolicy, CategoryFilter};
pub use source::{HttpSource, HttpSourceConnector, Source, SourceConnector};
pub use types::{Candidate, Decision, IntakeError, LookupResult, SourceRecord};
pub use worker::{create_intake_system, IntakeHandle, IntakeOutcome, IntakeSettings, IntakeWorker};

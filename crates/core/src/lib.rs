pub mod agent;
pub mod codec;
pub mod config;
pub mod events;
pub mod intake;
pub mod metrics;
pub mod orchestrator;
pub mod release;
pub mod samples;
pub mod scheduler;
pub mod store;
pub mod testing;
pub mod upload;

pub use agent::{
    AgentClient, AgentConnector, AgentError, AgentSeed, AllocationPolicy, HttpAgentConnector,
};
pub use codec::{CodecError, Structure};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DatabaseConfig,
    LoggingConfig, SanitizedConfig, ServerConfig, StorageConfig, CONFIG_PATH_ENV,
};
pub use events::{EventBus, EventSubscriber, LifecycleEvent, LogSubscriber};
pub use orchestrator::{
    Orchestrator, OrchestratorError, OrchestratorParts, OrchestratorSettings, OrchestratorStatus,
};
pub use release::{MetaFile, MetaFileKind, MetaFileState, Release, ReleaseState};
pub use store::{ArtifactStore, SqliteStore, Store, StoreError};

//! # ticksheet-runtime
//!
//! Oracle-facing runtime for the ticksheet matching engine.
//!
//! This crate owns everything with side effects: oracle providers, prompt
//! construction, concurrent consensus rounds, the persistent learning store,
//! and the audit trail. The deterministic engine lives in `ticksheet-core`;
//! nothing there ever sees a prompt or a connection.
//!
//! ## Layering
//!
//! ```text
//! pipeline  - sequences a run end to end
//!   normalizer  - deterministic cleanup + guarded generative pass
//!   consensus   - N concurrent attempts, tallied in core
//!   hints       - cached learning-store lookups, injected into prompts
//!   audit       - raw responses and warnings, persisted verbatim
//! providers - the only module that talks to the oracle
//! store     - SQLite learning store (features, patterns, negatives, dictionary)
//! ```

pub mod audit;
pub mod config;
pub mod consensus;
pub mod hints;
pub mod normalizer;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod store;

pub use audit::AuditTrail;
pub use config::{ConfigError, RunConfig};
pub use consensus::{run_consensus, AttemptRecord, ConsensusRun};
pub use hints::HintCache;
pub use pipeline::{ConsensusRunResult, Pipeline, PipelineError, SingleRunResult};
pub use providers::{Oracle, OracleConfig, OracleError};
pub use store::{LearnSummary, LearningStore, StoreError, StoreStats};

#[cfg(feature = "openai")]
pub use providers::OpenAiOracle;

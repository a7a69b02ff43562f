//! Batch thermal/visible overlay: pair discovery by file name, sequential
//! registration with per-pair skips, progress events and cancellation.

pub mod args;
pub mod batch;
pub mod config;
pub mod debug;
pub mod error;
pub mod logging;
pub mod pairs;

pub use args::{CliOptions, USAGE};
pub use batch::{
    BatchEvent, BatchJob, BatchOrchestrator, BatchProgress, BatchReport, BatchState, CancellationToken, PairOutcome,
    SkipReason, channel_observer,
};
pub use config::AppConfig;
pub use error::{ArgsError, BatchError, ConfigError};
pub use logging::init_logging;
pub use pairs::{ImagePair, PairResolver, PairSet, aligned_file_name};
pub use thermalign_core::{self, FeatureConfig, RegistrationConfig};
pub use thermalign_register::{self, Registrar, Registration};

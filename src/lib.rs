// arcpack - Convert loose chart packages into normalized .arcpkg archives
//
// This is the library crate containing the conversion pipeline and its data
// structures. The binary crate (main.rs) provides the command line entry point.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use metrics::Metrics;
pub use models::{ConverterConfig, Overrides, PackageDescriptor, SongMetadata};
pub use pipeline::{
    BackgroundResponse, BatchProgress, BatchQueue, ConversionArtifact, ConversionJob,
    ConversionOutcome, ConversionStage, Converter, InputProvider, InputRequest, ItemReport,
    ResumeError,
};
pub use services::ConversionError;
pub use state::{StateChange, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

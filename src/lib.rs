// src/lib.rs
pub mod cli;
pub mod config;
pub mod ctlog;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod output;
pub mod resolver;
pub mod session;
pub mod sources;
pub mod store;
pub mod types;
pub mod updater;
pub mod utils;

pub use cli::Args;
pub use engine::{CertFinderEngine, PipelineState};
pub use store::NameStore;
pub use types::{CertFinderError, CertificateRecord, Config, ResolutionResult, RunStats};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

// Certificate Transparency log ingestion
//
// Lists the known CT logs, lets the operator pick some and streams their
// entries into the local name store.

pub mod catalog;
pub mod client;
pub mod decoder;
pub mod ingestor;
pub mod progress;

pub use catalog::{LogCatalog, Selection};
pub use client::{CtClient, RawLogEntry};
pub use decoder::{DecodedEntry, EntryDecoder, EntryKind, X509EntryDecoder};
pub use ingestor::{IngestSummary, Ingestor};
pub use progress::{BarReporter, LogReporter, ProgressReporter};

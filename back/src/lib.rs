//! Listing stock monitor: periodically snapshots a product listing, detects
//! new and restocked items, and keeps a bounded, deduplicated alert feed.

pub mod alert;
pub mod config;
pub mod coordinator;
pub mod detector;
pub mod error;
mod feed;
pub mod parser;
pub mod product;
pub mod server;
pub mod source;
pub mod state;

pub use alert::{Alert, AlertBook, AlertIntent, AlertKind, MonitoredEntry};
pub use config::{Cli, MonitorConfig, SourceKind};
pub use coordinator::{Coordinator, CycleOutcome, MonitorContext, run_schedule};
pub use detector::SeenProducts;
pub use error::{MonitorError, Result};
pub use feed::BoundedFeed;
pub use product::{Product, Snapshot};
pub use source::{BrowserSource, HttpSource, SnapshotSource};
pub use state::{ProcessState, RunStatus, StatePatch, StateView};

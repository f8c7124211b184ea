//! Metrics exposed by the exporter.
//!
//! This module holds the registry shared between the collector, which writes
//! to it, and the scrape server, which reads snapshots from it.
//!
//! # Submodules
//!
//! - `registry` - Bucket metric families and their Prometheus export

pub mod registry;

pub use registry::{FileMetrics, MetricSample, FILE_LAST_MODIFIED, FILE_LIST, FILENAME_LABEL};

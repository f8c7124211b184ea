//! Prometheus exporter for object storage buckets.
//!
//! A [`Collector`] periodically runs `rclone lsl <remote>:<bucket>`, parses
//! every output line into a [`FileRecord`] and records two gauges per object
//! in a shared [`FileMetrics`] registry:
//!
//! - `s3_file_list{filename}` - always 1 for objects seen in a listing
//! - `s3_file_last_modified{filename}` - modification time in Unix seconds
//!
//! A [`ScrapeServer`] exposes that registry over HTTPS behind Basic
//! authentication. The two only share the registry; a scrape never waits for
//! a listing to finish.
//!
//! # Example
//!
//! ```no_run
//! use s3exporter::{Collector, FileMetrics, RcloneLister};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), s3exporter::ExporterError> {
//! let metrics = FileMetrics::new()?;
//! let lister = RcloneLister::new("rclone", "selectel", "backups");
//! let collector = Collector::new(lister, metrics.clone(), Duration::from_secs(60));
//!
//! let report = collector.run_cycle().await;
//! println!("{} objects exported", report.applied);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod collector;
pub mod config;
pub mod error;
pub mod listing;
pub mod metrics;
pub mod parser;
pub mod server;

pub use auth::BasicAuth;
pub use collector::{Collector, CycleReport};
pub use config::{Config, ConfigError, Settings};
pub use error::ExporterError;
pub use listing::{FailureReason, ListingFailure, ListingResult, Lister, RcloneLister};
pub use metrics::{FileMetrics, MetricSample};
pub use parser::{parse_line, FileRecord, MalformedLine};
pub use server::{load_tls, ScrapeServer};

//! Periodic collection of bucket listings into the metric registry.

use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::listing::{FailureReason, ListingFailure, Lister, ListingResult};
use crate::metrics::FileMetrics;
use crate::parser::parse_line;

/// What a single cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// `None` when the listing succeeded
    pub failure: Option<ListingFailure>,
    /// Records written to the registry
    pub applied: usize,
    /// Lines skipped because they could not be parsed
    pub malformed: usize,
}

impl CycleReport {
    fn failed(failure: ListingFailure) -> Self {
        CycleReport {
            failure: Some(failure),
            applied: 0,
            malformed: 0,
        }
    }
}

/// Runs the lister on a fixed interval and applies the results.
pub struct Collector<L> {
    lister: L,
    metrics: FileMetrics,
    interval: Duration,
}

impl<L: Lister> Collector<L> {
    pub fn new(lister: L, metrics: FileMetrics, interval: Duration) -> Self {
        Collector {
            lister,
            metrics,
            interval,
        }
    }

    /// Lists the bucket once and writes every parsed record.
    ///
    /// A failed listing leaves the registry untouched. Malformed lines are
    /// skipped one by one; the rest of the listing is still applied in order.
    pub async fn run_cycle(&self) -> CycleReport {
        let stdout = match self.lister.list().await {
            ListingResult::Success(stdout) => stdout,
            ListingResult::Failure(failure) => {
                match failure.reason {
                    FailureReason::EmptyOutput => {
                        warn!(reason = %failure.reason, "Listing command returned no output")
                    }
                    _ => error!(
                        reason = %failure.reason,
                        detail = %failure.detail,
                        "Listing command failed"
                    ),
                }
                return CycleReport::failed(failure);
            }
        };

        let mut applied = 0;
        let mut malformed = 0;
        for line in stdout.trim().lines() {
            match parse_line(line) {
                Ok(record) => {
                    debug!(
                        filename = %record.name,
                        size_bytes = record.size_bytes,
                        modified_at = %record.modified_at,
                        "Matched file"
                    );
                    self.metrics.set_file_seen(&record.name);
                    self.metrics
                        .set_last_modified(&record.name, record.modified_unix());
                    applied += 1;
                }
                Err(e) => {
                    warn!(line = %e.line, "Skipping malformed line");
                    malformed += 1;
                }
            }
        }

        CycleReport {
            failure: None,
            applied,
            malformed,
        }
    }

    /// Runs cycles forever, sleeping the full interval after each one.
    pub async fn run(self) {
        loop {
            info!("Updating metrics...");
            let report = self.run_cycle().await;
            if report.failure.is_none() {
                info!(
                    applied = report.applied,
                    malformed = report.malformed,
                    "Metrics updated"
                );
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

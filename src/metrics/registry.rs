use prometheus::proto::MetricFamily;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ExporterError;

/// Presence indicator, 1 for every object seen in a listing.
pub const FILE_LIST: &str = "s3_file_list";
/// Last modification time of an object, in Unix seconds.
pub const FILE_LAST_MODIFIED: &str = "s3_file_last_modified";
/// Label carrying the object name on both families.
pub const FILENAME_LABEL: &str = "filename";

/// One exported value.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub metric_name: String,
    pub labels: BTreeMap<String, String>,
    pub value: f64,
}

/// Registry of the bucket metric families.
///
/// Cloning is cheap and every clone writes to and reads from the same
/// families. Each sample is updated atomically; a snapshot taken while a
/// cycle is being applied may mix old and new values of different files.
///
/// Series are never removed, so objects deleted from the bucket keep
/// their last reported values until the process restarts.
#[derive(Clone)]
pub struct FileMetrics {
    inner: Arc<FileMetricsInner>,
}

struct FileMetricsInner {
    registry: Registry,
    file_list: GaugeVec,
    file_last_modified: GaugeVec,
}

impl FileMetrics {
    /// Creates a registry holding only the bucket families.
    pub fn new() -> Result<Self, ExporterError> {
        let registry = Registry::new();

        let file_list = GaugeVec::new(
            Opts::new(FILE_LIST, "List of files in S3 bucket"),
            &[FILENAME_LABEL],
        )?;
        registry.register(Box::new(file_list.clone()))?;

        let file_last_modified = GaugeVec::new(
            Opts::new(
                FILE_LAST_MODIFIED,
                "Last modified timestamp of files in S3 bucket",
            ),
            &[FILENAME_LABEL],
        )?;
        registry.register(Box::new(file_last_modified.clone()))?;

        Ok(FileMetrics {
            inner: Arc::new(FileMetricsInner {
                registry,
                file_list,
                file_last_modified,
            }),
        })
    }

    /// Adds the `process_*` families describing the exporter itself.
    #[cfg(target_os = "linux")]
    pub fn register_process_metrics(&self) -> Result<(), ExporterError> {
        let collector = prometheus::process_collector::ProcessCollector::for_self();
        self.inner.registry.register(Box::new(collector))?;
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    pub fn register_process_metrics(&self) -> Result<(), ExporterError> {
        tracing::warn!("Process metrics are only available on Linux");
        Ok(())
    }

    /// Marks `name` as present in the bucket.
    pub fn set_file_seen(&self, name: &str) {
        self.inner.file_list.with_label_values(&[name]).set(1.0);
    }

    /// Records the modification time of `name` in Unix seconds.
    pub fn set_last_modified(&self, name: &str, timestamp: i64) {
        self.inner
            .file_last_modified
            .with_label_values(&[name])
            .set(timestamp as f64);
    }

    /// Current state of every registered family.
    pub fn snapshot(&self) -> Vec<MetricFamily> {
        self.inner.registry.gather()
    }

    /// Current bucket series, one entry per (family, filename).
    ///
    /// Families registered next to the bucket ones, such as process
    /// metrics, are left out.
    pub fn samples(&self) -> Vec<MetricSample> {
        let mut samples = Vec::new();
        for family in self.snapshot() {
            if family.name() != FILE_LIST && family.name() != FILE_LAST_MODIFIED {
                continue;
            }
            for metric in family.get_metric() {
                let labels = metric
                    .get_label()
                    .iter()
                    .map(|pair| (pair.name().to_string(), pair.value().to_string()))
                    .collect();
                samples.push(MetricSample {
                    metric_name: family.name().to_string(),
                    labels,
                    value: metric.get_gauge().value(),
                });
            }
        }
        samples
    }

    /// Value of `metric_name{filename=name}`, if that series exists.
    pub fn value(&self, metric_name: &str, name: &str) -> Option<f64> {
        self.samples().into_iter().find_map(|sample| {
            let matches = sample.metric_name == metric_name
                && sample.labels.get(FILENAME_LABEL).map(String::as_str) == Some(name);
            if matches {
                Some(sample.value)
            } else {
                None
            }
        })
    }

    /// Renders the current snapshot in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<Vec<u8>, ExporterError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.snapshot(), &mut buffer)?;
        Ok(buffer)
    }
}

//! Invocation of the external bucket listing tool.
//!
//! The collector only depends on the [`Lister`] trait so tests can feed it
//! canned output. [`RcloneLister`] runs `rclone lsl <remote>:<bucket>`
//! directly (no shell) and classifies the outcome.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use strum_macros::{AsRefStr, Display, EnumIter};
use tokio::process::Command;
use tracing::{debug, trace};

/// Why a listing produced no usable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum FailureReason {
    /// The tool ran but exited with a non-zero status
    NonZeroExit,
    /// The tool succeeded but printed nothing but whitespace
    EmptyOutput,
    /// The tool could not be started or waited on
    ExecError,
    /// The tool ran longer than the configured timeout and was killed
    TimedOut,
}

/// A failed listing together with what the tool (or the OS) reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingFailure {
    pub reason: FailureReason,
    pub detail: String,
}

/// Outcome of one listing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingResult {
    /// Raw stdout of a successful run
    Success(String),
    Failure(ListingFailure),
}

impl ListingResult {
    pub fn failure(reason: FailureReason, detail: impl Into<String>) -> Self {
        ListingResult::Failure(ListingFailure {
            reason,
            detail: detail.into(),
        })
    }
}

/// Source of bucket listings.
#[async_trait]
pub trait Lister: Send + Sync {
    /// Runs the listing once. Never retries.
    async fn list(&self) -> ListingResult;
}

/// Lists a bucket through `rclone lsl`.
#[derive(Debug, Clone)]
pub struct RcloneLister {
    binary: String,
    remote: String,
    bucket: String,
    timeout: Option<Duration>,
}

impl RcloneLister {
    pub fn new(binary: impl Into<String>, remote: impl Into<String>, bucket: impl Into<String>) -> Self {
        RcloneLister {
            binary: binary.into(),
            remote: remote.into(),
            bucket: bucket.into(),
            timeout: None,
        }
    }

    /// Kills the tool when a run takes longer than `timeout`.
    ///
    /// Without a timeout a hanging tool stalls collection indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The `<remote>:<bucket>` path handed to the tool.
    pub fn target(&self) -> String {
        format!("{}:{}", self.remote, self.bucket)
    }

    /// Arguments passed to the binary, in order.
    pub fn args(&self) -> Vec<String> {
        vec!["lsl".to_string(), self.target()]
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Lister for RcloneLister {
    async fn list(&self) -> ListingResult {
        debug!(binary = %self.binary, path = %self.target(), "Executing listing command");

        let child = match self.command().spawn() {
            Ok(child) => child,
            Err(e) => return ListingResult::failure(FailureReason::ExecError, e.to_string()),
        };

        // Dropping the pending future drops the child, which kills it.
        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(output) => output,
                Err(_) => {
                    return ListingResult::failure(
                        FailureReason::TimedOut,
                        format!("listing did not finish within {:?}", limit),
                    )
                }
            },
            None => child.wait_with_output().await,
        };

        let output = match output {
            Ok(output) => output,
            Err(e) => return ListingResult::failure(FailureReason::ExecError, e.to_string()),
        };

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        trace!(stdout_bytes = output.stdout.len(), "Listing stdout");
        debug!(%stderr, "Listing stderr");

        classify(output.status.success(), output.stdout, stderr)
    }
}

/// Object names are reported verbatim, so stdout that is not UTF-8 fails
/// the run instead of being decoded lossily.
fn classify(succeeded: bool, stdout: Vec<u8>, stderr: String) -> ListingResult {
    if !succeeded {
        return ListingResult::failure(FailureReason::NonZeroExit, stderr.trim_end());
    }
    let stdout = match String::from_utf8(stdout) {
        Ok(text) => text,
        Err(e) => {
            return ListingResult::failure(
                FailureReason::ExecError,
                format!("listing output is not valid UTF-8: {}", e),
            )
        }
    };
    if stdout.trim().is_empty() {
        return ListingResult::failure(FailureReason::EmptyOutput, stderr.trim_end());
    }
    ListingResult::Success(stdout)
}

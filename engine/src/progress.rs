//! Progress reporting and cooperative cancellation.
//!
//! The engine is decoupled from any UI: a run reports through a
//! `ProgressSink` and polls a shared `CancellationToken` at defined safe
//! points (after scanning, between per-file hash computations and imports),
//! never while a hash or write is in flight.
//!
//! Emission is throttled to at most once per second, except the
//! scan-complete and final complete events, which are always delivered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Minimum interval between throttled progress emissions.
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Phase of a detection, import, or maintenance run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStage {
    /// Walking the source tree
    Scanning,
    /// Source scan finished; total candidate count is known
    ScanComplete,
    /// Comparing candidates against library state
    Comparing,
    /// Computing content hashes
    Hashing,
    /// Copying files into the library
    Importing,
    /// Run finished
    Complete,
}

impl std::fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgressStage::Scanning => write!(f, "scanning"),
            ProgressStage::ScanComplete => write!(f, "scan_complete"),
            ProgressStage::Comparing => write!(f, "comparing"),
            ProgressStage::Hashing => write!(f, "hashing"),
            ProgressStage::Importing => write!(f, "importing"),
            ProgressStage::Complete => write!(f, "complete"),
        }
    }
}

/// One progress emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub stage: ProgressStage,
    pub current: Option<u64>,
    pub total: Option<u64>,
    pub message: Option<String>,
}

/// Receiver for progress updates. Implementations are invoked synchronously
/// from the worker running the operation.
pub trait ProgressSink: Send {
    fn report(&self, update: &ProgressUpdate);
}

/// Shared cancellation flag.
///
/// Once canceled, a run aborts at its next safe point with a distinct
/// cancellation error; effects of already-completed items are not rolled
/// back.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Wall-clock-throttled wrapper over an optional sink.
pub struct ThrottledProgress<'a> {
    sink: Option<&'a dyn ProgressSink>,
    last_emit: Option<Instant>,
    min_interval: Duration,
}

impl<'a> ThrottledProgress<'a> {
    pub fn new(sink: Option<&'a dyn ProgressSink>) -> Self {
        ThrottledProgress {
            sink,
            last_emit: None,
            min_interval: PROGRESS_INTERVAL,
        }
    }

    #[cfg(test)]
    fn with_interval(sink: Option<&'a dyn ProgressSink>, min_interval: Duration) -> Self {
        ThrottledProgress {
            sink,
            last_emit: None,
            min_interval,
        }
    }

    /// Emit if at least the minimum interval has passed since the last
    /// emission.
    pub fn report(
        &mut self,
        stage: ProgressStage,
        current: Option<u64>,
        total: Option<u64>,
        message: Option<String>,
    ) {
        if self.sink.is_none() {
            return;
        }
        if let Some(last) = self.last_emit {
            if last.elapsed() < self.min_interval {
                return;
            }
        }
        self.emit(stage, current, total, message);
    }

    /// Emit unconditionally; used for scan-complete and final complete
    /// events.
    pub fn report_now(
        &mut self,
        stage: ProgressStage,
        current: Option<u64>,
        total: Option<u64>,
        message: Option<String>,
    ) {
        if self.sink.is_none() {
            return;
        }
        self.emit(stage, current, total, message);
    }

    fn emit(
        &mut self,
        stage: ProgressStage,
        current: Option<u64>,
        total: Option<u64>,
        message: Option<String>,
    ) {
        if let Some(sink) = self.sink {
            sink.report(&ProgressUpdate {
                stage,
                current,
                total,
                message,
            });
            self.last_emit = Some(Instant::now());
        }
    }
}

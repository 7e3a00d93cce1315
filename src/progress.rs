//! Progress event types and callback interface.
//!
//! The test engine reports what it is doing through [`ProgressCallback`]
//! so that presentation (dots, JSON silence) stays out of the measurement
//! code.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Test phases of a single endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestPhase {
    Latency,
    Download,
    Upload,
}

/// Direction of bandwidth measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Download,
    Upload,
}

impl Direction {
    pub fn phase(&self) -> TestPhase {
        match self {
            Direction::Download => TestPhase::Download,
            Direction::Upload => TestPhase::Upload,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Download => f.write_str("download"),
            Direction::Upload => f.write_str("upload"),
        }
    }
}

/// Progress events emitted during test execution.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A phase is starting.
    PhaseChange(TestPhase),
    /// Latency probing finished; `None` when every probe failed.
    LatencyMeasured {
        latency: Option<Duration>,
        jitter: Option<Duration>,
    },
    /// Periodic throughput snapshot, emitted at a fixed cadence while
    /// transfer workers are running.
    Throughput {
        direction: Direction,
        /// Bytes moved by all workers so far.
        bytes: u64,
        elapsed: Duration,
        /// Whole-interval speed so far, in bits per second.
        speed_bps: f64,
    },
    /// A phase finished, successfully or not.
    PhaseComplete(TestPhase),
}

/// Callback interface for progress updates.
///
/// Implementations must be non-blocking to avoid affecting
/// measurement accuracy.
pub trait ProgressCallback: Send + Sync {
    /// Called when a progress event occurs.
    fn on_progress(&self, event: ProgressEvent);
}

/// Discards every event. Used for JSON output.
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_progress(&self, _event: ProgressEvent) {}
}

//! Result data structures for JSON output.
//!
//! Everything here borrows from the finished sessions; the output layer
//! owns only the formatting (timestamps, milliseconds, Mbit/s).

use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};
use std::time::Duration;

use crate::errors::exit_codes;
use crate::location::ClientLocation;
use crate::measurements::{average, Averages};
use crate::speedtest::directory::Endpoint;
use crate::speedtest::session::MeasurementSession;
use crate::speedtest::tests::cancel::RunState;
use crate::speedtest::tests::latency::LatencyResult;
use crate::speedtest::tests::throughput::{StopReason, Strategy, ThroughputResult};

/// `2024-05-01 12:30:45.123`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Local wall-clock time, serialized with [`TIMESTAMP_FORMAT`].
#[derive(Debug, Clone, Copy)]
pub struct OutputTime(DateTime<Local>);

impl OutputTime {
    pub fn now() -> Self {
        Self(Local::now())
    }
}

impl From<DateTime<Local>> for OutputTime {
    fn from(time: DateTime<Local>) -> Self {
        Self(time)
    }
}

impl Serialize for OutputTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0.format(TIMESTAMP_FORMAT))
    }
}

/// The complete JSON document of a run.
#[derive(Debug, Serialize)]
pub struct FullOutput<'a> {
    pub timestamp: OutputTime,
    pub user_info: &'a ClientLocation,
    pub servers: Vec<ServerOutput<'a>>,
    /// Present when more than one server was tested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average: Option<AverageOutput>,
}

impl<'a> FullOutput<'a> {
    pub fn new(user_info: &'a ClientLocation, sessions: &'a [MeasurementSession]) -> Self {
        Self {
            timestamp: OutputTime::now(),
            user_info,
            servers: sessions.iter().map(ServerOutput::from_session).collect(),
            average: (sessions.len() > 1).then(|| average(sessions).into()),
        }
    }
}

/// One tested server: the endpoint fields plus what was measured.
#[derive(Debug, Serialize)]
pub struct ServerOutput<'a> {
    #[serde(flatten)]
    pub endpoint: &'a Endpoint,
    pub state: RunState,
    pub latency_ms: Option<f64>,
    pub jitter_ms: Option<f64>,
    /// Mbit/s
    pub dl_speed: Option<f64>,
    /// Mbit/s
    pub ul_speed: Option<f64>,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probes: Option<ProbeOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download: Option<TransferOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<TransferOutput>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

impl<'a> ServerOutput<'a> {
    pub fn from_session(session: &'a MeasurementSession) -> Self {
        Self {
            endpoint: &session.endpoint,
            state: session.state,
            latency_ms: session.latency().map(millis),
            jitter_ms: session.jitter().map(millis),
            dl_speed: session.download_mbps(),
            ul_speed: session.upload_mbps(),
            valid: session.is_valid(),
            probes: session.latency.as_ref().map(ProbeOutput::from),
            download: session.download.as_ref().map(TransferOutput::from),
            upload: session.upload.as_ref().map(TransferOutput::from),
            warnings: session.warnings.iter().map(|w| w.message.clone()).collect(),
            error: session.error.as_ref().map(|e| e.message.clone()),
        }
    }
}

/// Probe counts behind `latency_ms`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProbeOutput {
    pub sent: usize,
    pub received: usize,
}

impl From<&LatencyResult> for ProbeOutput {
    fn from(result: &LatencyResult) -> Self {
        Self { sent: result.attempted, received: result.samples.len() }
    }
}

/// How one direction went, next to its headline speed.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TransferOutput {
    pub bytes: u64,
    pub elapsed_ms: f64,
    /// Counter snapshots the speed was computed from.
    pub samples: usize,
    pub workers: usize,
    pub failed_workers: usize,
    pub stop: StopReason,
    pub saving_mode: bool,
}

impl From<&ThroughputResult> for TransferOutput {
    fn from(result: &ThroughputResult) -> Self {
        Self {
            bytes: result.bytes,
            elapsed_ms: millis(result.elapsed),
            samples: result.samples.len(),
            workers: result.workers.len(),
            failed_workers: result.worker_errors().count(),
            stop: result.stop,
            saving_mode: result.strategy == Strategy::Streaming,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AverageOutput {
    pub dl_speed: Option<f64>,
    pub ul_speed: Option<f64>,
    pub servers: usize,
}

impl From<Averages> for AverageOutput {
    fn from(averages: Averages) -> Self {
        Self {
            dl_speed: averages.download_mbps,
            ul_speed: averages.upload_mbps,
            servers: averages.sessions,
        }
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Process exit code for a finished run.
///
/// Cancellation wins over endpoint failures; a run where some endpoint
/// produced nothing is a partial failure.
pub fn exit_code(sessions: &[MeasurementSession]) -> i32 {
    if sessions.iter().any(|s| s.state == RunState::Cancelled) {
        return exit_codes::CANCELLED;
    }

    let failed = sessions.iter().any(|s| {
        s.error.as_ref().is_some_and(|e| e.kind.is_endpoint_local())
            || !s.has_valid_sample()
    });

    if failed {
        exit_codes::PARTIAL_FAILURE
    } else {
        exit_codes::SUCCESS
    }
}

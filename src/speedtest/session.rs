//! Per-endpoint measurement record.

use crate::errors::SpeedTestError;
use crate::measurements::{bps_to_mbps, check_result_valid, ResultSummary, Validity};
use crate::speedtest::directory::Endpoint;
use crate::speedtest::tests::cancel::RunState;
use crate::speedtest::tests::latency::LatencyResult;
use crate::speedtest::tests::throughput::ThroughputResult;
use std::time::Duration;

/// Everything measured against one endpoint during one run.
///
/// Written only by the test engine for its endpoint, and read-only once
/// [`MeasurementSession::finalize`] ran.
#[derive(Debug)]
pub struct MeasurementSession {
    pub endpoint: Endpoint,
    pub state: RunState,
    pub latency: Option<LatencyResult>,
    pub download: Option<ThroughputResult>,
    pub upload: Option<ThroughputResult>,
    /// The failure that ended the session early.
    pub error: Option<SpeedTestError>,
    /// Failures the session carried on through: an unanswered probe, a
    /// worker that died while the others kept transferring.
    pub warnings: Vec<SpeedTestError>,
    /// `None` until finalized, and when nothing was measured.
    pub validity: Option<Validity>,
}

impl MeasurementSession {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            state: RunState::Idle,
            latency: None,
            download: None,
            upload: None,
            error: None,
            warnings: Vec::new(),
            validity: None,
        }
    }

    /// Clear all results so the endpoint can be measured again.
    pub fn reset(&mut self) {
        self.state = RunState::Idle;
        self.latency = None;
        self.download = None;
        self.upload = None;
        self.error = None;
        self.warnings.clear();
        self.validity = None;
    }

    pub fn latency(&self) -> Option<Duration> {
        self.latency.as_ref().map(|l| l.latency)
    }

    pub fn jitter(&self) -> Option<Duration> {
        self.latency.as_ref().and_then(|l| l.jitter)
    }

    pub fn download_mbps(&self) -> Option<f64> {
        self.download.as_ref().map(|r| bps_to_mbps(r.speed_bps))
    }

    pub fn upload_mbps(&self) -> Option<f64> {
        self.upload.as_ref().map(|r| bps_to_mbps(r.speed_bps))
    }

    /// Whether either direction produced a speed.
    pub fn has_valid_sample(&self) -> bool {
        self.download.is_some() || self.upload.is_some()
    }

    pub fn summary(&self) -> ResultSummary {
        let monotonic = [&self.download, &self.upload]
            .into_iter()
            .flatten()
            .all(|r| r.monotonic);

        ResultSummary {
            latency: self.latency(),
            download_bps: self.download.as_ref().map(|r| r.speed_bps),
            upload_bps: self.upload.as_ref().map(|r| r.speed_bps),
            samples_monotonic: monotonic,
        }
    }

    /// Run the plausibility check on what was measured.
    pub fn finalize(&mut self) {
        self.validity = self
            .has_valid_sample()
            .then(|| check_result_valid(&self.summary()));
    }

    pub fn is_valid(&self) -> bool {
        self.validity.as_ref().is_some_and(|v| v.valid)
    }
}

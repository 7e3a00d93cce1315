//! Speed computation, result validity and multi-server averages.

use crate::speedtest::session::MeasurementSession;
use crate::stats::mean;
use serde::Serialize;
use std::time::Duration;

/// Download/upload ratio beyond which a result is suspect.
pub const MAX_DIRECTION_RATIO: f64 = 100.0;

/// Largest plausible bandwidth-delay product, in megabits.
///
/// `speed_mbps * latency_s` is the amount of data that must be in flight to
/// sustain the measured speed. 1000 Mbit (125 MB) in flight does not happen
/// on a real access link: it would mean 1 Gbit/s over a one second path or
/// 100 Gbit/s over 10 ms.
pub const MAX_BANDWIDTH_DELAY_MBIT: f64 = 1000.0;

/// One point of a sample stream: bytes moved so far, time since start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Sample {
    pub bytes: u64,
    pub elapsed: Duration,
}

impl Sample {
    pub const ORIGIN: Sample = Sample { bytes: 0, elapsed: Duration::ZERO };

    pub fn new(bytes: u64, elapsed: Duration) -> Self {
        Self { bytes, elapsed }
    }
}

/// Which part of a sample stream the final speed is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateWindow {
    /// From the start of the test to the last sample.
    WholeInterval,
    /// The trailing window ending at the last sample. Skips the ramp-up
    /// at the start of the test.
    Trailing(Duration),
}

/// Speed in bits per second over `window`.
///
/// `None` when there are no samples or no time has passed.
pub fn speed_bps(samples: &[Sample], window: RateWindow) -> Option<f64> {
    let last = *samples.last()?;

    let base = match window {
        RateWindow::WholeInterval => Sample::ORIGIN,
        RateWindow::Trailing(width) => {
            let start = last.elapsed.saturating_sub(width);
            samples
                .iter()
                .rev()
                .find(|s| s.elapsed <= start)
                .copied()
                .unwrap_or(Sample::ORIGIN)
        }
    };

    rate_between(&base, &last)
}

fn rate_between(from: &Sample, to: &Sample) -> Option<f64> {
    let seconds = to.elapsed.saturating_sub(from.elapsed).as_secs_f64();
    if seconds <= 0.0 {
        return None;
    }

    let bytes = to.bytes.saturating_sub(from.bytes);
    Some(bytes as f64 * 8.0 / seconds)
}

/// Whether both bytes and elapsed time never decrease along the stream.
pub fn is_monotonic(samples: &[Sample]) -> bool {
    samples
        .windows(2)
        .all(|pair| pair[0].bytes <= pair[1].bytes && pair[0].elapsed <= pair[1].elapsed)
}

pub fn bps_to_mbps(bps: f64) -> f64 {
    bps / 1_000_000.0
}

/// Outcome of the plausibility check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Validity {
    pub valid: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
}

/// Inputs of [`check_result_valid`], taken from a finished session.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultSummary {
    pub latency: Option<Duration>,
    pub download_bps: Option<f64>,
    pub upload_bps: Option<f64>,
    pub samples_monotonic: bool,
}

/// Flag results that cannot be right.
///
/// A suspect result is still reported; the caller prints a warning.
pub fn check_result_valid(summary: &ResultSummary) -> Validity {
    let mut reasons = Vec::new();

    if !summary.samples_monotonic {
        reasons.push("byte counters went backwards".to_string());
    }

    let speeds = [("download", summary.download_bps), ("upload", summary.upload_bps)];

    for (name, speed) in speeds {
        let Some(bps) = speed else { continue };

        if !bps.is_finite() || bps < 0.0 {
            reasons.push(format!("{} speed is not a finite number", name));
            continue;
        }

        if let Some(latency) = summary.latency {
            let in_flight_mbit = bps_to_mbps(bps) * latency.as_secs_f64();
            if in_flight_mbit > MAX_BANDWIDTH_DELAY_MBIT {
                reasons.push(format!(
                    "{} speed of {:.2} Mbit/s is implausible at {:.0} ms latency",
                    name,
                    bps_to_mbps(bps),
                    latency.as_secs_f64() * 1000.0
                ));
            }
        }
    }

    if let (Some(dl), Some(ul)) = (summary.download_bps, summary.upload_bps) {
        if dl * MAX_DIRECTION_RATIO < ul || ul * MAX_DIRECTION_RATIO < dl {
            reasons.push(format!(
                "download and upload differ by more than {}x",
                MAX_DIRECTION_RATIO
            ));
        }
    }

    Validity { valid: reasons.is_empty(), reasons }
}

/// Mean speeds over several sessions, in Mbit/s.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Averages {
    pub download_mbps: Option<f64>,
    pub upload_mbps: Option<f64>,
    /// Sessions that contributed at least one speed.
    pub sessions: usize,
}

/// Arithmetic mean of per-session speeds.
///
/// Each direction only averages the sessions that produced a speed for it,
/// so a failed endpoint does not drag the average towards zero.
pub fn average<'a, I>(sessions: I) -> Averages
where
    I: IntoIterator<Item = &'a MeasurementSession>,
{
    let mut downloads = Vec::new();
    let mut uploads = Vec::new();
    let mut contributing = 0;

    for session in sessions {
        let dl = session.download_mbps();
        let ul = session.upload_mbps();

        if dl.is_some() || ul.is_some() {
            contributing += 1;
        }
        downloads.extend(dl);
        uploads.extend(ul);
    }

    Averages {
        download_mbps: mean(&downloads),
        upload_mbps: mean(&uploads),
        sessions: contributing,
    }
}

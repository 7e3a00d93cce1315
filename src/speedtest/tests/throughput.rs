//! Parallel download/upload workers and the sampling loop around them.
//!
//! Every worker moves whole chunks (one HTTP request each) until it is told
//! to stop. Workers share nothing but the [`ByteCounter`]; the engine loop
//! snapshots it at a fixed cadence into the sample stream the final speed is
//! computed from.

use crate::errors::{SpeedTestError, TransportError};
use crate::measurements::{is_monotonic, speed_bps, RateWindow, Sample};
use crate::progress::{Direction, ProgressCallback, ProgressEvent};
use crate::speedtest::tests::cancel::{Coordinator, Interrupt};
use crate::speedtest::transport::{Transport, UploadBody};
use bytes::{Bytes, BytesMut};
use futures::{stream, StreamExt};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Size of the block a streaming upload body is cut from.
pub const STREAM_BLOCK_SIZE: usize = 64 * 1024;

/// How transferred bytes are held and counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Download bodies are buffered whole and counted once complete; upload
    /// payloads are generated up front.
    #[default]
    FullBuffer,
    /// Bytes are counted per frame and dropped immediately; upload bodies
    /// are generated while they are sent. Keeps memory flat.
    Streaming,
}

impl Strategy {
    /// Window the final speed is computed over unless configured otherwise.
    ///
    /// Full-buffer counts arrive in bursts of whole chunks, so the first
    /// quarter of the test is skipped.
    pub fn default_window(&self, duration: Duration) -> RateWindow {
        match self {
            Strategy::FullBuffer => RateWindow::Trailing(duration * 3 / 4),
            Strategy::Streaming => RateWindow::WholeInterval,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThroughputConfig {
    /// Concurrent transfer workers.
    /// Default: 8
    pub workers: usize,
    /// How long the direction runs.
    /// Default: 10s
    pub duration: Duration,
    /// Stop once this many bytes moved in total.
    pub max_bytes: Option<u64>,
    /// Cadence of byte counter snapshots.
    /// Default: 100ms
    pub sample_interval: Duration,
    /// Cadence of progress events.
    /// Default: 1s
    pub progress_interval: Duration,
    /// Overrides [`Strategy::default_window`].
    pub rate_window: Option<RateWindow>,
}

impl Default for ThroughputConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            duration: Duration::from_secs(10),
            max_bytes: None,
            sample_interval: Duration::from_millis(100),
            progress_interval: Duration::from_secs(1),
            rate_window: None,
        }
    }
}

/// What every worker transfers, one chunk per request.
#[derive(Debug, Clone)]
pub enum TransferPlan {
    Download { url: Url },
    Upload { url: Url, size: usize },
}

impl TransferPlan {
    pub fn direction(&self) -> Direction {
        match self {
            TransferPlan::Download { .. } => Direction::Download,
            TransferPlan::Upload { .. } => Direction::Upload,
        }
    }
}

/// Bytes moved by all workers of one direction.
#[derive(Debug, Default)]
pub struct ByteCounter {
    total: AtomicU64,
}

impl ByteCounter {
    /// Adds `n` and returns the new total.
    pub fn add(&self, n: u64) -> u64 {
        self.total.fetch_add(n, Ordering::Relaxed) + n
    }

    pub fn get(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    fn reached(&self, target: Option<u64>) -> bool {
        target.is_some_and(|target| self.get() >= target)
    }
}

/// Why the engine stopped the workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    DurationElapsed,
    ByteTarget,
    WorkersFinished,
    DeadlineExpired,
    Cancelled,
}

/// What a single worker did.
#[derive(Debug)]
pub struct WorkerReport {
    pub id: usize,
    /// The worker's own bytes over time, since the start of the direction.
    pub samples: Vec<Sample>,
    pub bytes: u64,
    /// Completed requests.
    pub chunks: u64,
    /// The transport failure that ended the worker, if any.
    pub error: Option<TransportError>,
}

impl WorkerReport {
    fn new(id: usize) -> Self {
        Self { id, samples: Vec::new(), bytes: 0, chunks: 0, error: None }
    }

    fn record(&mut self, n: u64, elapsed: Duration) {
        self.bytes += n;
        self.samples.push(Sample::new(self.bytes, elapsed));
    }

    fn fail(&mut self, error: TransportError) {
        warn!("Transfer worker {} stopped: {}", self.id, error);
        self.error = Some(error);
    }
}

#[derive(Debug)]
pub struct ThroughputResult {
    pub direction: Direction,
    pub strategy: Strategy,
    pub bytes: u64,
    pub elapsed: Duration,
    /// Snapshots of the shared counter.
    pub samples: Vec<Sample>,
    pub speed_bps: f64,
    pub workers: Vec<WorkerReport>,
    pub stop: StopReason,
    /// The shared stream and every worker stream never went backwards.
    pub monotonic: bool,
}

impl ThroughputResult {
    pub fn worker_errors(&self) -> impl Iterator<Item = &TransportError> {
        self.workers.iter().filter_map(|w| w.error.as_ref())
    }
}

/// State shared by the workers of one direction.
struct WorkerContext<T> {
    transport: Arc<T>,
    counter: Arc<ByteCounter>,
    token: CancellationToken,
    strategy: Strategy,
    start: Instant,
    max_bytes: Option<u64>,
}

impl<T> Clone for WorkerContext<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            counter: Arc::clone(&self.counter),
            token: self.token.clone(),
            strategy: self.strategy,
            start: self.start,
            max_bytes: self.max_bytes,
        }
    }
}

impl<T> WorkerContext<T> {
    fn should_stop(&self) -> bool {
        self.token.is_cancelled() || self.counter.reached(self.max_bytes)
    }
}

/// Run one direction against an endpoint.
///
/// Returns once the duration elapsed, the byte target was reached, every
/// worker finished or the endpoint was interrupted. Fails with
/// `NoThroughputData` when no worker moved a single byte.
pub async fn run<T: Transport>(
    transport: Arc<T>,
    plan: TransferPlan,
    strategy: Strategy,
    config: &ThroughputConfig,
    coordinator: &Coordinator,
    progress: &dyn ProgressCallback,
) -> Result<ThroughputResult, SpeedTestError> {
    let direction = plan.direction();
    info!(
        "Starting {} test: {} workers, {:?}, {:?}",
        direction, config.workers, strategy, config.duration
    );

    let start = Instant::now();
    let end = (start + config.duration).min(coordinator.deadline());
    let context = WorkerContext {
        transport,
        counter: Arc::new(ByteCounter::default()),
        token: coordinator.token().child_token(),
        strategy,
        start,
        max_bytes: config.max_bytes,
    };

    let mut workers = JoinSet::new();
    for id in 0..config.workers.max(1) {
        let context = context.clone();
        match &plan {
            TransferPlan::Download { url } => {
                workers.spawn(download_worker(id, context, url.clone()));
            }
            TransferPlan::Upload { url, size } => {
                workers.spawn(upload_worker(id, context, url.clone(), *size));
            }
        }
    }

    let mut ticker =
        interval_at(start + config.sample_interval, config.sample_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut next_progress = config.progress_interval;

    let mut samples = Vec::new();
    let mut reports = Vec::with_capacity(config.workers);

    let stop = loop {
        tokio::select! {
            biased;
            interrupt = coordinator.interrupted() => {
                break match interrupt {
                    Interrupt::Cancelled => StopReason::Cancelled,
                    Interrupt::TimedOut => StopReason::DeadlineExpired,
                };
            }
            _ = sleep_until(end) => break StopReason::DurationElapsed,
            joined = workers.join_next() => match joined {
                Some(Ok(report)) => reports.push(report),
                Some(Err(e)) => warn!("Transfer worker panicked: {}", e),
                None => break StopReason::WorkersFinished,
            },
            _ = ticker.tick() => {
                let sample = Sample::new(context.counter.get(), start.elapsed());
                samples.push(sample);

                if sample.elapsed >= next_progress {
                    next_progress += config.progress_interval;
                    progress.on_progress(ProgressEvent::Throughput {
                        direction,
                        bytes: sample.bytes,
                        elapsed: sample.elapsed,
                        speed_bps: speed_bps(&samples, RateWindow::WholeInterval)
                            .unwrap_or(0.0),
                    });
                }

                if context.counter.reached(config.max_bytes) {
                    break StopReason::ByteTarget;
                }
            }
        }
    };

    let last = Sample::new(context.counter.get(), start.elapsed());
    if samples.last().is_none_or(|s| s.elapsed < last.elapsed) {
        samples.push(last);
    }

    debug!("Stopping {} workers: {:?}", direction, stop);
    context.token.cancel();
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(report) => reports.push(report),
            Err(e) => warn!("Transfer worker panicked: {}", e),
        }
    }
    reports.sort_by_key(|r| r.id);

    let monotonic = is_monotonic(&samples)
        && reports.iter().all(|r| is_monotonic(&r.samples));

    if last.bytes == 0 {
        if stop == StopReason::Cancelled {
            return Err(SpeedTestError::cancelled());
        }
        return Err(no_throughput(direction, &reports, last.elapsed));
    }

    let window = config
        .rate_window
        .unwrap_or_else(|| strategy.default_window(config.duration));
    let speed = speed_bps(&samples, window)
        .ok_or_else(|| no_throughput(direction, &reports, last.elapsed))?;

    let failed = reports.iter().filter(|r| r.error.is_some()).count();
    info!(
        "{} finished ({:?}): {} bytes in {:?}, {} of {} workers failed",
        direction,
        stop,
        last.bytes,
        last.elapsed,
        failed,
        reports.len()
    );

    Ok(ThroughputResult {
        direction,
        strategy,
        bytes: last.bytes,
        elapsed: last.elapsed,
        samples,
        speed_bps: speed,
        workers: reports,
        stop,
        monotonic,
    })
}

fn no_throughput(
    direction: Direction,
    reports: &[WorkerReport],
    elapsed: Duration,
) -> SpeedTestError {
    let mut message = format!("no {} data received in {:?}", direction, elapsed);

    if let Some(error) = reports.iter().find_map(|r| r.error.as_ref()) {
        message.push_str(&format!(" (first worker error: {})", error));
    }

    SpeedTestError::no_throughput_data(message)
}

async fn download_worker<T: Transport>(
    id: usize,
    context: WorkerContext<T>,
    url: Url,
) -> WorkerReport {
    let mut report = WorkerReport::new(id);
    let mut buffer = BytesMut::new();

    'requests: while !context.should_stop() {
        let response = tokio::select! {
            biased;
            _ = context.token.cancelled() => break,
            response = context.transport.download(&url) => response,
        };

        let mut body = match response {
            Ok(body) => body,
            Err(e) => {
                report.fail(e);
                break;
            }
        };

        buffer.clear();
        loop {
            let frame = tokio::select! {
                biased;
                _ = context.token.cancelled() => break 'requests,
                frame = body.next() => frame,
            };

            match frame {
                Some(Ok(bytes)) => match context.strategy {
                    Strategy::Streaming => {
                        let n = bytes.len() as u64;
                        context.counter.add(n);
                        report.record(n, context.start.elapsed());
                    }
                    Strategy::FullBuffer => buffer.extend_from_slice(&bytes),
                },
                Some(Err(e)) => {
                    report.fail(e);
                    break 'requests;
                }
                None => break,
            }
        }

        if context.strategy == Strategy::FullBuffer {
            let n = buffer.len() as u64;
            context.counter.add(n);
            report.record(n, context.start.elapsed());
        }
        report.chunks += 1;
    }

    debug!(
        "Download worker {} done: {} bytes in {} requests",
        id, report.bytes, report.chunks
    );
    report
}

async fn upload_worker<T: Transport>(
    id: usize,
    context: WorkerContext<T>,
    url: Url,
    size: usize,
) -> WorkerReport {
    let mut report = WorkerReport::new(id);

    let payload = match context.strategy {
        Strategy::FullBuffer => Bytes::from(vec![b'0'; size]),
        Strategy::Streaming => Bytes::from(vec![b'0'; STREAM_BLOCK_SIZE.min(size)]),
    };
    let sent = Arc::new(AtomicU64::new(0));

    while !context.should_stop() {
        let body = match context.strategy {
            Strategy::FullBuffer => UploadBody::Full(payload.clone()),
            Strategy::Streaming => streaming_body(
                payload.clone(),
                size as u64,
                Arc::clone(&context.counter),
                Arc::clone(&sent),
            ),
        };

        let outcome = tokio::select! {
            biased;
            _ = context.token.cancelled() => break,
            outcome = context.transport.upload(&url, body) => outcome,
        };

        if let Err(e) = outcome {
            report.fail(e);
            break;
        }

        let n = match context.strategy {
            Strategy::FullBuffer => {
                context.counter.add(size as u64);
                size as u64
            }
            // Already counted as the body was pulled.
            Strategy::Streaming => sent.swap(0, Ordering::Relaxed),
        };
        report.record(n, context.start.elapsed());
        report.chunks += 1;
    }

    debug!(
        "Upload worker {} done: {} bytes in {} requests",
        id, report.bytes, report.chunks
    );
    report
}

/// A body of `len` bytes cut lazily from `block`, counted as it is pulled.
fn streaming_body(
    block: Bytes,
    len: u64,
    counter: Arc<ByteCounter>,
    sent: Arc<AtomicU64>,
) -> UploadBody {
    let block_len = block.len().max(1) as u64;
    let blocks = len.div_ceil(block_len);

    let stream = stream::iter(0..blocks).map(move |i| {
        let n = block_len.min(len - i * block_len);
        counter.add(n);
        sent.fetch_add(n, Ordering::Relaxed);
        Ok::<_, std::io::Error>(block.slice(..n as usize))
    });

    UploadBody::Streaming { len, stream: Box::pin(stream) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::progress::testing::RecordingProgress;
    use crate::progress::NoProgress;
    use crate::speedtest::tests::mock::{DownloadBehavior, MockTransport, UploadBehavior};

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn download() -> TransferPlan {
        TransferPlan::Download {
            url: Url::parse("http://mock/random1000x1000.jpg").unwrap(),
        }
    }

    fn upload(size: usize) -> TransferPlan {
        TransferPlan::Upload { url: Url::parse("http://mock/upload.php").unwrap(), size }
    }

    fn config(workers: usize, duration: Duration) -> ThroughputConfig {
        ThroughputConfig { workers, duration, ..ThroughputConfig::default() }
    }

    fn coordinator(parent: &CancellationToken, timeout: Duration) -> Coordinator {
        let mut coordinator = Coordinator::new(parent, timeout);
        coordinator.start();
        coordinator
    }

    fn chunks(size: usize, count: usize, interval: Duration) -> DownloadBehavior {
        DownloadBehavior::Chunks { size, count, interval }
    }

    #[tokio::test(start_paused = true)]
    async fn test_streaming_download_counts_frames() {
        let transport = MockTransport::default().with_download(chunks(1000, 1000, ms(100)));
        let parent = CancellationToken::new();
        let coordinator = coordinator(&parent, Duration::from_secs(30));

        let result = run(
            Arc::new(transport),
            download(),
            Strategy::Streaming,
            &config(2, Duration::from_secs(1)),
            &coordinator,
            &NoProgress,
        )
        .await
        .unwrap();

        assert_eq!(result.stop, StopReason::DurationElapsed);
        assert_eq!(result.elapsed, Duration::from_secs(1));
        assert!((18_000..=20_000).contains(&result.bytes), "{}", result.bytes);
        // 2 workers * 10 kB/s
        assert!((result.speed_bps - 160_000.0).abs() <= 16_000.0, "{}", result.speed_bps);
        assert!(result.monotonic);
        assert_eq!(result.workers.len(), 2);
        assert_eq!(result.workers.iter().map(|w| w.bytes).sum::<u64>(), result.bytes);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_buffer_download_counts_whole_chunks() {
        let transport = MockTransport::default().with_download(chunks(1000, 5, ms(100)));
        let parent = CancellationToken::new();
        let coordinator = coordinator(&parent, Duration::from_secs(30));

        let result = run(
            Arc::new(transport),
            download(),
            Strategy::FullBuffer,
            &config(1, ms(1750)),
            &coordinator,
            &NoProgress,
        )
        .await
        .unwrap();

        // Chunks complete at 500, 1000 and 1500 ms; the fourth is cut off.
        assert_eq!(result.bytes, 15_000);
        assert_eq!(result.workers[0].chunks, 3);
        assert!(result.samples.iter().all(|s| s.bytes % 5000 == 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_transport_is_no_throughput_data() {
        let transport = MockTransport::default().with_download(DownloadBehavior::Hang);
        let parent = CancellationToken::new();
        let coordinator = coordinator(&parent, Duration::from_secs(30));

        let started = Instant::now();
        let err = run(
            Arc::new(transport),
            download(),
            Strategy::Streaming,
            &config(4, Duration::from_secs(3)),
            &coordinator,
            &NoProgress,
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind, ErrorKind::NoThroughputData);
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_endpoint_deadline_bounds_the_direction() {
        let transport = MockTransport::default().with_download(chunks(1000, 1000, ms(100)));
        let parent = CancellationToken::new();
        let coordinator = coordinator(&parent, ms(500));

        let result = run(
            Arc::new(transport),
            download(),
            Strategy::Streaming,
            &config(1, Duration::from_secs(10)),
            &coordinator,
            &NoProgress,
        )
        .await
        .unwrap();

        assert_eq!(result.stop, StopReason::DeadlineExpired);
        assert_eq!(result.elapsed, ms(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_workers_promptly() {
        let transport = MockTransport::default().with_download(chunks(1000, 1000, ms(100)));
        let parent = CancellationToken::new();
        let coordinator = coordinator(&parent, Duration::from_secs(30));

        let trigger = parent.clone();
        tokio::spawn(async move {
            tokio::time::sleep(ms(350)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result = run(
            Arc::new(transport),
            download(),
            Strategy::Streaming,
            &config(4, Duration::from_secs(10)),
            &coordinator,
            &NoProgress,
        )
        .await
        .unwrap();

        assert_eq!(result.stop, StopReason::Cancelled);
        // Within one chunk interval of the cancellation.
        assert!(started.elapsed() <= ms(450), "{:?}", started.elapsed());
        assert_eq!(result.workers.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_any_data() {
        let transport = MockTransport::default().with_download(DownloadBehavior::Hang);
        let parent = CancellationToken::new();
        let coordinator = coordinator(&parent, Duration::from_secs(30));
        parent.cancel();

        let err = run(
            Arc::new(transport),
            download(),
            Strategy::Streaming,
            &config(2, Duration::from_secs(10)),
            &coordinator,
            &NoProgress,
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_error_does_not_abort_siblings() {
        let transport = MockTransport::default().with_download(DownloadBehavior::FailFirst {
            failures: 1,
            then: Box::new(chunks(1000, 1000, ms(100))),
        });
        let parent = CancellationToken::new();
        let coordinator = coordinator(&parent, Duration::from_secs(30));

        let result = run(
            Arc::new(transport),
            download(),
            Strategy::Streaming,
            &config(4, Duration::from_secs(1)),
            &coordinator,
            &NoProgress,
        )
        .await
        .unwrap();

        assert_eq!(result.stop, StopReason::DurationElapsed);
        assert_eq!(result.worker_errors().count(), 1);
        let healthy: Vec<&WorkerReport> =
            result.workers.iter().filter(|w| w.error.is_none()).collect();
        assert_eq!(healthy.len(), 3);
        assert!(healthy.iter().all(|w| w.bytes > 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_workers_failing() {
        let transport = MockTransport::default().with_download(DownloadBehavior::Fail);
        let parent = CancellationToken::new();
        let coordinator = coordinator(&parent, Duration::from_secs(30));

        let started = Instant::now();
        let err = run(
            Arc::new(transport),
            download(),
            Strategy::FullBuffer,
            &config(3, Duration::from_secs(10)),
            &coordinator,
            &NoProgress,
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind, ErrorKind::NoThroughputData);
        assert!(err.message.contains("first worker error"));
        // Every worker gave up, nothing to wait for.
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_byte_target() {
        let transport = MockTransport::default().with_download(chunks(1000, 1000, ms(100)));
        let parent = CancellationToken::new();
        let coordinator = coordinator(&parent, Duration::from_secs(30));

        let config = ThroughputConfig {
            max_bytes: Some(5000),
            ..config(1, Duration::from_secs(10))
        };
        let result = run(
            Arc::new(transport),
            download(),
            Strategy::Streaming,
            &config,
            &coordinator,
            &NoProgress,
        )
        .await
        .unwrap();

        assert_eq!(result.stop, StopReason::ByteTarget);
        assert!(result.bytes >= 5000);
        assert!(result.elapsed < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_buffer_upload() {
        let transport = MockTransport::default()
            .with_upload(UploadBehavior::Accept { delay: ms(250) });
        let parent = CancellationToken::new();
        let coordinator = coordinator(&parent, Duration::from_secs(30));

        let result = run(
            Arc::new(transport),
            upload(100_000),
            Strategy::FullBuffer,
            &config(2, Duration::from_secs(1)),
            &coordinator,
            &NoProgress,
        )
        .await
        .unwrap();

        assert_eq!(result.direction, Direction::Upload);
        assert_eq!(result.bytes % 100_000, 0);
        assert!(result.bytes >= 600_000, "{}", result.bytes);
    }

    #[tokio::test(start_paused = true)]
    async fn test_streaming_upload_counts_as_sent() {
        let transport = MockTransport::default()
            .with_upload(UploadBehavior::Accept { delay: ms(10) });
        let parent = CancellationToken::new();
        let coordinator = coordinator(&parent, Duration::from_secs(30));

        // Four blocks per request: 3 * 64 KiB and a short tail.
        let size = 3 * STREAM_BLOCK_SIZE + 1000;
        let result = run(
            Arc::new(transport),
            upload(size),
            Strategy::Streaming,
            &config(1, Duration::from_secs(1)),
            &coordinator,
            &NoProgress,
        )
        .await
        .unwrap();

        assert_eq!(result.stop, StopReason::DurationElapsed);
        assert!(result.bytes > size as u64);
        assert!(result.workers[0].chunks >= 20);
        assert!(result.monotonic);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_cadence() {
        let transport = MockTransport::default().with_download(chunks(1000, 1000, ms(100)));
        let parent = CancellationToken::new();
        let coordinator = coordinator(&parent, Duration::from_secs(30));
        let progress = RecordingProgress::default();

        run(
            Arc::new(transport),
            download(),
            Strategy::Streaming,
            &config(1, ms(3500)),
            &coordinator,
            &progress,
        )
        .await
        .unwrap();

        assert_eq!(progress.throughput_ticks(Direction::Download), 3);
        assert_eq!(progress.throughput_ticks(Direction::Upload), 0);
    }

    #[test]
    fn test_streaming_body_length() {
        let counter = Arc::new(ByteCounter::default());
        let sent = Arc::new(AtomicU64::new(0));
        let body = streaming_body(
            Bytes::from(vec![b'0'; 4]),
            10,
            Arc::clone(&counter),
            Arc::clone(&sent),
        );
        assert_eq!(body.content_length(), 10);

        let UploadBody::Streaming { stream, .. } = body else {
            panic!("expected a streaming body");
        };
        let lengths: Vec<usize> = futures::executor::block_on(
            stream.map(|chunk| chunk.unwrap().len()).collect::<Vec<_>>(),
        );
        assert_eq!(lengths, vec![4, 4, 2]);
        assert_eq!(counter.get(), 10);
        assert_eq!(sent.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn test_default_windows() {
        let duration = Duration::from_secs(10);
        assert_eq!(
            Strategy::FullBuffer.default_window(duration),
            RateWindow::Trailing(Duration::from_millis(7500))
        );
        assert_eq!(Strategy::Streaming.default_window(duration), RateWindow::WholeInterval);
    }
}

pub mod throughput;

#[cfg(test)]
pub(crate) mod mock {
    //! A scripted [`Transport`] driven by tokio's clock.

    use crate::errors::TransportError;
    use crate::speedtest::transport::{ChunkStream, Transport, UploadBody};
    use bytes::Bytes;
    use futures::{stream, StreamExt};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::sleep;
    use url::Url;

    #[derive(Debug, Clone)]
    pub enum PingOutcome {
        Reply(Duration),
        Fail,
        Hang,
    }

    #[derive(Debug, Clone)]
    pub enum DownloadBehavior {
        /// Every request yields `count` frames of `size` bytes, one per
        /// `interval`.
        Chunks { size: usize, count: usize, interval: Duration },
        /// Headers arrive, the body never does.
        Hang,
        Fail,
        /// The first `failures` requests across all workers fail.
        FailFirst { failures: usize, then: Box<DownloadBehavior> },
    }

    #[derive(Debug, Clone)]
    pub enum UploadBehavior {
        /// Takes `delay` per request, or per block of a streaming body.
        Accept { delay: Duration },
        Hang,
        Fail,
    }

    pub struct MockTransport {
        /// Consumed front to back; the last outcome repeats.
        pings: Mutex<VecDeque<PingOutcome>>,
        download: DownloadBehavior,
        /// Download behavior for specific hosts.
        hosts: Vec<(String, DownloadBehavior)>,
        upload: UploadBehavior,
        pub download_requests: AtomicUsize,
        pub upload_requests: AtomicUsize,
    }

    impl Default for MockTransport {
        fn default() -> Self {
            Self {
                pings: Mutex::new(VecDeque::from([PingOutcome::Reply(
                    Duration::from_millis(10),
                )])),
                download: DownloadBehavior::Chunks {
                    size: 1000,
                    count: 100,
                    interval: Duration::from_millis(10),
                },
                hosts: Vec::new(),
                upload: UploadBehavior::Accept { delay: Duration::from_millis(10) },
                download_requests: AtomicUsize::new(0),
                upload_requests: AtomicUsize::new(0),
            }
        }
    }

    impl MockTransport {
        pub fn with_pings(self, pings: Vec<PingOutcome>) -> Self {
            Self { pings: Mutex::new(pings.into()), ..self }
        }

        pub fn with_download(self, download: DownloadBehavior) -> Self {
            Self { download, ..self }
        }

        pub fn with_host_download(mut self, host: &str, download: DownloadBehavior) -> Self {
            self.hosts.push((host.to_string(), download));
            self
        }

        pub fn with_upload(self, upload: UploadBehavior) -> Self {
            Self { upload, ..self }
        }

        fn next_ping(&self) -> PingOutcome {
            let mut pings = self.pings.lock().unwrap();
            if pings.len() > 1 {
                pings.pop_front().unwrap()
            } else {
                pings.front().cloned().unwrap_or(PingOutcome::Fail)
            }
        }

        fn body(behavior: &DownloadBehavior, request: usize) -> Result<ChunkStream, TransportError> {
            match behavior {
                DownloadBehavior::Chunks { size, count, interval } => {
                    let (size, interval) = (*size, *interval);
                    Ok(stream::iter(0..*count)
                        .then(move |_| async move {
                            sleep(interval).await;
                            Ok::<_, TransportError>(Bytes::from(vec![0u8; size]))
                        })
                        .boxed())
                }
                DownloadBehavior::Hang => Ok(stream::pending().boxed()),
                DownloadBehavior::Fail => Err(TransportError::Status(503)),
                DownloadBehavior::FailFirst { failures, then } => {
                    if request < *failures {
                        Err(TransportError::Other("connection reset".to_string()))
                    } else {
                        Self::body(then, request)
                    }
                }
            }
        }
    }

    impl Transport for MockTransport {
        async fn ping(&self, _url: &Url) -> Result<(), TransportError> {
            match self.next_ping() {
                PingOutcome::Reply(rtt) => {
                    sleep(rtt).await;
                    Ok(())
                }
                PingOutcome::Fail => Err(TransportError::Status(404)),
                PingOutcome::Hang => std::future::pending().await,
            }
        }

        async fn download(&self, url: &Url) -> Result<ChunkStream, TransportError> {
            let request = self.download_requests.fetch_add(1, Ordering::SeqCst);
            let behavior = self
                .hosts
                .iter()
                .find(|(host, _)| url.host_str() == Some(host.as_str()))
                .map_or(&self.download, |(_, behavior)| behavior);
            Self::body(behavior, request)
        }

        async fn upload(&self, _url: &Url, body: UploadBody) -> Result<(), TransportError> {
            self.upload_requests.fetch_add(1, Ordering::SeqCst);

            match &self.upload {
                UploadBehavior::Accept { delay } => {
                    match body {
                        UploadBody::Full(_) => sleep(*delay).await,
                        UploadBody::Streaming { mut stream, .. } => {
                            while let Some(block) = stream.next().await {
                                block.map_err(|e| TransportError::Other(e.to_string()))?;
                                sleep(*delay).await;
                            }
                        }
                    }
                    Ok(())
                }
                UploadBehavior::Hang => std::future::pending().await,
                UploadBehavior::Fail => Err(TransportError::Status(500)),
            }
        }
    }
}

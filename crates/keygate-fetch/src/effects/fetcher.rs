use std::path::Path;

use futures_util::StreamExt;
use keygate_fs::PartialFile;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::core::{ThroughputMeter, check_file_size, is_http_error, is_redirect, resolve_location};
use crate::data::{DownloadSource, FetchOptions, FetchPhase, FetchReport, Progress, SourceKind};
use crate::effects::http::{HttpClient, HttpResponse};
use crate::error::{FetchError, Result};

/// Downloads one URL to one file, or walks an ordered list of sources.
pub struct Fetcher<C: HttpClient> {
    pub(crate) client: C,
}

impl<C: HttpClient> Fetcher<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Download `url` into `destination`.
    ///
    /// Parent directories are created as needed. On any error the destination file is
    /// removed before returning, so a failed call never leaves a partial file behind.
    pub async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        options: &FetchOptions,
    ) -> Result<FetchReport> {
        self.fetch_from(&DownloadSource::primary(url), destination, options)
            .await
    }

    /// Try the primary URL, then the backup URL once. The backup's error is the one
    /// returned when both fail.
    pub async fn fetch_with_fallback(
        &self,
        primary: &str,
        backup: &str,
        destination: &Path,
        options: &FetchOptions,
    ) -> Result<FetchReport> {
        let sources = [DownloadSource::primary(primary), DownloadSource::backup(backup)];
        self.fetch_first(&sources, destination, options).await
    }

    /// Try sources in order until one succeeds; the last failure propagates.
    pub async fn fetch_first(
        &self,
        sources: &[DownloadSource],
        destination: &Path,
        options: &FetchOptions,
    ) -> Result<FetchReport> {
        let mut last_error = None;
        for source in sources {
            match self.fetch_from(source, destination, options).await {
                Ok(report) => return Ok(report),
                Err(e) => {
                    warn!(source = %source.kind, url = %source.url, error = %e, "download attempt failed");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or(FetchError::NoSources))
    }

    async fn fetch_from(
        &self,
        source: &DownloadSource,
        destination: &Path,
        options: &FetchOptions,
    ) -> Result<FetchReport> {
        keygate_fs::ensure_parent(destination)?;
        let partial = PartialFile::new(destination);
        let limit = options.timeouts.total;

        let (bytes, final_url) =
            match tokio::time::timeout(limit, self.transfer(source, partial.path(), options)).await
            {
                Ok(result) => result?,
                Err(_) => {
                    return Err(FetchError::Timeout {
                        url: source.url.clone(),
                        after: limit,
                    });
                }
            };

        self.report_progress(options, source.kind, FetchPhase::Verifying, bytes, None);
        let on_disk = tokio::fs::metadata(partial.path())
            .await
            .map_err(|e| FetchError::io(partial.path(), e))?
            .len();
        check_file_size(on_disk, options.min_file_size)?;

        let path = partial.commit();
        self.report_progress(options, source.kind, FetchPhase::Completed, bytes, Some(bytes));
        info!(url = %final_url, bytes, path = %path.display(), "download complete");

        Ok(FetchReport {
            path,
            bytes,
            final_url,
            source: source.kind,
        })
    }

    /// Stream the body into `path`. Returns the byte count and the post-redirect URL.
    async fn transfer(
        &self,
        source: &DownloadSource,
        path: &Path,
        options: &FetchOptions,
    ) -> Result<(u64, String)> {
        self.report_progress(options, source.kind, FetchPhase::Connecting, 0, None);
        let (response, final_url) = self.open(&source.url, options).await?;
        let total_bytes = response.content_length;

        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| FetchError::io(path, e))?;
        let mut body = response.body;
        let mut meter = options
            .low_speed
            .map(|limit| ThroughputMeter::new(limit, Instant::now()));
        let mut bytes_downloaded = 0u64;

        self.report_progress(options, source.kind, FetchPhase::Downloading, 0, total_bytes);

        loop {
            let next = match meter.as_ref().map(ThroughputMeter::window) {
                Some(window) => match tokio::time::timeout(window, body.next()).await {
                    Ok(next) => next,
                    Err(_) => return Err(self.too_slow(&final_url, options, 0)),
                },
                None => body.next().await,
            };
            let Some(chunk) = next else { break };
            let chunk = chunk.map_err(|e| FetchError::Network {
                url: final_url.clone(),
                message: e.to_string(),
            })?;

            file.write_all(&chunk)
                .await
                .map_err(|e| FetchError::io(path, e))?;
            bytes_downloaded += chunk.len() as u64;

            if let Some(meter) = meter.as_mut() {
                if let Err(observed) = meter.record(chunk.len() as u64, Instant::now()) {
                    return Err(self.too_slow(&final_url, options, observed));
                }
            }

            self.report_progress(
                options,
                source.kind,
                FetchPhase::Downloading,
                bytes_downloaded,
                total_bytes,
            );
        }

        file.flush().await.map_err(|e| FetchError::io(path, e))?;
        debug!(url = %final_url, bytes = bytes_downloaded, "body received");
        Ok((bytes_downloaded, final_url))
    }

    /// Request `url`, following up to `max_redirects` hops. Error statuses fail here.
    async fn open(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<(HttpResponse<C::Error>, String)> {
        let mut current = url.to_string();

        for _ in 0..=options.max_redirects {
            let connect = options.timeouts.connect;
            let attempt =
                tokio::time::timeout(connect, self.client.stream(&current, &options.headers)).await;
            let response = match attempt {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    return Err(FetchError::Connect {
                        url: current,
                        message: e.to_string(),
                    });
                }
                Err(_) => {
                    return Err(FetchError::ConnectTimeout {
                        url: current,
                        after: connect,
                    });
                }
            };

            if is_redirect(response.status) {
                let Some(location) = response.location.as_deref() else {
                    return Err(FetchError::Http {
                        url: current,
                        status: response.status,
                    });
                };
                let next = resolve_location(&current, location)?;
                debug!(from = %current, to = %next, status = response.status, "following redirect");
                current = next;
                continue;
            }

            if is_http_error(response.status) {
                return Err(FetchError::Http {
                    url: current,
                    status: response.status,
                });
            }

            return Ok((response, current));
        }

        Err(FetchError::TooManyRedirects {
            url: url.to_string(),
            max: options.max_redirects,
        })
    }

    fn too_slow(&self, url: &str, options: &FetchOptions, observed: u64) -> FetchError {
        FetchError::LowThroughput {
            url: url.to_string(),
            observed,
            limit: options.low_speed.map(|l| l.bytes_per_sec).unwrap_or_default(),
        }
    }

    fn report_progress(
        &self,
        options: &FetchOptions,
        source: SourceKind,
        phase: FetchPhase,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    ) {
        if let Some(ref callback) = options.on_progress {
            callback(&Progress {
                phase,
                source,
                bytes_downloaded,
                total_bytes,
            });
        }
    }
}

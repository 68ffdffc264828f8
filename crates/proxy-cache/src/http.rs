//! HTTP connector to the backend fileserver and the metadata proxy.
//!
//! Grounded on `FSCacheHTTPConnector` in `fs_cache.py`: a semaphore bounds
//! concurrent outbound requests, failed requests are retried with jittered
//! backoff unless the server answered with a non-500 status, and every
//! request carries a generated id for cross-referencing with logs.

use proxy_telemetry::Metrics;
use rand::Rng;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Delays (seconds) before each retry attempt, randomized within
/// `[0.75, 1.25]x` to avoid a thundering herd when the backend recovers.
const RETRY_DELAYS_SECS: &[u64] = &[0, 2, 3, 5, 15, 30, 60, 60, 60, 60, 60, 60, 60, 60, 60, 60];

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned status {0}")]
    BadStatus(StatusCode),
    #[error("gave up after {0} attempts")]
    GaveUp(usize),
    #[error("local I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct HttpConnector {
    client: Client,
    metadata_proxy_base: String,
    backend_base: String,
    semaphore: Arc<Semaphore>,
    metrics: Arc<Metrics>,
}

impl HttpConnector {
    pub fn new(
        client: Client,
        metadata_proxy_host: &str,
        metadata_proxy_port: u16,
        backend_host: &str,
        backend_port: u16,
        concurrency: usize,
        metrics: Arc<Metrics>,
    ) -> HttpConnector {
        HttpConnector {
            client,
            metadata_proxy_base: format!("http://{metadata_proxy_host}:{metadata_proxy_port}"),
            backend_base: format!("https://{backend_host}:{backend_port}"),
            semaphore: Arc::new(Semaphore::new(concurrency)),
            metrics,
        }
    }

    /// A single best-effort attempt: acquires the semaphore, issues the
    /// request, and maps non-200 responses to an error. No retries here;
    /// see [`Self::post_with_retry`] for the policy built on top.
    async fn post_once(
        &self,
        url: &str,
        form: &[(&str, String)],
        timeout: Duration,
    ) -> Result<Vec<u8>, HttpError> {
        let _permit = self.semaphore.acquire().await.expect("semaphore closed");
        self.metrics.incr("http.requests.started");

        let started = std::time::Instant::now();
        let result = self
            .client
            .post(url)
            .timeout(timeout)
            .form(form)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status() == StatusCode::OK => {
                self.metrics.incr("http.requests.succeeded");
                self.metrics.timing("http.requests.duration", started.elapsed());
                Ok(resp.bytes().await?.to_vec())
            }
            Ok(resp) => {
                let status = resp.status();
                self.metrics.incr("http.requests.failed");
                Err(HttpError::BadStatus(status))
            }
            Err(e) => {
                self.metrics.incr("http.requests.failed");
                Err(HttpError::Transport(e))
            }
        }
    }

    /// Retries transport errors and HTTP 500s with the jittered backoff
    /// schedule; any other status fails immediately, since retrying a
    /// client error (404, 403, ...) can't succeed.
    pub async fn post_with_retry(
        &self,
        url: &str,
        form: &[(&str, String)],
        timeout: Duration,
    ) -> Result<Vec<u8>, HttpError> {
        let mut last_err = None;

        for (attempt, delay_secs) in RETRY_DELAYS_SECS.iter().enumerate() {
            if *delay_secs > 0 {
                let jitter = rand::thread_rng().gen_range(0.75..1.25);
                tokio::time::sleep(Duration::from_secs_f64(*delay_secs as f64 * jitter)).await;
            }

            match self.post_once(url, form, timeout).await {
                Ok(body) => return Ok(body),
                Err(HttpError::BadStatus(status)) if status == StatusCode::INTERNAL_SERVER_ERROR => {
                    last_err = Some(HttpError::BadStatus(status));
                }
                Err(HttpError::BadStatus(status)) => {
                    return Err(HttpError::BadStatus(status));
                }
                Err(e) => {
                    last_err = Some(e);
                }
            }
            let _ = attempt;
        }

        self.metrics.incr("http.requests.given_up");
        let _ = last_err;
        Err(HttpError::GaveUp(RETRY_DELAYS_SECS.len()))
    }

    /// A single best-effort GET attempt, mirroring [`Self::post_once`] but
    /// for the raw-content endpoints that take their argument as a query
    /// parameter instead of a form body.
    async fn get_once(
        &self,
        url: &str,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> Result<Vec<u8>, HttpError> {
        let _permit = self.semaphore.acquire().await.expect("semaphore closed");
        self.metrics.incr("http.requests.started");

        let started = std::time::Instant::now();
        let result = self
            .client
            .get(url)
            .timeout(timeout)
            .query(query)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status() == StatusCode::OK => {
                self.metrics.incr("http.requests.succeeded");
                self.metrics.timing("http.requests.duration", started.elapsed());
                Ok(resp.bytes().await?.to_vec())
            }
            Ok(resp) => {
                let status = resp.status();
                self.metrics.incr("http.requests.failed");
                Err(HttpError::BadStatus(status))
            }
            Err(e) => {
                self.metrics.incr("http.requests.failed");
                Err(HttpError::Transport(e))
            }
        }
    }

    /// Retries a GET with the same jittered-backoff policy as
    /// [`Self::post_with_retry`].
    async fn get_with_retry(
        &self,
        url: &str,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> Result<Vec<u8>, HttpError> {
        let mut last_err = None;

        for (attempt, delay_secs) in RETRY_DELAYS_SECS.iter().enumerate() {
            if *delay_secs > 0 {
                let jitter = rand::thread_rng().gen_range(0.75..1.25);
                tokio::time::sleep(Duration::from_secs_f64(*delay_secs as f64 * jitter)).await;
            }

            match self.get_once(url, query, timeout).await {
                Ok(body) => return Ok(body),
                Err(HttpError::BadStatus(status)) if status == StatusCode::INTERNAL_SERVER_ERROR => {
                    last_err = Some(HttpError::BadStatus(status));
                }
                Err(HttpError::BadStatus(status)) => {
                    return Err(HttpError::BadStatus(status));
                }
                Err(e) => {
                    last_err = Some(e);
                }
            }
            let _ = attempt;
        }

        self.metrics.incr("http.requests.given_up");
        let _ = last_err;
        Err(HttpError::GaveUp(RETRY_DELAYS_SECS.len()))
    }

    /// `GET /get?file=<path>`: fetches a small file's raw content directly
    /// from the backend fileserver, matching `http_get_file_async`.
    pub async fn get_file(&self, full_path: &str) -> Result<Vec<u8>, HttpError> {
        let url = format!("{}/get", self.backend_base);
        self.get_with_retry(&url, &[("file", full_path.to_string())], Duration::from_secs(60))
            .await
    }

    pub async fn get_metadata(&self, full_path: &str) -> Result<Vec<u8>, HttpError> {
        let url = format!("{}/file_metadata.json", self.metadata_proxy_base);
        self.post_with_retry(&url, &[("path", full_path.to_string())], Duration::from_secs(10))
            .await
    }

    pub async fn get_dir_listing(
        &self,
        full_path: &str,
        list_dir_timeout: Duration,
    ) -> Result<Vec<u8>, HttpError> {
        let url = format!("{}/list_dir.json", self.metadata_proxy_base);
        self.post_with_retry(&url, &[("path", full_path.to_string())], list_dir_timeout)
            .await
    }

    pub async fn delete_file(&self, full_path: &str) -> Result<(), HttpError> {
        let url = format!("{}/delete_file.json", self.backend_base);
        self.post_with_retry(&url, &[("file", full_path.to_string())], Duration::from_secs(10))
            .await?;
        Ok(())
    }

    pub async fn touch_file(&self, full_path: &str) -> Result<(), HttpError> {
        let url = format!("{}/touch_file.json", self.backend_base);
        self.post_with_retry(&url, &[("file", full_path.to_string())], Duration::from_secs(10))
            .await?;
        Ok(())
    }

    /// Direct write-through for files under the content-addressed transfer
    /// threshold: a multipart PUT straight to the backend fileserver,
    /// matching `http_write_file_async`.
    pub async fn write_file(&self, full_path: &str, local_path: &std::path::Path) -> Result<(), HttpError> {
        let bytes = tokio::fs::read(local_path).await?;

        let part = reqwest::multipart::Part::bytes(bytes).file_name("file");
        let form = reqwest::multipart::Form::new()
            .text("path", full_path.to_string())
            .part("file", part);

        let _permit = self.semaphore.acquire().await.expect("semaphore closed");
        let url = format!("{}/put", self.backend_base);
        let resp = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(60))
            .multipart(form)
            .send()
            .await?;

        if resp.status() != StatusCode::OK {
            return Err(HttpError::BadStatus(resp.status()));
        }
        Ok(())
    }
}

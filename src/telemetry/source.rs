use async_trait::async_trait;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::errors::ProducerError;
use crate::fetch::auth::UrlParam;
use crate::fetch::{BasicClient, HttpClient, fetch_bytes};
use crate::telemetry::syncromatics::parse_prediction_document;
use crate::telemetry::{TelemetryCycle, TelemetrySource};

/// Polls the vendor prediction endpoint over HTTP.
pub struct HttpTelemetrySource<C> {
    client: C,
    url: String,
    slow_after: Duration,
}

impl<C: HttpClient> HttpTelemetrySource<C> {
    pub fn new(client: C, url: String, slow_after: Duration) -> Self {
        Self {
            client,
            url,
            slow_after,
        }
    }
}

#[async_trait]
impl<C: HttpClient> TelemetrySource for HttpTelemetrySource<C> {
    #[tracing::instrument(skip(self), fields(url = %self.url))]
    async fn poll(&self) -> Result<TelemetryCycle, ProducerError> {
        let started = Instant::now();
        let bytes = fetch_bytes(&self.client, &self.url).await?;

        let elapsed = started.elapsed();
        if elapsed > self.slow_after {
            warn!(elapsed_ms = elapsed.as_millis() as u64, "Telemetry fetch was slow");
        }
        debug!(bytes = bytes.len(), "Telemetry received, parsing");

        parse_prediction_document(&bytes)
    }
}

/// Reads a prediction document from disk on every poll.
pub struct FileTelemetrySource {
    path: PathBuf,
}

impl FileTelemetrySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TelemetrySource for FileTelemetrySource {
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    async fn poll(&self) -> Result<TelemetryCycle, ProducerError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| ProducerError::FetchFailure(format!("{}: {e}", self.path.display())))?;
        parse_prediction_document(&bytes)
    }
}

/// Picks an HTTP or file source depending on whether `source` looks like a URL.
pub fn source_from(
    source: &str,
    api_key: Option<String>,
    timeout: Duration,
) -> Result<Box<dyn TelemetrySource>, ProducerError> {
    if !source.starts_with("http") {
        return Ok(Box::new(FileTelemetrySource::new(source)));
    }

    let client = BasicClient::new(timeout)?;
    let slow_after = timeout / 2;
    Ok(match api_key {
        Some(key) => Box::new(HttpTelemetrySource::new(
            UrlParam::api_key(client, key),
            source.to_string(),
            slow_after,
        )),
        None => Box::new(HttpTelemetrySource::new(
            client,
            source.to_string(),
            slow_after,
        )),
    })
}

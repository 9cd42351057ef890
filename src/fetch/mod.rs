mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use bytes::Bytes;

use crate::errors::ProducerError;

/// GETs `url` and returns the body.
///
/// # Errors
///
/// [`ProducerError::FetchFailure`] on transport errors, timeouts and
/// non-success status codes.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Bytes, ProducerError> {
    let url = url
        .parse::<reqwest::Url>()
        .map_err(|e| ProducerError::FetchFailure(format!("invalid url {url:?}: {e}")))?;
    let req = reqwest::Request::new(reqwest::Method::GET, url);

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(ProducerError::FetchFailure(format!(
            "vendor returned status {status}"
        )));
    }

    Ok(resp.bytes().await?)
}

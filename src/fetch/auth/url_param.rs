use crate::fetch::client::HttpClient;
use async_trait::async_trait;

/// An [`HttpClient`] wrapper that appends an API key as a URL query parameter.
///
/// Syncromatics expects `api_key=<key>`; the key stays out of the configured
/// URL so it never lands in logs.
pub struct UrlParam<C> {
    pub inner: C,
    pub param_name: String,
    pub key: String,
}

impl<C> UrlParam<C> {
    pub fn api_key(inner: C, key: String) -> Self {
        Self {
            inner,
            param_name: "api_key".to_string(),
            key,
        }
    }

    fn authorize(&self, req: &mut reqwest::Request) {
        req.url_mut()
            .query_pairs_mut()
            .append_pair(&self.param_name, &self.key);
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for UrlParam<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.authorize(&mut req);
        self.inner.execute(req).await
    }
}

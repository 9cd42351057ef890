//! Credential wrappers around an [`HttpClient`](super::HttpClient).

mod url_param;

pub use url_param::UrlParam;

//! Remote byte sources.
//!
//! [`RemoteSource`] is the seam between the fetcher and the network. The
//! production implementation is [`HttpSource`]; tests substitute an
//! in-memory source so no test touches the network.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, PRAGMA};

use crate::descriptor::Fingerprint;
use crate::FetchError;

/// Something that can produce the bytes behind a locator.
pub trait RemoteSource: Send + Sync {
    /// Fetch the bytes at `locator`. `fingerprint` is the version the caller
    /// expects; sources may use it to defeat intermediate caches.
    fn fetch(&self, locator: &str, fingerprint: &Fingerprint) -> Result<Vec<u8>, FetchError>;
}

// ---------------------------------------------------------------------------
// HttpSource
// ---------------------------------------------------------------------------

/// Blocking HTTP(S) source rooted at a base URL.
///
/// Every request carries no-cache headers and a `v=<fingerprint>` query
/// parameter so CDN edges never serve a previous revision.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    base_url: String,
}

impl HttpSource {
    /// Build a source for `base_url` with a per-request `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let base_url = base_url.into();
        let mut headers = HeaderMap::new();
        headers.insert(
            CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        );
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| FetchError::Transport {
                locator: base_url.clone(),
                details: e.to_string(),
            })?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a locator. Absolute locators are used unchanged.
    pub fn url_for(&self, locator: &str) -> String {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            locator.to_owned()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                locator.trim_start_matches('/')
            )
        }
    }
}

impl RemoteSource for HttpSource {
    fn fetch(&self, locator: &str, fingerprint: &Fingerprint) -> Result<Vec<u8>, FetchError> {
        let url = self.url_for(locator);
        tracing::debug!(url = %url, fingerprint = %fingerprint, "http fetch");

        let transport = |e: reqwest::Error| FetchError::Transport {
            locator: locator.to_owned(),
            details: e.to_string(),
        };
        let response = self
            .client
            .get(&url)
            .query(&[("v", fingerprint.as_str())])
            .send()
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                locator: locator.to_owned(),
                status: status.as_u16(),
            });
        }
        let body = response.bytes().map_err(transport)?;
        Ok(body.to_vec())
    }
}

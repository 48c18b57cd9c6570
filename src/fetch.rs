//! Page-fetch collaborator: retrieves raw HTML for a target URL.

use reqwest::Client;
use url::Url;

use crate::config::FetchConfig;
use crate::types::SiftError;

/// HTTP client wrapper for retrieving page content.
///
/// Follows redirects and treats any non-success status as a fetch error.
/// Failures are surfaced to the caller unretried.
#[derive(Clone, Debug)]
pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, SiftError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .use_rustls_tls()
            .build()?;
        Ok(Self { client })
    }

    /// Fetches the document behind `url` and returns its body as text.
    pub async fn fetch(&self, url: &Url) -> Result<String, SiftError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        tracing::debug!(url = %url, bytes = body.len(), "fetched page");
        Ok(body)
    }
}

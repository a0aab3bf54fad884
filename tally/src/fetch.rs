use crate::ports::Fetcher;
use async_trait::async_trait;
use shared::{Error, Result};
use tracing::debug;

/// Fetches page bodies over HTTP(S)
#[derive(Clone, Debug, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    /// Body of `url` as text. Non-success statuses still return their body;
    /// only transport failures are errors.
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("GET {url}: {e}")))?;

        debug!("GET {} -> {}", url, response.status());

        response
            .text()
            .await
            .map_err(|e| Error::Fetch(format!("reading body of {url}: {e}")))
    }
}

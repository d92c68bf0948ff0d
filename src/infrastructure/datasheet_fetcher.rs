//! Datasheet document retrieval
//!
//! Datasheet URLs are static publisher endpoints; some manufacturer CDNs
//! serve certificate chains that fail strict validation. The fetch contract
//! is: one verified attempt, and on a certificate-validation failure
//! specifically, exactly one retry without verification. Any other failure
//! is final -- a second failure on a static URL indicates a genuine outage,
//! so no further retries.

use std::error::Error as _;
use std::time::Duration;

use async_trait::async_trait;
use anyhow::Result;
use reqwest::Client;
use tracing::{debug, warn};

use crate::domain::services::DatasheetSource;
use crate::infrastructure::config::HttpClientConfig;
use crate::infrastructure::sync_error::{SyncError, SyncResult};

pub struct DatasheetFetcher {
    verified: Client,
    unverified: Client,
}

impl DatasheetFetcher {
    pub fn new(config: &HttpClientConfig) -> SyncResult<Self> {
        let timeout = Duration::from_secs(config.datasheet_timeout_seconds);

        let verified = Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        let unverified = Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent.clone())
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self {
            verified,
            unverified,
        })
    }

    /// Retrieve the document bytes for a datasheet URL.
    pub async fn fetch_bytes(&self, url: &str) -> SyncResult<Vec<u8>> {
        match self.get(&self.verified, url).await {
            Ok(bytes) => Ok(bytes),
            Err(SyncError::Http(e)) if is_certificate_error(&e) => {
                warn!(url, "certificate validation failed, retrying once without verification");
                self.get(&self.unverified, url).await
            }
            Err(e) => Err(e),
        }
    }

    async fn get(&self, client: &Client, url: &str) -> SyncResult<Vec<u8>> {
        let response = client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(SyncError::fetch_failure(
                url,
                Some(status.as_u16()),
                "non-success response fetching datasheet",
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SyncError::fetch_failure(url, None, e.to_string()))?;

        debug!(url, bytes = bytes.len(), "datasheet downloaded");
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl DatasheetSource for DatasheetFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        Ok(self.fetch_bytes(url).await?)
    }
}

/// Walk the error source chain looking for a TLS certificate-validation
/// failure. Only this class of error triggers the unverified retry; plain
/// network errors must not.
fn is_certificate_error(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string().to_lowercase();
        if text.contains("certificate")
            || text.contains("unknown issuer")
            || text.contains("self signed")
        {
            return true;
        }
        source = cause.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> HttpClientConfig {
        HttpClientConfig {
            datasheet_timeout_seconds: 2,
            ..HttpClientConfig::default()
        }
    }

    #[test]
    fn fetcher_builds_from_default_config() {
        assert!(DatasheetFetcher::new(&test_config()).is_ok());
    }

    #[tokio::test]
    async fn unreachable_host_is_a_fetch_error_not_a_panic() {
        let fetcher = DatasheetFetcher::new(&test_config()).unwrap();
        // Port 9 on localhost is not listening; connect fails fast.
        let err = fetcher.fetch_bytes("http://127.0.0.1:9/spec.pdf").await.unwrap_err();
        match err {
            SyncError::Http(_) | SyncError::Fetch { .. } => {}
            other => panic!("unexpected error variant: {other:?}"),
        }
    }
}

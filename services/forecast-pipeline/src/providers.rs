//! Provider adapters: HTTP clients for the two upstream protocols spec `6`
//! describes, with the retry/backoff loop spec `4.4` fixes (per-attempt
//! timeout, bounded attempts, exponential backoff, retriable status
//! classes). `reqwest::Client::builder()` conventions (connection pool,
//! `tcp_nodelay`) are carried over from the prior downloader's
//! `DownloadManager::new`.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::config::{ProviderConfig, ProviderKind};

const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("http request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("non-retriable status {status} from {url}")]
    NonRetriable { status: StatusCode, url: String },

    #[error("exhausted {attempts} attempts against {provider}: {message}")]
    Exhausted {
        provider: String,
        attempts: u32,
        message: String,
    },
}

/// A thin, per-provider HTTP client plus the request-shaping logic for its
/// `ProviderKind`. Cheap to clone: `reqwest::Client` is an `Arc` handle.
#[derive(Clone)]
pub struct ProviderClient {
    pub config: ProviderConfig,
    client: Client,
}

impl ProviderClient {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()?;
        Ok(Self { config, client })
    }

    /// Build the GET URL for one download, per spec `6`'s two wire
    /// protocols. `object_path` is the provider-specific path fragment the
    /// caller (the fetcher) has already constructed for this
    /// `(model, run_time, product, forecast_hour)`; `filter_query` is only
    /// applied for `FilterCapable` providers.
    pub fn request_url(&self, object_path: &str, filter_query: Option<&str>) -> String {
        match self.config.kind {
            ProviderKind::FilterCapable => match filter_query {
                Some(q) => format!("{}?{}", self.config.base_url, q),
                None => format!("{}/{}", self.config.base_url, object_path),
            },
            ProviderKind::Mirror => format!("{}/{}", self.config.base_url, object_path),
        }
    }

    /// HEAD probe for availability without downloading (spec `4.4`/`6`).
    pub async fn probe(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(provider = %self.config.name, url, error = %e, "probe failed");
                false
            }
        }
    }

    /// GET with retry/backoff per spec `4.4`: up to `max_attempts`,
    /// exponential backoff starting at 1s capped at `BACKOFF_CAP`, retrying
    /// on 429/500/502/503/504 and connection/timeout errors, failing fast
    /// on other 4xx.
    pub async fn get_with_retry(&self, url: &str) -> Result<bytes::Bytes, ProviderError> {
        let mut delay = BACKOFF_BASE;
        let mut last_err = String::new();

        for attempt in 1..=self.config.max_attempts {
            match self.client.get(url).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp.bytes().await?);
                    }
                    if !is_retriable_status(status) {
                        return Err(ProviderError::NonRetriable {
                            status,
                            url: url.to_string(),
                        });
                    }
                    last_err = format!("status {status}");
                }
                Err(e) => {
                    if !e.is_timeout() && !e.is_connect() {
                        return Err(ProviderError::Request(e));
                    }
                    last_err = e.to_string();
                }
            }

            if attempt < self.config.max_attempts {
                warn!(
                    provider = %self.config.name,
                    url,
                    attempt,
                    delay_secs = delay.as_secs(),
                    "retrying after failed attempt"
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(BACKOFF_CAP);
            }
        }

        Err(ProviderError::Exhausted {
            provider: self.config.name.clone(),
            attempts: self.config.max_attempts,
            message: last_err,
        })
    }
}

fn is_retriable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter_provider() -> ProviderConfig {
        ProviderConfig {
            name: "nomads".to_string(),
            kind: ProviderKind::FilterCapable,
            base_url: "https://nomads.example/filter".to_string(),
            timeout_secs: 5,
            max_attempts: 3,
        }
    }

    fn mirror_provider() -> ProviderConfig {
        ProviderConfig {
            name: "mirror".to_string(),
            kind: ProviderKind::Mirror,
            base_url: "https://mirror.example".to_string(),
            timeout_secs: 5,
            max_attempts: 3,
        }
    }

    #[test]
    fn filter_capable_uses_query_string() {
        let client = ProviderClient::new(filter_provider()).unwrap();
        let url = client.request_url("global025.t06z.sfc.f000.grib2", Some("var=TMP&lev=2_m"));
        assert_eq!(url, "https://nomads.example/filter?var=TMP&lev=2_m");
    }

    #[test]
    fn mirror_uses_object_path() {
        let client = ProviderClient::new(mirror_provider()).unwrap();
        let url = client.request_url("global025.20260201/06/global025.t06z.sfc.f000.grib2", None);
        assert_eq!(
            url,
            "https://mirror.example/global025.20260201/06/global025.t06z.sfc.f000.grib2"
        );
    }

    #[test]
    fn retriable_status_classes_match_spec() {
        assert!(is_retriable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retriable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retriable_status(StatusCode::NOT_FOUND));
        assert!(!is_retriable_status(StatusCode::FORBIDDEN));
    }
}

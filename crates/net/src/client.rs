//! HTTP client with connection pooling and retry logic

use bytes::Bytes;
use rebuildr_errors::{Error, RegistryError};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

/// Network client configuration
#[derive(Debug, Clone)]
pub struct NetConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub pool_idle_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub retry_count: u32,
    pub retry_delay: Duration,
    pub user_agent: String,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300), // 5 minutes for large artifacts
            connect_timeout: Duration::from_secs(30),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 10,
            retry_count: 3,
            retry_delay: Duration::from_secs(1),
            user_agent: format!("rebuildr/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// HTTP client wrapper with retry logic
#[derive(Clone)]
pub struct NetClient {
    client: Client,
    config: NetConfig,
}

impl NetClient {
    /// Create a new network client
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to
    /// initialize.
    pub fn new(config: NetConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| RegistryError::ConnectionFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Create with default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_defaults() -> Result<Self, Error> {
        Self::new(NetConfig::default())
    }

    /// Execute a GET request with retries.
    ///
    /// 404 maps to `NotFound` errors at the call site via
    /// [`NetClient::expect_ok`]; server errors are retried here.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails after all retry attempts.
    pub async fn get(&self, url: &str) -> Result<Response, Error> {
        self.retry_request(|| self.client.get(url).send()).await
    }

    /// GET a URL and return its body, after status mapping.
    ///
    /// # Errors
    ///
    /// `NotFound` on 404, `Transient` on 5xx, `Malformed` if the body
    /// cannot be read.
    pub async fn get_bytes(&self, url: &str) -> Result<Bytes, Error> {
        let response = self.get(url).await?;
        let response = Self::expect_ok(response, url)?;
        response
            .bytes()
            .await
            .map_err(|e| RegistryError::Malformed {
                message: format!("reading body of {url}: {e}"),
            }
            .into())
    }

    /// Map a response status onto the registry error kinds.
    ///
    /// # Errors
    ///
    /// `NotFound` on 404, `Transient` on 5xx/429, `Malformed` on other
    /// non-success statuses.
    pub fn expect_ok(response: Response, url: &str) -> Result<Response, Error> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound {
                package: url.to_string(),
                version: None,
            }
            .into());
        }
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RegistryError::Transient {
                status: status.as_u16(),
                url: url.to_string(),
            }
            .into());
        }
        Err(RegistryError::Malformed {
            message: format!("unexpected HTTP {status} for {url}"),
        }
        .into())
    }

    /// Execute a request with retries
    async fn retry_request<F, Fut>(&self, mut f: F) -> Result<Response, Error>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<Response, reqwest::Error>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.retry_count {
            if attempt > 0 {
                tokio::time::sleep(self.config.retry_delay * attempt).await;
            }

            match f().await {
                Ok(response) => {
                    // Honor explicit backoff requests
                    if response.status() == StatusCode::TOO_MANY_REQUESTS {
                        if let Some(retry_after) = response
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok())
                        {
                            return Err(RegistryError::RateLimited {
                                seconds: retry_after,
                            }
                            .into());
                        }
                    }

                    return Ok(response);
                }
                Err(e) => {
                    let retryable = Self::should_retry(&e);
                    last_error = Some(e);
                    if !retryable {
                        break;
                    }
                }
            }
        }

        match last_error {
            Some(e) if e.is_timeout() => Err(RegistryError::Timeout {
                url: e
                    .url()
                    .map(std::string::ToString::to_string)
                    .unwrap_or_default(),
            }
            .into()),
            Some(e) if e.is_connect() => {
                Err(RegistryError::ConnectionFailed(e.to_string()).into())
            }
            Some(e) => Err(RegistryError::ConnectionFailed(e.to_string()).into()),
            None => Err(RegistryError::ConnectionFailed("unknown error".to_string()).into()),
        }
    }

    /// Determine if an error should be retried
    fn should_retry(error: &reqwest::Error) -> bool {
        error.is_timeout()
            || error.is_connect()
            || error.status().is_none_or(|s| s.is_server_error())
    }

    /// Get the underlying reqwest client for advanced usage
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use rebuildr_errors::ErrorKind;

    #[tokio::test]
    async fn status_mapping() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404);
        });
        server.mock(|when, then| {
            when.method(GET).path("/flaky");
            then.status(503);
        });

        let client = NetClient::new(NetConfig {
            retry_count: 0,
            ..NetConfig::default()
        })
        .unwrap();

        let err = client
            .get_bytes(&server.url("/missing"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = client.get_bytes(&server.url("/flaky")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
    }

    #[tokio::test]
    async fn body_round_trip() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/blob");
            then.status(200).body("payload");
        });

        let client = NetClient::with_defaults().unwrap();
        let body = client.get_bytes(&server.url("/blob")).await.unwrap();
        assert_eq!(&body[..], b"payload");
    }
}

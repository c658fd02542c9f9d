// src/session.rs
use crate::types::{CertFinderError, Config};
use governor::{Jitter, Quota};
use log::debug;
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Shared HTTP client plus the rate limiters for each outbound concern.
#[derive(Clone)]
pub struct Session {
    pub client: Client,
    rate_limiters: Arc<HashMap<String, Arc<governor::DefaultDirectRateLimiter>>>,
}

impl Session {
    pub fn new(config: &Config) -> Result<Self, CertFinderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .deflate(true)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| CertFinderError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        let mut rate_limiters = HashMap::new();
        for (concern, rate_limit) in &config.rate_limits {
            if let Some(limit) = rate_limit.and_then(NonZeroU32::new) {
                let quota = Quota::per_second(limit).allow_burst(NonZeroU32::MIN);
                rate_limiters.insert(concern.clone(), Arc::new(governor::RateLimiter::direct(quota)));
            }
        }

        Ok(Session {
            client,
            rate_limiters: Arc::new(rate_limiters),
        })
    }

    /// Single GET; timeouts, transport failures and non-200 answers are
    /// reported as distinct errors.
    pub async fn get(&self, url: &str) -> Result<reqwest::Response, CertFinderError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        expect_ok(response)
    }

    pub async fn get_with_timeout(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<reqwest::Response, CertFinderError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        expect_ok(response)
    }

    pub async fn get_json<T>(&self, url: &str) -> Result<T, CertFinderError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self.get(url).await?;

        response
            .json::<T>()
            .await
            .map_err(|e| CertFinderError::ParseError(e.to_string()))
    }

    pub async fn wait_for_rate_limit(&self, concern: &str) {
        if let Some(limiter) = self.rate_limiters.get(concern) {
            limiter.until_ready_with_jitter(Jitter::up_to(Duration::from_millis(50))).await;
        }
    }
}

fn expect_ok(response: reqwest::Response) -> Result<reqwest::Response, CertFinderError> {
    if response.status() != StatusCode::OK {
        debug!("{} answered {}", response.url(), response.status());
        return Err(CertFinderError::UnexpectedStatus(response.status().as_u16()));
    }
    Ok(response)
}

pub(crate) fn transport_error(url: &str, e: reqwest::Error) -> CertFinderError {
    if e.is_timeout() {
        CertFinderError::TimeoutError(url.to_string())
    } else {
        CertFinderError::NetworkError(format!("{}: {}", url, e))
    }
}

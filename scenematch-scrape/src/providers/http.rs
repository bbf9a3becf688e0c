//! Throttled HTTP access shared by all providers
//!
//! Every request sleeps a fixed delay first and is bounded by a connect
//! and a total timeout. Status >= 400 and undecodable bodies are errors.

use crate::error::ProviderError;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

const USER_AGENT: &str = concat!("scenematch/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct ProviderHttp {
    client: reqwest::Client,
    delay: Duration,
}

impl ProviderHttp {
    pub fn new(delay_ms: u64, connect_timeout_secs: u64, read_timeout_secs: u64) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(connect_timeout_secs + read_timeout_secs))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            client,
            delay: Duration::from_millis(delay_ms),
        })
    }

    async fn throttle(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    /// GET with query parameters and decode JSON
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        headers: HeaderMap,
    ) -> Result<T, ProviderError> {
        let body = self.get_text(url, query, headers).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// GET the raw body
    pub async fn get_text(
        &self,
        url: &str,
        query: &[(&str, &str)],
        headers: HeaderMap,
    ) -> Result<String, ProviderError> {
        self.throttle().await;
        tracing::debug!(url = %url, ?query, "Provider GET");
        let response = self.client.get(url).query(query).headers(headers).send().await?;
        Self::checked_body(response).await
    }

    /// POST a JSON body and decode the JSON reply
    pub async fn post_json<B, T>(&self, url: &str, headers: HeaderMap, body: &B) -> Result<T, ProviderError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.throttle().await;
        tracing::debug!(url = %url, "Provider POST");
        let response = self.client.post(url).headers(headers).json(body).send().await?;
        let text = Self::checked_body(response).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// GET binary content (images). Not throttled: image hosts are not the provider API.
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(ProviderError::Http(status.as_u16(), url.to_string()));
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn checked_body(response: reqwest::Response) -> Result<String, ProviderError> {
        let status = response.status();
        if status.as_u16() >= 400 {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http(status.as_u16(), error_text));
        }
        Ok(response.text().await?)
    }
}

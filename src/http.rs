use crate::config::RetryPolicy;
use crate::{CatalogError, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::warn;

/// HTTP client for one upstream API.
///
/// Both the catalog client and the video-search client are thin
/// configurations of this type: it owns the identifying user-agent header
/// and the retry/backoff loop, and leaves schema validation to its callers
/// (response bodies are deserialized into whatever raw type the caller asks
/// for, nothing more).
///
/// Retry rules: HTTP 429 and transport-level failures back off exponentially
/// (`base × 2^attempt`) for up to `max_attempts` total tries; any other
/// non-2xx status fails immediately with the status and body as detail.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl UpstreamClient {
    pub fn new(base_url: impl Into<String>, user_agent: &str, retry: RetryPolicy) -> Self {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.into(),
            retry,
        }
    }

    /// Build full URL from endpoint
    #[must_use]
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Execute GET request and parse JSON response
    pub async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let url = self.url(endpoint);
        let response = self
            .execute_with_retry(&url, || self.client.get(&url))
            .await?;
        Self::parse_json(response).await
    }

    /// Execute GET request with query parameters
    pub async fn get_json_with_params<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let url = self.url(endpoint);
        let response = self
            .execute_with_retry(&url, || self.client.get(&url).query(params))
            .await?;
        Self::parse_json(response).await
    }

    /// Execute POST request with a JSON body
    pub async fn post_json<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.url(endpoint);
        let response = self
            .execute_with_retry(&url, || {
                self.client
                    .post(&url)
                    .header("Content-Type", "application/json")
                    .header("Accept", "application/json")
                    .json(body)
            })
            .await?;
        Self::parse_json(response).await
    }

    /// Run the request through the retry loop, returning the first
    /// successful response or the terminal error.
    async fn execute_with_retry(
        &self,
        url: &str,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<Response> {
        let mut last_error = CatalogError::Parse("no attempt made".to_string());

        for attempt in 1..=self.retry.max_attempts {
            match build().send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response);
                    }

                    if status.as_u16() == 429 {
                        warn!(
                            "429 Too Many Requests for {url}, attempt {attempt}/{}",
                            self.retry.max_attempts
                        );
                        last_error = CatalogError::Api {
                            status: 429,
                            message: "Too Many Requests".to_string(),
                        };
                    } else {
                        // Anything else non-2xx is not worth retrying
                        let message = response.text().await.unwrap_or_default();
                        return Err(CatalogError::Api {
                            status: status.as_u16(),
                            message,
                        });
                    }
                }
                Err(e) => {
                    warn!(
                        "Network error for {url}, attempt {attempt}/{}: {e}",
                        self.retry.max_attempts
                    );
                    last_error = CatalogError::Network(e);
                }
            }

            if attempt < self.retry.max_attempts {
                tokio::time::sleep(self.retry.delay_after(attempt)).await;
            }
        }

        Err(CatalogError::UpstreamUnavailable {
            url: url.to_string(),
            source: Box::new(last_error),
        })
    }

    async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| CatalogError::Parse(format!("JSON parse error: {e}")))
    }
}

use std::time::Duration;

use reqwest::Client;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::{AppError, AppResult, SourceError, SourceResult};
use crate::utils::url::UrlUtils;

/// Shared reqwest wrapper for the dialect clients and the proxy.
///
/// Only a connect timeout is configured on the client itself. Every metadata
/// call passes its own bound, and media fetches bound only the time to
/// response headers so long transfers are never cut off.
#[derive(Clone, Debug)]
pub struct StandardHttpClient {
    client: Client,
}

impl StandardHttpClient {
    /// Create new HTTP client with only connection timeout (no total request timeout)
    pub fn with_connection_timeout(connect_timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Get underlying reqwest client for streaming requests
    pub fn inner_client(&self) -> &Client {
        &self.client
    }

    /// GET a URL and return the body as text.
    ///
    /// Non-2xx answers become `SourceError::Http`; every URL in an error is
    /// obfuscated.
    pub async fn get_text(
        &self,
        url: &str,
        query: &[(&str, &str)],
        headers: HeaderMap,
        timeout: Duration,
    ) -> SourceResult<String> {
        debug!(
            "Fetching text content from: {}",
            UrlUtils::obfuscate_credentials(url)
        );

        let response = self
            .client
            .get(url)
            .query(query)
            .headers(headers)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| SourceError::from_transport(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
                message: format!(
                    "{} - URL: {}",
                    status.canonical_reason().unwrap_or("Unknown"),
                    UrlUtils::obfuscate_credentials(url)
                ),
            });
        }

        let content = response
            .text()
            .await
            .map_err(|e| SourceError::from_transport(url, &e))?;

        debug!("Fetched {} characters of text content", content.len());
        Ok(content)
    }

    /// GET a URL and deserialize the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        headers: HeaderMap,
        timeout: Duration,
    ) -> SourceResult<T> {
        let text = self.get_text(url, query, headers, timeout).await?;
        serde_json::from_str(&text).map_err(|e| {
            SourceError::parse(
                "json",
                format!(
                    "Failed to parse JSON from {}: {e}",
                    UrlUtils::obfuscate_credentials(url)
                ),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, http::StatusCode, routing::get};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn maps_error_status_to_http_source_error() {
        let base = serve(
            Router::new()
                .route("/ok", get(|| async { r#"{"value":1}"# }))
                .route("/gone", get(|| async { StatusCode::NOT_FOUND })),
        )
        .await;
        let client = StandardHttpClient::with_connection_timeout(Duration::from_secs(2)).unwrap();

        let value: serde_json::Value = client
            .get_json(&format!("{base}/ok"), &[], HeaderMap::new(), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(value["value"], 1);

        let err = client
            .get_text(
                &format!("{base}/gone"),
                &[("password", "secret")],
                HeaderMap::new(),
                Duration::from_secs(2),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Http { status: 404, .. }));
        assert!(!err.to_string().contains("secret"));
    }
}

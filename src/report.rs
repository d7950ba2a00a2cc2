use std::future::Future;

use reqwest::header::CONTENT_TYPE;
use url::Url;

use crate::types::ReportPayload;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Failures while building or delivering a single report. None of these are
/// ever retried; callers log them and move on.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("invalid endpoint URL {endpoint:?}: {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// A fully built request, ready to hand to a [`Transport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundReport {
    pub url: Url,
    pub api_key: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportResponse {
    pub status: u16,
    pub body: String,
}

/// Sends a built report somewhere. The real implementation is [`HttpTransport`].
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        report: OutboundReport,
    ) -> impl Future<Output = Result<ReportResponse, ReportError>> + Send;
}

/// POSTs reports with a shared, pooled reqwest client. No timeout is set, so
/// the client's defaults apply.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn send(
        &self,
        report: OutboundReport,
    ) -> impl Future<Output = Result<ReportResponse, ReportError>> + Send {
        let request = self
            .client
            .post(report.url)
            .header(CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, report.api_key)
            .body(report.body);

        async move {
            let response = request.send().await?;
            let status = response.status().as_u16();
            // The status is already known; a broken body must not hide it
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    log::warn!("Failed to read API response body (status {}): {}", status, e);
                    String::new()
                }
            };
            Ok(ReportResponse { status, body })
        }
    }
}

/// Builds and delivers reports to the configured endpoint
pub struct ReportClient<T> {
    endpoint: String,
    api_key: String,
    transport: T,
}

impl<T: Transport> ReportClient<T> {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, transport: T) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            transport,
        }
    }

    /// Resolve the endpoint and serialize the body
    pub fn build(&self, payload: &ReportPayload) -> Result<OutboundReport, ReportError> {
        let url = Url::parse(&self.endpoint).map_err(|source| ReportError::InvalidEndpoint {
            endpoint: self.endpoint.clone(),
            source,
        })?;
        let body = serde_json::to_vec(payload)?;

        Ok(OutboundReport {
            url,
            api_key: self.api_key.clone(),
            body,
        })
    }

    /// Send once and hand the outcome back to the caller
    pub async fn send_and_wait(&self, payload: &ReportPayload) -> Result<ReportResponse, ReportError> {
        let report = self.build(payload)?;
        log::info!("Sending payload: {:?}", payload);
        self.transport.send(report).await
    }

    /// Best-effort delivery: every outcome is logged, nothing is returned
    pub async fn deliver(&self, payload: ReportPayload) {
        match self.send_and_wait(&payload).await {
            Ok(response) => {
                log::info!("API response status: {}", response.status);
                if !response.body.is_empty() {
                    log::info!("API response body: {}", response.body);
                }
            }
            Err(e @ (ReportError::InvalidEndpoint { .. } | ReportError::Serialize(_))) => {
                log::error!("Dropping report for {:?}: {}", payload.song, e);
            }
            Err(e) => {
                log::error!("Error sending report to API: {}", e);
            }
        }
    }
}

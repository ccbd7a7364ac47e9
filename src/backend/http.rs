//! HTTP+JSON implementation of [`SigningBackend`].

use super::auth::{bearer_token, TokenStore};
use super::SigningBackend;
use crate::config::SessionConfig;
use crate::error::{ServerErrorKind, SignError};
use crate::model::{CompletionRequest, CompletionResponse, DocumentEnvelope, DocumentRecord};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Talks to the signing API with a bearer credential from a token store.
///
/// Document fetches carry their own timeout (`fetch_timeout_secs`). The
/// completion request has none here: the session bounds it with the
/// submission deadline and cancels it on expiry.
pub struct HttpBackend {
    client: reqwest::Client,
    api_base_url: String,
    fetch_timeout_secs: u64,
    tokens: Arc<dyn TokenStore>,
}

impl HttpBackend {
    pub fn new(config: &SessionConfig, tokens: Arc<dyn TokenStore>) -> Result<Self, SignError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("docsign/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SignError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            fetch_timeout_secs: config.fetch_timeout_secs,
            tokens,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl SigningBackend for HttpBackend {
    async fn fetch_document(&self, doc_id: &str) -> Result<DocumentRecord, SignError> {
        let token = bearer_token(self.tokens.as_ref())?;
        let url = self.url(&format!("docs/{doc_id}"));
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .timeout(Duration::from_secs(self.fetch_timeout_secs))
            .send()
            .await
            .map_err(|e| transport_error(e, self.fetch_timeout_secs))?;

        if !response.status().is_success() {
            return Err(server_error(response).await);
        }

        let envelope: DocumentEnvelope = response.json().await.map_err(|e| {
            SignError::InvalidDocument {
                detail: e.to_string(),
            }
        })?;
        Ok(envelope.doc)
    }

    async fn complete(
        &self,
        doc_id: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, SignError> {
        let token = bearer_token(self.tokens.as_ref())?;
        let url = self.url(&format!("docs/{doc_id}/complete"));
        info!("PUT {} ({} signatures)", url, request.signatures.len());

        let response = self
            .client
            .put(&url)
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(e, 0))?;

        if !response.status().is_success() {
            return Err(server_error(response).await);
        }

        response
            .json::<CompletionResponse>()
            .await
            .map_err(|e| SignError::InvalidDocument {
                detail: e.to_string(),
            })
    }
}

// ── Error mapping ────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn transport_error(e: reqwest::Error, timeout_secs: u64) -> SignError {
    if e.is_timeout() {
        SignError::Timeout { secs: timeout_secs }
    } else {
        SignError::Network {
            reason: e.to_string(),
        }
    }
}

async fn server_error(response: reqwest::Response) -> SignError {
    let status = response.status().as_u16();
    let kind = ServerErrorKind::from_status(status);
    let body = response.text().await.unwrap_or_default();
    let message = server_message(&body).unwrap_or_else(|| kind.default_message().to_string());
    warn!("Backend returned HTTP {}: {}", status, message);
    SignError::Server {
        status,
        kind,
        message,
    }
}

/// Message from a structured error body, if there is one.
fn server_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .message
        .or(parsed.error)
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
}

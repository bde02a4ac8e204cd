//! Webhook delivery with exponential-backoff retry.
//!
//! [`WebhookDelivery`] POSTs a rendered workflow notification to an external
//! URL. Failed attempts are retried up to three times with exponential
//! backoff (1 s, 2 s, 4 s) before the error is surfaced to the caller.

use std::collections::HashMap;
use std::time::Duration;

use super::Attachment;

/// Retry delays in seconds (exponential backoff: 1s, 2s, 4s).
const RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 4];

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for webhook delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// WebhookRequest
// ---------------------------------------------------------------------------

/// Payload shape for a webhook POST.
#[derive(Debug, Clone)]
pub enum WebhookPayload {
    /// Key/value pairs sent as form data (or multipart text parts when an
    /// attachment is present).
    Form(HashMap<String, String>),
    /// A raw request body.
    Raw(String),
}

/// A rendered webhook notification ready for transport.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub url: String,
    pub payload: WebhookPayload,
    pub headers: Vec<(String, String)>,
    pub attachment: Option<Attachment>,
}

// ---------------------------------------------------------------------------
// WebhookDelivery
// ---------------------------------------------------------------------------

/// Delivers workflow notifications to external webhook endpoints.
pub struct WebhookDelivery {
    client: reqwest::Client,
}

impl WebhookDelivery {
    /// Create a new delivery service with a pre-configured HTTP client.
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { client }
    }

    /// Deliver a rendered webhook request with retry.
    ///
    /// Retries up to 3 times with exponential backoff before giving up.
    /// Returns `Ok(())` on the first successful attempt.
    pub async fn deliver(&self, request: &WebhookRequest) -> Result<(), WebhookError> {
        let mut last_err: Option<WebhookError> = None;

        for (attempt, delay_secs) in RETRY_DELAYS_SECS.iter().enumerate() {
            match self.try_send(request).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        url = %request.url,
                        error = %e,
                        "Webhook delivery attempt failed, retrying"
                    );
                    last_err = Some(e);
                    tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
                }
            }
        }

        // Final attempt after the last backoff.
        match self.try_send(request).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(url = %request.url, error = %e, "Webhook delivery failed after all retries");
                Err(last_err.unwrap_or(e))
            }
        }
    }

    /// Execute a single POST request and check the response status.
    async fn try_send(&self, request: &WebhookRequest) -> Result<(), WebhookError> {
        let mut builder = self.client.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        builder = match (&request.payload, &request.attachment) {
            (WebhookPayload::Form(fields), None) => builder.form(fields),
            (WebhookPayload::Raw(body), None) => builder.body(body.clone()),
            (payload, Some(attachment)) => {
                let mut form = reqwest::multipart::Form::new().part(
                    "file",
                    reqwest::multipart::Part::bytes(attachment.content.clone())
                        .file_name(attachment.filename.clone()),
                );
                match payload {
                    WebhookPayload::Form(fields) => {
                        for (key, value) in fields {
                            form = form.text(key.clone(), value.clone());
                        }
                    }
                    WebhookPayload::Raw(body) => {
                        form = form.text("payload", body.clone());
                    }
                }
                builder.multipart(form)
            }
        };

        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(WebhookError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

impl Default for WebhookDelivery {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

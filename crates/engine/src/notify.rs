//! Render notification actions into transport-ready requests.
//!
//! Subject/body, URL, and form parameter values are `{placeholder}`
//! templates evaluated against the document context; webhook `params` and
//! `headers` are stored as JSON object text and parsed here. Every failure
//! in this module is a recoverable template error: the affected action is
//! skipped and logged, siblings still run.

use std::collections::HashMap;

use docuflow_core::document::DocumentSnapshot;
use docuflow_core::error::CoreError;
use docuflow_core::template;
use docuflow_core::workflow::{EmailActionConfig, WebhookActionConfig};

use crate::delivery::email::EmailMessage;
use crate::delivery::webhook::{WebhookPayload, WebhookRequest};
use crate::delivery::Attachment;

/// Parse a JSON object of string values, as stored in webhook `params` /
/// `headers` columns.
fn parse_string_map(label: &str, text: &str) -> Result<HashMap<String, String>, CoreError> {
    serde_json::from_str(text)
        .map_err(|e| CoreError::Template(format!("Malformed webhook {label} JSON: {e}")))
}

/// Render an email action against a document snapshot.
pub fn render_email(
    config: &EmailActionConfig,
    snapshot: &DocumentSnapshot,
    attachment: Option<Attachment>,
) -> Result<EmailMessage, CoreError> {
    let to: Vec<String> = config
        .to
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if to.is_empty() {
        return Err(CoreError::Template(
            "Email action has no recipients".to_string(),
        ));
    }

    Ok(EmailMessage {
        to,
        subject: template::render(&config.subject, snapshot)?,
        body: template::render(&config.body, snapshot)?,
        attachment,
    })
}

/// Render a webhook action against a document snapshot.
pub fn render_webhook(
    config: &WebhookActionConfig,
    snapshot: &DocumentSnapshot,
    attachment: Option<Attachment>,
) -> Result<WebhookRequest, CoreError> {
    let url = template::render(&config.url, snapshot)?;

    let payload = if config.use_params {
        let mut fields = HashMap::new();
        if let Some(params) = config.params.as_deref() {
            for (key, value_template) in parse_string_map("params", params)? {
                fields.insert(key, template::render(&value_template, snapshot)?);
            }
        }
        WebhookPayload::Form(fields)
    } else {
        let body = config.body.as_deref().unwrap_or_default();
        WebhookPayload::Raw(template::render(body, snapshot)?)
    };

    let headers = match config.headers.as_deref() {
        Some(text) => parse_string_map("headers", text)?.into_iter().collect(),
        None => Vec::new(),
    };

    Ok(WebhookRequest {
        url,
        payload,
        headers,
        attachment,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! `http:` and `https:` references.

use std::time::Duration;

use async_trait::async_trait;
use ureq::Agent;

use super::ProtocolHandler;
use crate::ast::{Reference, ReferenceValue};
use crate::context::ProcessingContext;
use crate::error::ProtocolError;

/// Default HTTP timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// HTTP client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpOptions {
    pub timeout: Duration,
    /// Skip TLS certificate verification.
    pub insecure_tls: bool,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            insecure_tls: false,
        }
    }
}

/// Fetches remote resources with a blocking `ureq` agent.
///
/// Responses with a JSON content type, or from a path ending in `.json`,
/// are parsed. Status codes of 400 and above are failures.
pub struct HttpProtocolHandler {
    agent: Agent,
}

impl HttpProtocolHandler {
    pub fn new(options: &HttpOptions) -> Self {
        Self {
            agent: create_agent(options),
        }
    }
}

impl Default for HttpProtocolHandler {
    fn default() -> Self {
        Self::new(&HttpOptions::default())
    }
}

fn create_agent(options: &HttpOptions) -> Agent {
    let mut builder = Agent::config_builder()
        .timeout_global(Some(options.timeout))
        .http_status_as_error(false);
    if options.insecure_tls {
        builder = builder.tls_config(
            ureq::tls::TlsConfig::builder()
                .disable_verification(true)
                .build(),
        );
    }
    builder.build().into()
}

/// Reassemble the URL the parser split into protocol and path.
fn url_for(reference: &Reference) -> String {
    format!("{}:{}", reference.protocol, reference.path)
}

fn wants_json(url: &str, content_type: Option<&str>) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("json"))
        || path.to_ascii_lowercase().ends_with(".json")
}

#[async_trait]
impl ProtocolHandler for HttpProtocolHandler {
    fn name(&self) -> &str {
        "http"
    }

    fn can_handle(&self, protocol: &str) -> bool {
        matches!(protocol, "http" | "https")
    }

    async fn handle(
        &self,
        reference: &Reference,
        _ctx: &ProcessingContext,
    ) -> Result<ReferenceValue, ProtocolError> {
        let url = url_for(reference);

        let response = self.agent.get(&url).call().map_err(|e| ProtocolError::Http {
            url: url.clone(),
            message: e.to_string(),
        })?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(ProtocolError::HttpStatus { url, status });
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let text = response
            .into_body()
            .read_to_string()
            .map_err(|e| ProtocolError::Http {
                url: url.clone(),
                message: e.to_string(),
            })?;

        if wants_json(&url, content_type.as_deref()) {
            let value = serde_json::from_str(&text)
                .map_err(|source| ProtocolError::Json { path: url, source })?;
            Ok(ReferenceValue::Json(value))
        } else {
            Ok(ReferenceValue::Text(text))
        }
    }
}

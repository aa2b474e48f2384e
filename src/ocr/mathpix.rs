use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::types::{OcrEngine, OcrSource, OcrText};
use super::OcrError;

const DEFAULT_ENDPOINT: &str = "https://api.mathpix.com/v3/text";

/// Fixed network timeout for a single OCR call.
pub const OCR_TIMEOUT_SECS: u64 = 30;

/// Mathpix `v3/text` HTTP client. One attempt per call, no retry.
pub struct MathpixClient {
    app_id: String,
    app_key: String,
    endpoint: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl MathpixClient {
    pub fn new(app_id: &str, app_key: &str) -> Result<Self, OcrError> {
        Self::with_endpoint(app_id, app_key, DEFAULT_ENDPOINT)
    }

    /// Point the client at a different endpoint (local stand-ins).
    pub fn with_endpoint(app_id: &str, app_key: &str, endpoint: &str) -> Result<Self, OcrError> {
        Self::with_timeout(app_id, app_key, endpoint, OCR_TIMEOUT_SECS)
    }

    pub fn with_timeout(
        app_id: &str,
        app_key: &str,
        endpoint: &str,
        timeout_secs: u64,
    ) -> Result<Self, OcrError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| OcrError::Transport(e.to_string()))?;

        Ok(Self {
            app_id: app_id.trim().to_string(),
            app_key: app_key.trim().to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        })
    }
}

/// Request body for Mathpix /v3/text
#[derive(Serialize)]
struct TextRequest<'a> {
    src: String,
    formats: [&'a str; 2],
    data_options: DataOptions,
}

#[derive(Serialize)]
struct DataOptions {
    include_asciimath: bool,
    include_latex: bool,
}

/// Response body from Mathpix /v3/text (errors may arrive with status 200).
#[derive(Deserialize)]
struct TextResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    latex_styled: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error: Option<String>,
}

impl OcrEngine for MathpixClient {
    fn is_configured(&self) -> bool {
        !self.app_id.is_empty() && !self.app_key.is_empty()
    }

    fn extract(&self, source: &OcrSource) -> Result<OcrText, OcrError> {
        if !self.is_configured() {
            return Err(OcrError::MissingCredentials);
        }

        let src = match source {
            OcrSource::Bytes { data, mime } => {
                format!("data:{mime};base64,{}", STANDARD.encode(data))
            }
            OcrSource::Url(url) => url.clone(),
        };
        let body = TextRequest {
            src,
            formats: ["text", "latex_styled"],
            data_options: DataOptions {
                include_asciimath: true,
                include_latex: true,
            },
        };

        tracing::debug!(endpoint = %self.endpoint, "Submitting image to OCR provider");
        let response = self
            .client
            .post(&self.endpoint)
            .header("app_id", &self.app_id)
            .header("app_key", &self.app_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    OcrError::Timeout(self.timeout_secs)
                } else {
                    OcrError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&raw)
                .ok()
                .and_then(|e| e.error)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            tracing::warn!(status = status.as_u16(), "OCR provider returned an error");
            return Err(OcrError::Api(message));
        }

        let parsed: TextResponse = response
            .json()
            .map_err(|e| OcrError::Parse(e.to_string()))?;
        if let Some(message) = parsed.error {
            return Err(OcrError::Api(message));
        }

        let text = parsed.text.unwrap_or_default();
        let markdown = match parsed.latex_styled.as_deref() {
            Some(latex) if !latex.trim().is_empty() => wrap_latex(latex),
            _ => text,
        };

        Ok(OcrText {
            text: markdown,
            confidence: parsed.confidence,
        })
    }
}

/// Wrap provider LaTeX as markdown math: display when it carries `\[`/`\]`,
/// inline otherwise.
pub fn wrap_latex(latex: &str) -> String {
    if latex.contains("\\[") || latex.contains("\\]") {
        format!("$$\n{latex}\n$$")
    } else {
        format!("${latex}$")
    }
}

use serde::{Deserialize, Serialize};

use super::OcrError;

/// What the provider is asked to read.
#[derive(Debug, Clone)]
pub enum OcrSource {
    /// Raw image bytes, sent inline as a base64 data URI.
    Bytes { data: Vec<u8>, mime: String },
    /// Publicly reachable image URL, passed through as-is.
    Url(String),
}

/// Successful extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrText {
    /// Markdown with `$...$` / `$$...$$` math.
    pub text: String,
    pub confidence: Option<f64>,
}

/// Wire shape returned by the extract endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OcrOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl From<Result<OcrText, OcrError>> for OcrOutcome {
    fn from(result: Result<OcrText, OcrError>) -> Self {
        match result {
            Ok(ocr) => Self {
                success: true,
                text: Some(ocr.text),
                error: None,
                confidence: ocr.confidence,
            },
            Err(e) => Self {
                success: false,
                text: None,
                error: Some(e.to_string()),
                confidence: None,
            },
        }
    }
}

/// OCR provider abstraction (allows mocking).
///
/// Calls are blocking; async callers go through `spawn_blocking`.
pub trait OcrEngine: Send + Sync {
    /// Whether credentials are present. Unconfigured engines fail fast.
    fn is_configured(&self) -> bool;

    fn extract(&self, source: &OcrSource) -> Result<OcrText, OcrError>;
}

/// Mock OCR engine for testing: returns a configurable response.
pub struct MockOcrEngine {
    response: Result<String, String>,
}

impl MockOcrEngine {
    pub fn new(text: &str) -> Self {
        Self {
            response: Ok(text.to_string()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
        }
    }
}

impl OcrEngine for MockOcrEngine {
    fn is_configured(&self) -> bool {
        true
    }

    fn extract(&self, _source: &OcrSource) -> Result<OcrText, OcrError> {
        match &self.response {
            Ok(text) => Ok(OcrText {
                text: text.clone(),
                confidence: Some(0.99),
            }),
            Err(message) => Err(OcrError::Api(message.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_from_success() {
        let outcome = OcrOutcome::from(Ok(OcrText {
            text: "$x$".into(),
            confidence: Some(0.5),
        }));
        assert!(outcome.success);
        assert_eq!(outcome.text.as_deref(), Some("$x$"));
        assert!(outcome.error.is_none());
    }

    #[test]
    fn outcome_from_error_hides_text() {
        let outcome = OcrOutcome::from(Err(OcrError::Timeout(30)));
        assert!(!outcome.success);
        assert!(outcome.text.is_none());
        assert!(outcome.error.unwrap().contains("timed out"));
    }

    #[test]
    fn outcome_serializes_without_empty_fields() {
        let outcome = OcrOutcome::from(Err(OcrError::MissingCredentials));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("text").is_none());
        assert!(json.get("confidence").is_none());
    }

    #[test]
    fn mock_engine_returns_configured_response() {
        let source = OcrSource::Url("https://example.com/a.png".into());
        let ok = MockOcrEngine::new("hello").extract(&source).unwrap();
        assert_eq!(ok.text, "hello");
        let err = MockOcrEngine::failing("quota").extract(&source).unwrap_err();
        assert_eq!(err.to_string(), "API error: quota");
    }
}

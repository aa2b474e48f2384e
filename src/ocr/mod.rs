//! Text extraction from problem images through an external OCR provider.

pub mod mathpix;
pub mod types;

pub use mathpix::MathpixClient;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("OCR credentials are not configured")]
    MissingCredentials,

    #[error("OCR request timed out after {0}s")]
    Timeout(u64),

    #[error("API error: {0}")]
    Api(String),

    #[error("OCR transport error: {0}")]
    Transport(String),

    #[error("Image not found: {0}")]
    ImageNotFound(String),

    #[error("Unreadable OCR response: {0}")]
    Parse(String),
}

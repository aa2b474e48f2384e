//! Image storage: problem/answer images behind an opaque reference.
//!
//! `LocalImageStore` keeps files under `<data_dir>/uploads`;
//! `CloudinaryStore` pushes them to the image host. Both accept legacy
//! references that are already absolute `http(s)` URLs.

pub mod cloudinary;
pub mod local;

use std::sync::Arc;
use std::time::Duration;

pub use cloudinary::CloudinaryStore;
pub use local::LocalImageStore;

use thiserror::Error;

use crate::config::{AppConfig, ALLOWED_EXTENSIONS, STORAGE_ROOT};

/// Timeout for fetching remote images during export and OCR.
pub const REMOTE_FETCH_TIMEOUT_SECS: u64 = 10;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File type not allowed: {0}")]
    InvalidExtension(String),

    #[error("File too large: {size} bytes (limit {limit})")]
    TooLarge { size: usize, limit: usize },

    #[error("File content is not a supported image")]
    UnsupportedContent,

    #[error("Invalid image reference: {0}")]
    InvalidReference(String),

    #[error("Image not found: {0}")]
    NotFound(String),

    #[error("Image host configuration invalid: {0}")]
    Config(String),

    #[error("Image upload failed: {0}")]
    Upload(String),

    #[error("Image fetch failed: {0}")]
    Fetch(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage backend for uploaded images. Blocking; async callers go through
/// `spawn_blocking`.
pub trait ImageStore: Send + Sync {
    /// Store bytes under `public_id` and return the reference to persist.
    fn upload(&self, data: &[u8], public_id: &str, extension: &str)
        -> Result<String, StorageError>;

    /// Load the bytes behind a reference.
    fn fetch(&self, reference: &str) -> Result<Vec<u8>, StorageError>;

    /// Renderable URL for a reference.
    fn url_for(&self, reference: &str) -> String;

    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;
}

/// Pick the backend from configuration: image host when `CLOUDINARY_URL`
/// is set, local folder otherwise.
pub fn build_store(config: &AppConfig) -> Result<Arc<dyn ImageStore>, StorageError> {
    if config.cloudinary_url.is_empty() {
        tracing::info!(root = %config.uploads_dir().display(), "Using local image storage");
        Ok(Arc::new(LocalImageStore::new(config.uploads_dir())))
    } else {
        let store = CloudinaryStore::from_url(&config.cloudinary_url)?;
        tracing::info!(cloud = store.cloud_name(), "Using Cloudinary image storage");
        Ok(Arc::new(store))
    }
}

// ═══════════════════════════════════════════════════════════
// Upload validation
// ═══════════════════════════════════════════════════════════

/// Validated upload: lowercase extension plus sanitized stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadName {
    pub stem: String,
    pub extension: String,
}

/// Check extension, size and magic bytes of an uploaded image.
pub fn validate_upload(
    filename: &str,
    data: &[u8],
    limit: usize,
) -> Result<UploadName, StorageError> {
    let (stem, extension) = match filename.rsplit_once('.') {
        Some((stem, ext)) => (stem, ext.to_ascii_lowercase()),
        None => return Err(StorageError::InvalidExtension(String::new())),
    };
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(StorageError::InvalidExtension(extension));
    }
    if data.len() > limit {
        return Err(StorageError::TooLarge {
            size: data.len(),
            limit,
        });
    }
    if detect_image_mime(data).is_none() {
        return Err(StorageError::UnsupportedContent);
    }
    Ok(UploadName {
        stem: sanitize_stem(stem),
        extension,
    })
}

/// Detect an image MIME type from magic bytes.
pub fn detect_image_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 4 {
        return None;
    }
    // JPEG: FF D8 FF
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    // PNG: 89 50 4E 47
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        return Some("image/png");
    }
    // WebP: RIFF....WEBP
    if bytes.len() >= 12 && bytes[..4] == *b"RIFF" && bytes[8..12] == *b"WEBP" {
        return Some("image/webp");
    }
    None
}

/// Reduce a filename stem to ASCII id-safe characters.
pub fn sanitize_stem(stem: &str) -> String {
    let sanitized: String = stem
        .chars()
        .filter(|&c| c != '/' && c != '\\' && c != '\0')
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(80)
        .collect();

    let trimmed = sanitized.trim_matches('_');
    if trimmed.is_empty() {
        "image".into()
    } else {
        trimmed.to_string()
    }
}

/// `odabnote/<subfolder>/<user_id>/<YYYYmmdd_HHMMSS>_<stem>`
pub fn public_id(subfolder: &str, user_id: i64, timestamp: &str, stem: &str) -> String {
    format!("{STORAGE_ROOT}/{subfolder}/{user_id}/{timestamp}_{stem}")
}

pub(crate) fn is_remote(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

/// GET an absolute image URL with the remote fetch timeout.
pub(crate) fn fetch_remote(url: &str) -> Result<Vec<u8>, StorageError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(REMOTE_FETCH_TIMEOUT_SECS))
        .build()
        .map_err(|e| StorageError::Fetch(e.to_string()))?;
    let response = client
        .get(url)
        .send()
        .map_err(|e| StorageError::Fetch(e.to_string()))?;
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(StorageError::NotFound(url.to_string()));
    }
    if !status.is_success() {
        return Err(StorageError::Fetch(format!("HTTP {}", status.as_u16())));
    }
    let bytes = response
        .bytes()
        .map_err(|e| StorageError::Fetch(e.to_string()))?;
    Ok(bytes.to_vec())
}


#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn accepts_png_within_limit() {
        let name = validate_upload("Page 3.PNG", PNG_MAGIC, 1024).unwrap();
        assert_eq!(name.extension, "png");
        assert_eq!(name.stem, "Page_3");
    }

    #[test]
    fn rejects_gif_and_missing_extension() {
        assert!(matches!(
            validate_upload("anim.gif", PNG_MAGIC, 1024),
            Err(StorageError::InvalidExtension(ext)) if ext == "gif"
        ));
        assert!(matches!(
            validate_upload("noext", PNG_MAGIC, 1024),
            Err(StorageError::InvalidExtension(_))
        ));
    }

    #[test]
    fn rejects_oversized() {
        let big = [PNG_MAGIC, &[0u8; 64][..]].concat();
        assert!(matches!(
            validate_upload("a.png", &big, 16),
            Err(StorageError::TooLarge { size: 72, limit: 16 })
        ));
    }

    #[test]
    fn rejects_non_image_content() {
        assert!(matches!(
            validate_upload("fake.jpg", b"%PDF-1.7 hello", 1024),
            Err(StorageError::UnsupportedContent)
        ));
    }

    #[test]
    fn detects_webp_and_jpeg() {
        assert_eq!(detect_image_mime(b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
        assert_eq!(detect_image_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(detect_image_mime(b"abc"), None);
    }

    #[test]
    fn sanitize_drops_traversal_and_unicode() {
        assert_eq!(sanitize_stem("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_stem("수학 문제"), "image");
        assert_eq!(sanitize_stem("ok-name_1"), "ok-name_1");
    }

    #[test]
    fn public_id_layout() {
        assert_eq!(
            public_id("problems/7", 3, "20260101_120000", "scan"),
            "odabnote/problems/7/3/20260101_120000_scan"
        );
    }

    #[test]
    fn remote_detection() {
        assert!(is_remote("https://res.cloudinary.com/x/image/upload/a"));
        assert!(!is_remote("odabnote/problems/1/1/a.png"));
    }

    #[test]
    fn tiny_png_is_detected() {
        assert_eq!(detect_image_mime(&test_images::tiny_png()), Some("image/png"));
    }
}

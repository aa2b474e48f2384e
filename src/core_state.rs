//! Transport-agnostic application state shared by every request.
//!
//! Holds configuration and the long-lived collaborators (image store, OCR
//! engine, export font). The database is not pooled: each request opens
//! its own connection through `open_db`.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db;
use crate::export::fonts::{self, FontChoice};
use crate::ocr::{MathpixClient, OcrEngine, OcrError};
use crate::storage::{self, ImageStore, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Storage setup failed: {0}")]
    Storage(#[from] StorageError),
    #[error("OCR client setup failed: {0}")]
    Ocr(#[from] OcrError),
}

pub struct CoreState {
    pub config: AppConfig,
    pub images: Arc<dyn ImageStore>,
    pub ocr: Arc<dyn OcrEngine>,
    pub font: FontChoice,
}

impl CoreState {
    /// Build the production collaborators from configuration and make sure
    /// the database file exists with the current schema.
    pub fn from_config(config: AppConfig) -> Result<Self, CoreError> {
        let images = storage::build_store(&config)?;
        let ocr: Arc<dyn OcrEngine> = Arc::new(MathpixClient::new(
            &config.mathpix_app_id,
            &config.mathpix_app_key,
        )?);
        if !ocr.is_configured() {
            tracing::warn!("MATHPIX_APP_ID / MATHPIX_APP_KEY not set, text extraction disabled");
        }
        let font = fonts::resolve(&config);

        let state = Self::with_services(config, images, ocr, font);
        state.open_db()?;
        tracing::info!(
            database = %state.config.database_path.display(),
            storage = state.images.backend(),
            font = %state.font.describe(),
            "Application state ready"
        );
        Ok(state)
    }

    /// Assemble state from explicit collaborators (tests inject mocks).
    pub fn with_services(
        config: AppConfig,
        images: Arc<dyn ImageStore>,
        ocr: Arc<dyn OcrEngine>,
        font: FontChoice,
    ) -> Self {
        Self {
            config,
            images,
            ocr,
            font,
        }
    }

    /// Open a connection to the application database (migrations applied).
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.config.database_path).map_err(CoreError::Database)
    }

    /// Whether uploads live on local disk and need the `/uploads` route.
    pub fn serves_local_uploads(&self) -> bool {
        self.config.cloudinary_url.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::MockOcrEngine;
    use crate::storage::LocalImageStore;

    fn config_in(dir: &std::path::Path) -> AppConfig {
        let data_dir = dir.to_string_lossy().to_string();
        AppConfig::from_lookup(move |key| (key == "ODABNOTE_DATA_DIR").then(|| data_dir.clone()))
            .unwrap()
    }

    #[test]
    fn open_db_creates_schema() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        let state = CoreState::with_services(
            config.clone(),
            Arc::new(LocalImageStore::new(config.uploads_dir())),
            Arc::new(MockOcrEngine::new("x")),
            FontChoice::Builtin,
        );
        let conn = state.open_db().unwrap();
        assert_eq!(db::repository::count_users(&conn).unwrap(), 0);
        assert!(tmp.path().join("odabnote.db").exists());
        assert!(state.serves_local_uploads());
    }

    #[test]
    fn from_config_without_credentials_leaves_ocr_unconfigured() {
        let tmp = tempfile::tempdir().unwrap();
        let state = CoreState::from_config(config_in(tmp.path())).unwrap();
        assert!(!state.ocr.is_configured());
        assert_eq!(state.images.backend(), "local");
    }
}

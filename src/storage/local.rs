use std::path::{Component, Path, PathBuf};

use super::{fetch_remote, is_remote, ImageStore, StorageError};

/// URL prefix the router serves the uploads folder under.
pub const UPLOADS_ROUTE: &str = "/uploads";

/// Images stored as files under a root folder. The reference is the path
/// relative to that root.
pub struct LocalImageStore {
    root: PathBuf,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a reference inside the root, refusing anything that could
    /// escape it.
    fn resolve(&self, reference: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(reference);
        if reference.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidReference(reference.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl ImageStore for LocalImageStore {
    fn upload(
        &self,
        data: &[u8],
        public_id: &str,
        extension: &str,
    ) -> Result<String, StorageError> {
        let reference = format!("{public_id}.{extension}");
        let path = self.resolve(&reference)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, data)?;
        tracing::debug!(reference = %reference, bytes = data.len(), "Stored image locally");
        Ok(reference)
    }

    fn fetch(&self, reference: &str) -> Result<Vec<u8>, StorageError> {
        if is_remote(reference) {
            return fetch_remote(reference);
        }
        let path = self.resolve(reference)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(reference.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn url_for(&self, reference: &str) -> String {
        if is_remote(reference) {
            reference.to_string()
        } else {
            format!("{UPLOADS_ROUTE}/{reference}")
        }
    }

    fn backend(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_then_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(dir.path());
        let reference = store
            .upload(b"\x89PNGdata", "odabnote/problems/1/2/20260101_000000_a", "png")
            .unwrap();
        assert_eq!(reference, "odabnote/problems/1/2/20260101_000000_a.png");
        assert!(dir.path().join(&reference).exists());
        assert_eq!(store.fetch(&reference).unwrap(), b"\x89PNGdata");
    }

    #[test]
    fn url_for_local_and_remote() {
        let store = LocalImageStore::new("/tmp/none");
        assert_eq!(store.url_for("a/b.png"), "/uploads/a/b.png");
        assert_eq!(
            store.url_for("https://cdn.example.com/x.png"),
            "https://cdn.example.com/x.png"
        );
    }

    #[test]
    fn traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(dir.path());
        for bad in ["../secret.png", "/etc/passwd", "a/../../b.png", ""] {
            assert!(
                matches!(store.fetch(bad), Err(StorageError::InvalidReference(_))),
                "{bad} should be rejected"
            );
        }
        assert!(store.upload(b"x", "../escape", "png").is_err());
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(dir.path());
        assert!(matches!(
            store.fetch("nope.png"),
            Err(StorageError::NotFound(_))
        ));
    }
}

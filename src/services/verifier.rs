use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Trait for checking that a path is a temp file produced by the upload transport
pub trait UploadVerifier: Send + Sync {
    /// True when `path` was written by the transport for the current request
    /// and was not supplied by the caller.
    fn is_uploaded_file(&self, path: &Path) -> bool;
}

/// Paths staged by the transport layer.
///
/// A path is genuine when it was registered here and still exists as a regular file.
#[derive(Debug, Default)]
pub struct StagingRegistry {
    paths: RwLock<HashSet<PathBuf>>,
}

impl StagingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        tracing::trace!("Registering staged upload {}", path.display());
        match self.paths.write() {
            Ok(mut paths) => {
                paths.insert(path);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(path);
            }
        }
    }

    pub fn unregister(&self, path: &Path) -> bool {
        match self.paths.write() {
            Ok(mut paths) => paths.remove(path),
            Err(poisoned) => poisoned.into_inner().remove(path),
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        match self.paths.read() {
            Ok(paths) => paths.contains(path),
            Err(poisoned) => poisoned.into_inner().contains(path),
        }
    }

    pub fn len(&self) -> usize {
        match self.paths.read() {
            Ok(paths) => paths.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UploadVerifier for StagingRegistry {
    fn is_uploaded_file(&self, path: &Path) -> bool {
        if !self.contains(path) {
            tracing::debug!("{} was not staged by the transport", path.display());
            return false;
        }
        std::fs::symlink_metadata(path)
            .map(|meta| meta.file_type().is_file())
            .unwrap_or(false)
    }
}

/// Verifier backed by a fixed set of paths, for wiring pre-parsed descriptors
#[derive(Debug, Clone, Default)]
pub struct KnownPathsVerifier {
    paths: HashSet<PathBuf>,
}

impl KnownPathsVerifier {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

impl UploadVerifier for KnownPathsVerifier {
    fn is_uploaded_file(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }
}

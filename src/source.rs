use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

/// Where request paths are resolved to file contents.
#[async_trait]
pub trait Source: Send + Sync + 'static {
    /// `true` only if `path` names a regular file.
    async fn exists(&self, path: &str) -> bool;

    async fn read(&self, path: &str) -> io::Result<Vec<u8>>;
}

/// Serves files below a root directory.
#[derive(Debug, Clone)]
pub struct Dir {
    root: PathBuf,
}

impl Dir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Dir { root: root.into() }
    }

    /// Joins `path` onto the root, refusing anything that could step outside it.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path);
        let mut components = relative.components().peekable();
        components.peek()?;
        if components.all(|c| matches!(c, Component::Normal(_) | Component::CurDir)) {
            Some(self.root.join(relative))
        } else {
            None
        }
    }
}

#[async_trait]
impl Source for Dir {
    async fn exists(&self, path: &str) -> bool {
        let Some(full) = self.resolve(path) else {
            return false;
        };
        tokio::fs::metadata(full)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }

    async fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        let full = self
            .resolve(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))?;
        tokio::fs::read(full).await
    }
}

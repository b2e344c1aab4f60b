use std::path::PathBuf;

use super::{FileSystem, VfsError};

/// Pass-through to the host filesystem.
///
/// Without a root, paths go to the host as given, so relative paths follow
/// the process working directory. With a root, every path is joined under it.
#[derive(Debug, Clone, Default)]
pub struct HostFs {
    root: Option<PathBuf>,
}

impl HostFs {
    pub fn new() -> Self {
        Self { root: None }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: Some(root.into()) }
    }

    fn host_path(&self, path: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(path.trim_start_matches('/')),
            None => PathBuf::from(path),
        }
    }
}

impl FileSystem for HostFs {
    fn read_file(&self, path: &str) -> Result<String, VfsError> {
        std::fs::read_to_string(self.host_path(path)).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => VfsError::NotFound(path.to_string()),
            _ => VfsError::Io(e),
        })
    }

    fn exists(&self, path: &str) -> bool {
        self.host_path(path).exists()
    }

    fn is_dir(&self, path: &str) -> bool {
        self.host_path(path).is_dir()
    }

    fn name(&self) -> &str {
        "host"
    }
}

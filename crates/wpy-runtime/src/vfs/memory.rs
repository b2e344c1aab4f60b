use hashbrown::HashMap;

use super::{FileSystem, VfsError};

/// In-memory filesystem.
///
/// Keys are stored without a leading `/`, so `/a.py` and `a.py` name the
/// same file. Directories exist implicitly when a file lives under them.
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    files: HashMap<String, String>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, path: impl AsRef<str>, content: impl Into<String>) {
        self.files.insert(key(path.as_ref()).to_string(), content.into());
    }

    pub fn with_file(mut self, path: impl AsRef<str>, content: impl Into<String>) -> Self {
        self.add_file(path, content);
        self
    }

    pub fn with_files<P: AsRef<str>, C: Into<String>>(mut self, files: impl IntoIterator<Item = (P, C)>) -> Self {
        for (path, content) in files {
            self.add_file(path, content);
        }
        self
    }
}

fn key(path: &str) -> &str {
    path.trim_start_matches('/').trim_end_matches('/')
}

impl FileSystem for MemoryFs {
    fn read_file(&self, path: &str) -> Result<String, VfsError> {
        self.files.get(key(path)).cloned().ok_or_else(|| VfsError::NotFound(path.to_string()))
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(key(path)) || self.is_dir(path)
    }

    fn is_dir(&self, path: &str) -> bool {
        let dir = key(path);
        if dir.is_empty() {
            return true;
        }
        self.files
            .keys()
            .any(|p| p.len() > dir.len() && p.starts_with(dir) && p.as_bytes()[dir.len()] == b'/')
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_implicit_dirs() {
        let fs = MemoryFs::new().with_file("/pkg/mod.py", "pass");
        assert!(fs.is_dir("pkg"));
        assert!(fs.is_dir("/pkg/"));
        assert!(!fs.is_dir("pk"));
        assert!(fs.exists("pkg/mod.py"));
        assert!(!fs.is_dir("pkg/mod.py"));
        assert_eq!(fs.read_file("/pkg/mod.py").unwrap(), "pass");
    }
}

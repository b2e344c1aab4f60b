//! Virtual filesystem.
//!
//! A mount table maps absolute path prefixes to filesystem backends. Paths
//! are resolved against the longest matching mount point; relative paths go
//! to the current mount unchanged. Without filesystem support the runtime
//! installs [`NoVfs`], for which every lookup reports non-existence.

mod host;
mod memory;

pub use host::HostFs;
pub use memory::MemoryFs;

use thiserror::Error;
use tracing::{debug, info};

pub const ENOENT: i32 = 2;
pub const EIO: i32 = 5;
pub const EINVAL: i32 = 22;

#[derive(Debug, Error)]
pub enum VfsError {
    #[error("no such file or directory: {0}")]
    NotFound(String),
    #[error("invalid mount point: {0}")]
    InvalidMountPoint(String),
    #[error("nothing mounted at {0}")]
    NotMounted(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl VfsError {
    /// POSIX errno reported to scripts.
    pub fn errno(&self) -> i32 {
        match self {
            VfsError::NotFound(_) => ENOENT,
            VfsError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => ENOENT,
            VfsError::Io(_) => EIO,
            VfsError::InvalidMountPoint(_) | VfsError::NotMounted(_) => EINVAL,
        }
    }
}

/// Result of probing a path for `import`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStat {
    NoExist,
    Dir,
    File,
}

/// A filesystem backend.
///
/// Paths handed to a backend are relative to its mount point (absolute
/// lookups keep a leading `/`) or, for the current mount, exactly as the
/// script wrote them.
pub trait FileSystem {
    fn read_file(&self, path: &str) -> Result<String, VfsError>;

    fn exists(&self, path: &str) -> bool;

    fn is_dir(&self, path: &str) -> bool;

    /// Backend name for diagnostics.
    fn name(&self) -> &str;
}

/// Path lookups used by `open` and `import`.
pub trait PathResolver {
    fn import_stat(&self, path: &str) -> ImportStat;

    /// Read a whole file. `Ok(None)` when no filesystem is available at all.
    fn open(&self, path: &str) -> Result<Option<String>, VfsError>;
}

struct Mount {
    path: String,
    fs: Box<dyn FileSystem>,
}

/// Mount table with a current filesystem for relative paths.
#[derive(Default)]
pub struct MountTable {
    mounts: Vec<Mount>,
    current: Option<String>,
}

impl MountTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount `fs` at `path`, replacing any backend already mounted there.
    pub fn mount(&mut self, fs: Box<dyn FileSystem>, path: &str) -> Result<(), VfsError> {
        let path = normalize_mount_point(path)?;
        info!(mount = %path, backend = fs.name(), "vfs mount");
        match self.mounts.iter_mut().find(|m| m.path == path) {
            Some(existing) => existing.fs = fs,
            None => self.mounts.push(Mount { path, fs }),
        }
        Ok(())
    }

    pub fn umount(&mut self, path: &str) -> Result<(), VfsError> {
        let path = normalize_mount_point(path)?;
        let idx = self
            .mounts
            .iter()
            .position(|m| m.path == path)
            .ok_or_else(|| VfsError::NotMounted(path.clone()))?;
        self.mounts.remove(idx);
        if self.current.as_deref() == Some(path.as_str()) {
            self.current = None;
        }
        debug!(mount = %path, "vfs umount");
        Ok(())
    }

    /// Make the filesystem mounted at `path` current for relative lookups.
    pub fn set_current(&mut self, path: &str) -> Result<(), VfsError> {
        let path = normalize_mount_point(path)?;
        if !self.mounts.iter().any(|m| m.path == path) {
            return Err(VfsError::NotMounted(path));
        }
        self.current = Some(path);
        Ok(())
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn mount_points(&self) -> impl Iterator<Item = &str> {
        self.mounts.iter().map(|m| m.path.as_str())
    }

    /// Backend owning `path` and the path as that backend sees it.
    pub fn resolve<'a>(&'a self, path: &str) -> Result<(&'a dyn FileSystem, String), VfsError> {
        if !path.starts_with('/') {
            let cur = self.current.as_deref().ok_or_else(|| VfsError::NotFound(path.to_string()))?;
            let mount = self
                .mounts
                .iter()
                .find(|m| m.path == cur)
                .ok_or_else(|| VfsError::NotFound(path.to_string()))?;
            return Ok((mount.fs.as_ref(), path.to_string()));
        }

        let mut best: Option<&Mount> = None;
        for m in &self.mounts {
            let matches = m.path == "/"
                || path == m.path
                || (path.starts_with(&m.path) && path.as_bytes().get(m.path.len()) == Some(&b'/'));
            if matches && best.map_or(true, |b| m.path.len() > b.path.len()) {
                best = Some(m);
            }
        }
        let mount = best.ok_or_else(|| VfsError::NotFound(path.to_string()))?;
        let rest = if mount.path == "/" { path } else { &path[mount.path.len()..] };
        let rest = if rest.is_empty() { "/" } else { rest };
        Ok((mount.fs.as_ref(), rest.to_string()))
    }
}

impl PathResolver for MountTable {
    fn import_stat(&self, path: &str) -> ImportStat {
        match self.resolve(path) {
            Ok((fs, p)) if fs.is_dir(&p) => ImportStat::Dir,
            Ok((fs, p)) if fs.exists(&p) => ImportStat::File,
            _ => ImportStat::NoExist,
        }
    }

    fn open(&self, path: &str) -> Result<Option<String>, VfsError> {
        let (fs, p) = self.resolve(path)?;
        fs.read_file(&p).map(Some)
    }
}

impl std::fmt::Debug for MountTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountTable")
            .field("mounts", &self.mount_points().collect::<Vec<_>>())
            .field("current", &self.current)
            .finish()
    }
}

/// Resolver used when filesystem support is compiled out.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVfs;

impl NoVfs {
    pub fn resolve(&self, path: &str) -> Result<(), VfsError> {
        Err(VfsError::NotFound(path.to_string()))
    }
}

impl PathResolver for NoVfs {
    fn import_stat(&self, _path: &str) -> ImportStat {
        ImportStat::NoExist
    }

    fn open(&self, _path: &str) -> Result<Option<String>, VfsError> {
        Ok(None)
    }
}

/// The runtime's filesystem view.
#[derive(Debug)]
pub enum Vfs {
    Mounted(MountTable),
    Degraded(NoVfs),
}

impl Vfs {
    /// A mount table with `fs` as the root mount and current filesystem.
    pub fn rooted(fs: Box<dyn FileSystem>) -> Result<Self, VfsError> {
        let mut table = MountTable::new();
        table.mount(fs, "/")?;
        table.set_current("/")?;
        Ok(Vfs::Mounted(table))
    }

    pub fn mount_table(&mut self) -> Option<&mut MountTable> {
        match self {
            Vfs::Mounted(t) => Some(t),
            Vfs::Degraded(_) => None,
        }
    }
}

impl PathResolver for Vfs {
    fn import_stat(&self, path: &str) -> ImportStat {
        match self {
            Vfs::Mounted(t) => t.import_stat(path),
            Vfs::Degraded(n) => n.import_stat(path),
        }
    }

    fn open(&self, path: &str) -> Result<Option<String>, VfsError> {
        match self {
            Vfs::Mounted(t) => t.open(path),
            Vfs::Degraded(n) => n.open(path),
        }
    }
}

fn normalize_mount_point(path: &str) -> Result<String, VfsError> {
    if !path.starts_with('/') || path.contains("//") {
        return Err(VfsError::InvalidMountPoint(path.to_string()));
    }
    let trimmed = path.trim_end_matches('/');
    Ok(if trimmed.is_empty() { "/".to_string() } else { trimmed.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem(files: &[(&str, &str)]) -> Box<dyn FileSystem> {
        Box::new(MemoryFs::new().with_files(files.iter().copied()))
    }

    #[test]
    fn test_root_mount_resolves_everything() {
        let vfs = Vfs::rooted(mem(&[("lib/a.py", "x = 1")])).unwrap();
        assert_eq!(vfs.import_stat("/lib/a.py"), ImportStat::File);
        assert_eq!(vfs.import_stat("/lib"), ImportStat::Dir);
        assert_eq!(vfs.import_stat("lib/a.py"), ImportStat::File);
        assert_eq!(vfs.import_stat("/lib/b.py"), ImportStat::NoExist);
        assert_eq!(vfs.open("lib/a.py").unwrap().as_deref(), Some("x = 1"));
    }

    #[test]
    fn test_longest_prefix_wins() {
        let mut table = MountTable::new();
        table.mount(mem(&[("flash/a.py", "root")]), "/").unwrap();
        table.mount(mem(&[("a.py", "flash")]), "/flash/").unwrap();
        let (fs, rest) = table.resolve("/flash/a.py").unwrap();
        assert_eq!(rest, "/a.py");
        assert_eq!(fs.read_file(&rest).unwrap(), "flash");
        // not a path-component match
        let (_, rest) = table.resolve("/flashy").unwrap();
        assert_eq!(rest, "/flashy");
    }

    #[test]
    fn test_mount_replaces_existing() {
        let mut table = MountTable::new();
        table.mount(mem(&[("a.py", "first")]), "/").unwrap();
        table.mount(mem(&[("a.py", "second")]), "/").unwrap();
        assert_eq!(table.mount_points().count(), 1);
        assert_eq!(table.open("/a.py").unwrap().as_deref(), Some("second"));
    }

    #[test]
    fn test_umount() {
        let mut table = MountTable::new();
        table.mount(mem(&[]), "/").unwrap();
        table.set_current("/").unwrap();
        table.umount("/").unwrap();
        assert_eq!(table.current(), None);
        assert!(matches!(table.umount("/"), Err(VfsError::NotMounted(_))));
        assert!(matches!(table.resolve("rel.py"), Err(VfsError::NotFound(_))));
    }

    #[test]
    fn test_invalid_mount_point() {
        let mut table = MountTable::new();
        let err = table.mount(mem(&[]), "relative").unwrap_err();
        assert_eq!(err.errno(), EINVAL);
    }

    #[test]
    fn test_degraded_reports_nothing() {
        let vfs = Vfs::Degraded(NoVfs);
        assert_eq!(vfs.import_stat("/anything"), ImportStat::NoExist);
        assert_eq!(vfs.open("/anything").unwrap(), None);
        assert_eq!(NoVfs.resolve("/x").unwrap_err().errno(), ENOENT);
    }

    #[test]
    fn test_missing_file_errno() {
        let vfs = Vfs::rooted(mem(&[])).unwrap();
        assert_eq!(vfs.open("/nope.py").unwrap_err().errno(), ENOENT);
    }
}

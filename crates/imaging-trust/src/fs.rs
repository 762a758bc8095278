//! File system capability
//!
//! The content hasher and the seed store never call `std::fs` directly; they
//! read through a [`FileSystem`] so tests can substitute [`MemoryFileSystem`].

use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

/// Read-only access to files
pub trait FileSystem: Send + Sync {
    /// Open a file for streaming reads
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + '_>>;

    /// Read a whole file as UTF-8 text
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let mut reader = self.open(path)?;
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        Ok(content)
    }
}

/// The host file system
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + '_>> {
        let file = std::fs::File::open(path)?;
        Ok(Box::new(file))
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// In-memory file system keyed by exact path
///
/// Paths are compared verbatim, so `D:\sources\boot.wim` can be used on any
/// host.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: RwLock<HashMap<PathBuf, Vec<u8>>>,
}

impl MemoryFileSystem {
    /// Create an empty file system
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, builder style
    pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }

    /// Add or replace a file
    pub fn insert(&self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) {
        self.files.write().insert(path.into(), content.into());
    }

    /// Remove a file, returning whether it existed
    pub fn remove(&self, path: &Path) -> bool {
        self.files.write().remove(path).is_some()
    }
}

impl FileSystem for MemoryFileSystem {
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + '_>> {
        match self.files.read().get(path) {
            Some(content) => Ok(Box::new(Cursor::new(content.clone()))),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_fs_read_back() -> Result<(), Box<dyn std::error::Error>> {
        let fs = MemoryFileSystem::new().with_file(r"C:\seed.json", "{}");
        assert_eq!(fs.read_to_string(Path::new(r"C:\seed.json"))?, "{}");
        Ok(())
    }

    #[test]
    fn test_memory_fs_missing_file() {
        let fs = MemoryFileSystem::new();
        let result = fs.open(Path::new("missing"));
        assert!(matches!(result, Err(ref e) if e.kind() == io::ErrorKind::NotFound));
    }

    #[test]
    fn test_memory_fs_remove() {
        let fs = MemoryFileSystem::new().with_file("a", "x");
        assert!(fs.remove(Path::new("a")));
        assert!(!fs.remove(Path::new("a")));
    }

    #[test]
    fn test_os_fs_reads_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("data.txt");
        std::fs::write(&path, "hello")?;
        assert_eq!(OsFileSystem.read_to_string(&path)?, "hello");
        Ok(())
    }
}

// Filesystem access behind a trait so procfs readers run against fixtures in tests

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Entries directly under `path`.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Delegates to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(path)? {
            paths.push(entry?.path());
        }
        Ok(paths)
    }
}

/// In-memory filesystem. Contents can change between reads, which is how tests
/// advance cumulative counters.
#[derive(Debug, Default)]
pub struct MemoryFs {
    inner: RwLock<MemoryTree>,
}

#[derive(Debug, Default)]
struct MemoryTree {
    files: BTreeMap<PathBuf, String>,
    dirs: BTreeSet<PathBuf>,
}

impl MemoryTree {
    fn add_parents(&mut self, path: &Path) {
        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                self.dirs.insert(p.to_path_buf());
            }
            parent = p.parent();
        }
    }
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a file; parent directories are implied.
    pub fn set_file(&self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref().to_path_buf();
        let mut tree = self.write();
        tree.add_parents(&path);
        tree.files.insert(path, content.into());
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        let mut tree = self.write();
        tree.add_parents(&path);
        tree.dirs.insert(path);
    }

    /// Remove a file or a directory together with everything under it.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut tree = self.write();
        tree.files.retain(|p, _| !p.starts_with(path));
        tree.dirs.retain(|p| !p.starts_with(path));
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MemoryTree> {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MemoryTree> {
        self.inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl FileSystem for MemoryFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.read().files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )
        })
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let tree = self.read();
        if !tree.dirs.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            ));
        }
        let children = tree
            .files
            .keys()
            .chain(tree.dirs.iter())
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect();
        Ok(children)
    }
}

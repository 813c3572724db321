//! Filesystem access used by the resolver, reconstruction and archiving.
//!
//! Everything that touches the save store goes through [`SaveFs`], so the
//! decode pipeline runs unchanged against the real disk ([`StdFs`]) or an
//! in-memory tree ([`MemFs`]).

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

pub trait SaveFs {
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + '_>>;

    fn is_file(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// Immediate children of `path`, sorted by name.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.open(path)?.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

// ── StdFs ────────────────────────────────────────────────────────────────────

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFs;

impl SaveFs for StdFs {
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(io::BufReader::new(File::open(path)?)))
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut entries = std::fs::read_dir(path)?
            .map(|e| e.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()?;
        entries.sort();
        Ok(entries)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

// ── MemFs ────────────────────────────────────────────────────────────────────

/// An in-memory file tree.  Directories exist implicitly above every file
/// and can also be created empty.
#[derive(Debug, Clone, Default)]
pub struct MemFs {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs:  BTreeSet<PathBuf>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<P: Into<PathBuf>>(&mut self, path: P, data: impl Into<Vec<u8>>) -> &mut Self {
        self.files.insert(path.into(), data.into());
        self
    }

    pub fn create_dir<P: Into<PathBuf>>(&mut self, path: P) -> &mut Self {
        self.dirs.insert(path.into());
        self
    }

    pub fn remove(&mut self, path: &Path) -> Option<Vec<u8>> {
        self.files.remove(path)
    }

    fn all_paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().chain(self.dirs.iter()).map(PathBuf::as_path)
    }
}

impl SaveFs for MemFs {
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + '_>> {
        match self.files.get(path) {
            Some(data) => Ok(Box::new(Cursor::new(data.as_slice()))),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )),
        }
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        !self.is_file(path) && self.all_paths().any(|p| p.starts_with(path))
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        if !self.is_dir(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such directory: {}", path.display()),
            ));
        }
        let children: BTreeSet<PathBuf> = self
            .all_paths()
            .filter_map(|p| p.strip_prefix(path).ok())
            .filter_map(|rel| rel.components().next())
            .map(|first| path.join(first))
            .collect();
        Ok(children.into_iter().collect())
    }
}

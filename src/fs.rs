//! Source filesystem abstraction.
//!
//! Everything above this seam (capture, handlers, publishing) is filesystem
//! agnostic: the classifier walks through [`SourceFs`] so directory listing
//! order, stat races and symlink resolution can all be controlled in tests.
//!
//! ## Race Tolerance
//!
//! A content tree can mutate while a build is running. Callers treat a
//! `NotFound` from [`SourceFs::stat`] or [`SourceFs::canonical`] as "entry
//! vanished between listing and stat" and skip the entry; every other error
//! is fatal.

use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Minimal metadata for a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub is_dir: bool,
}

/// Read-only view of the content source tree.
///
/// Implementations must be shareable across worker tasks.
pub trait SourceFs: Send + Sync {
    /// List the names of a directory's direct entries.
    ///
    /// Order is whatever the underlying filesystem yields — callers must not
    /// rely on sorting.
    fn read_dir_names(&self, dir: &Path) -> io::Result<Vec<String>>;

    /// Stat a single path.
    fn stat(&self, path: &Path) -> io::Result<FileStat>;

    /// Open a file for reading.
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>>;

    /// Resolve a path to its canonical form (symlinks followed).
    fn canonical(&self, path: &Path) -> io::Result<PathBuf>;
}

/// [`SourceFs`] over the operating system filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFs;

impl SourceFs for OsFs {
    fn read_dir_names(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        let meta = std::fs::metadata(path)?;
        Ok(FileStat {
            is_dir: meta.is_dir(),
        })
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(std::fs::File::open(path)?))
    }

    fn canonical(&self, path: &Path) -> io::Result<PathBuf> {
        std::fs::canonicalize(path)
    }
}

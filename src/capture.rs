//! Content tree capture and bundle classification.
//!
//! Stage 1 of the content pipeline. Walks the content root once, splitting
//! everything it finds into *singles* (files that stand on their own) and
//! *bundles* (directories whose files form one addressable unit, owned by an
//! index file).
//!
//! ## Directory Classification
//!
//! A directory's kind is decided by the first index-like filename seen in
//! its listing:
//!
//! ```text
//! content/
//! ├── _index.md            # section index → this dir is a branch bundle
//! ├── hero.png             #   … absorbed as a resource of _index.md
//! ├── images/              # no index file → regular dir
//! │   └── logo.png         #   … propagates up, becomes a single
//! └── post/
//!     ├── index.md         # page index → this dir is a leaf bundle
//!     ├── first.md         #   … resource
//!     └── shots/
//!         └── one.jpg      #   … leaf bundles absorb the whole subtree
//! ```
//!
//! - **Leaf** (`index.*`): absorbs every descendant file, however deep.
//! - **Branch** (`_index.*`): absorbs only its own directory's files;
//!   descendant files become singles instead. Pulling nested subtrees into a
//!   section bundle would make resource ownership ambiguous, so they are
//!   deliberately kept out.
//! - **Regular**: returns its files upward for an ancestor (or the root) to
//!   claim.
//!
//! ## Cycle Safety
//!
//! Directories are tracked by canonical path in a visited set, so a capture
//! pass terminates even when symbolic links form cycles. A directory is
//! scanned at most once per pass.

use crate::fs::SourceFs;
use serde::Serialize;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How a directory participates in bundling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleKind {
    /// Not a bundle; files propagate to the parent.
    Regular,
    /// Page bundle owning its entire subtree.
    Leaf,
    /// Section bundle owning only its own directory's files.
    Branch,
}

/// Classify a filename as a bundle index.
///
/// `_index.*` marks a section (branch) index, `index.*` a page (leaf) index.
pub fn identify_bundle_kind(name: &str) -> BundleKind {
    if name.starts_with("_index.") {
        BundleKind::Branch
    } else if name.starts_with("index.") {
        BundleKind::Leaf
    } else {
        BundleKind::Regular
    }
}

/// One bundle: the index file that owns it plus its resource files.
///
/// Paths are relative to the content root. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleDir {
    pub owner: PathBuf,
    pub resources: Vec<PathBuf>,
}

/// Everything one capture pass found.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CaptureResult {
    /// Files with no bundle ownership, relative to the content root.
    pub singles: Vec<PathBuf>,
    /// All bundles, in the order their directories resolved.
    pub bundles: Vec<BundleDir>,
}

impl CaptureResult {
    /// Look up a bundle by its owner path.
    pub fn bundle_by_owner(&self, owner: impl AsRef<Path>) -> Option<&BundleDir> {
        let owner = owner.as_ref();
        self.bundles.iter().find(|b| b.owner == owner)
    }
}

/// Walk `base_dir` and classify its contents.
///
/// Fails on any directory that cannot be listed. Entries that vanish between
/// listing and stat are skipped silently — a build racing a content sync is
/// normal, not an error.
pub fn capture(fs: &dyn SourceFs, base_dir: &Path) -> Result<CaptureResult, CaptureError> {
    let mut capturer = Capturer {
        fs,
        base_dir,
        seen: HashSet::new(),
        singles: Vec::new(),
        bundles: Vec::new(),
    };
    let deferred = capturer.handle_dir(base_dir)?;
    capturer.singles.extend(deferred);

    debug!(
        singles = capturer.singles.len(),
        bundles = capturer.bundles.len(),
        "capture complete"
    );

    Ok(CaptureResult {
        singles: capturer.singles,
        bundles: capturer.bundles,
    })
}

struct Capturer<'a> {
    fs: &'a dyn SourceFs,
    base_dir: &'a Path,
    /// Canonical paths of directories already scanned (symlink cycle guard).
    seen: HashSet<PathBuf>,
    singles: Vec<PathBuf>,
    bundles: Vec<BundleDir>,
}

impl Capturer<'_> {
    /// Scan one directory.
    ///
    /// Returns the files the caller should claim: non-empty only for regular
    /// directories. Leaf and branch directories resolve themselves (emitting
    /// a bundle) and return nothing upward.
    ///
    /// The first index-like filename in listing order fixes the directory's
    /// kind for the rest of the scan; a second index file in the same
    /// directory is a misconfiguration and is treated as a plain member.
    fn handle_dir(&mut self, dir: &Path) -> Result<Vec<PathBuf>, CaptureError> {
        let canonical = match self.fs.canonical(dir) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if !self.seen.insert(canonical) {
            return Ok(Vec::new());
        }

        let names = match self.fs.read_dir_names(dir) {
            Ok(names) => names,
            // The directory itself got deleted in the meantime.
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut bundle: Option<(BundleKind, PathBuf)> = None;
        let mut members: Vec<PathBuf> = Vec::new();
        let mut nested: Vec<PathBuf> = Vec::new();

        for name in names {
            let path = dir.join(&name);
            let stat = match self.fs.stat(&path) {
                Ok(s) => s,
                // It got deleted in the meantime.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            if stat.is_dir {
                let from_below = self.handle_dir(&path)?;
                nested.extend(from_below);
                continue;
            }

            let rel = self.relative(&path);
            if bundle.is_none() {
                let kind = identify_bundle_kind(&name);
                if kind != BundleKind::Regular {
                    bundle = Some((kind, rel));
                    continue;
                }
            }
            members.push(rel);
        }

        match bundle {
            Some((BundleKind::Leaf, owner)) => {
                // The whole subtree belongs to this bundle.
                members.extend(nested);
                self.bundles.push(BundleDir {
                    owner,
                    resources: members,
                });
                Ok(Vec::new())
            }
            Some((BundleKind::Branch, owner)) => {
                // Only this directory's own files. Descendant files are
                // site content all the same, so they go to singles.
                self.bundles.push(BundleDir {
                    owner,
                    resources: members,
                });
                self.singles.extend(nested);
                Ok(Vec::new())
            }
            _ => {
                // Let an ancestor decide.
                members.extend(nested);
                Ok(members)
            }
        }
    }

    fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(self.base_dir)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

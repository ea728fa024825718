//! Site context shared by every handler.
//!
//! A [`Site`] bundles what handlers need at dispatch time: the loaded
//! configuration, the source filesystem handle, and the content/publish
//! roots. It also hosts the two collaborator operations the handler chain
//! invokes but does not own the policy of: language assignment and asset
//! publishing.

use crate::config::{ConfigError, SiteConfig};
use crate::fs::{OsFs, SourceFs};
use crate::page::Page;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Build-wide context. Cheap to share: wrap it in an `Arc` and hand clones
/// to every worker.
pub struct Site {
    pub config: SiteConfig,
    fs: Arc<dyn SourceFs>,
    content_dir: PathBuf,
    publish_dir: PathBuf,
}

impl Site {
    /// Open a site rooted at `content_dir`, loading `config.toml` from it.
    pub fn open(
        content_dir: impl Into<PathBuf>,
        publish_dir: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let content_dir = content_dir.into();
        let config = SiteConfig::load(&content_dir)?;
        Ok(Self::new(config, Arc::new(OsFs), content_dir, publish_dir))
    }

    /// Assemble a site from parts. Useful when the caller already has a
    /// config or wants a non-OS filesystem.
    pub fn new(
        config: SiteConfig,
        fs: Arc<dyn SourceFs>,
        content_dir: impl Into<PathBuf>,
        publish_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            fs,
            content_dir: content_dir.into(),
            publish_dir: publish_dir.into(),
        }
    }

    pub fn source_fs(&self) -> &dyn SourceFs {
        self.fs.as_ref()
    }

    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    /// Construct an empty page for a source path relative to the content
    /// root.
    pub fn new_page(&self, rel: &Path) -> Page {
        Page::new(rel)
    }

    /// Open a content file by its root-relative path.
    pub fn open_source(&self, rel: &Path) -> io::Result<Box<dyn Read + Send>> {
        self.fs.open(&self.content_dir.join(rel))
    }

    /// Assign the page's language.
    ///
    /// Front matter wins; otherwise a `name.<lang>.ext` filename suffix
    /// counts when `<lang>` is a configured language; otherwise the site
    /// default applies.
    pub fn assign_site_by_language(&self, page: &mut Page) {
        if let Some(lang) = page.front.language.as_deref() {
            if !lang.is_empty() {
                page.language = lang.to_string();
                return;
            }
        }
        if let Some(lang) = language_suffix(&page.source_path) {
            if self.config.knows_language(lang) {
                page.language = lang.to_string();
                return;
            }
        }
        page.language = self.config.default_language.clone();
    }

    /// Stream a file unchanged into the publish root.
    pub fn publish(&self, rel: &Path, reader: &mut dyn Read) -> io::Result<()> {
        let dest = self.publish_dir.join(rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(&dest)?;
        io::copy(reader, &mut file)?;
        debug!(path = %rel.display(), "published");
        Ok(())
    }
}

/// Extract a language code from a `name.<lang>.ext` filename.
fn language_suffix(path: &Path) -> Option<&str> {
    let stem = path.file_stem()?.to_str()?;
    let (_, lang) = stem.rsplit_once('.')?;
    if lang.is_empty() { None } else { Some(lang) }
}

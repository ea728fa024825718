//! Site configuration module.
//!
//! Handles loading and validating `config.toml` from the content root.
//! Every option has a sensible default; the file itself is optional.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! default_language = "en"   # Language assigned when nothing else matches
//! languages = []             # Extra language codes recognized in filenames,
//!                            # e.g. ["fr", "de"] makes post.fr.md French
//! enable_emoji = false       # Expand :emoji: codes in page content
//! build_drafts = false       # Include pages marked `draft: true`
//! summary_divider = "<!--more-->"  # Marker splitting summary from body
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse — override just the values you want. Unknown keys
//! are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Language assigned to pages that declare none.
    pub default_language: String,
    /// Additional language codes recognized as `name.<lang>.ext` suffixes.
    pub languages: Vec<String>,
    /// Expand `:emoji:` codes during content processing.
    pub enable_emoji: bool,
    /// Build pages marked as drafts.
    pub build_drafts: bool,
    /// Marker that splits a page's summary from the rest of its content.
    pub summary_divider: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            default_language: "en".to_string(),
            languages: Vec::new(),
            enable_emoji: false,
            build_drafts: false,
            summary_divider: "<!--more-->".to_string(),
        }
    }
}

impl SiteConfig {
    /// Load `config.toml` from `dir`, falling back to defaults if the file
    /// does not exist.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join("config.toml");
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_language.is_empty() {
            return Err(ConfigError::Validation(
                "default_language must not be empty".into(),
            ));
        }
        if self.summary_divider.is_empty() {
            return Err(ConfigError::Validation(
                "summary_divider must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Whether `lang` is a language this site knows about.
    pub fn knows_language(&self, lang: &str) -> bool {
        lang == self.default_language || self.languages.iter().any(|l| l == lang)
    }
}

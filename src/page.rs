//! Page construction and content transforms.
//!
//! A [`Page`] is the unit the pipeline ultimately collects. Handlers drive it
//! through a fixed sequence: read + front matter decode, work-content copy,
//! shortcode pass, optional emoji expansion, summary-divider split, and the
//! final markup render.
//!
//! ## Front Matter
//!
//! Three delimiter styles are recognized, detected from the first bytes of
//! the file:
//!
//! ```text
//! ---            +++            {
//! title: Post    title = "P"      "title": "Post"
//! draft: true    weight = 3     }
//! ---            +++
//! body…          body…          body…
//! ```
//!
//! A file without any front matter is a valid page with default metadata.
//! An *opened but malformed* block is a hard error — silently building a
//! page with half its metadata would be worse than failing the run.
//!
//! ## Finalization
//!
//! Rendering marks a page finalized. Running a work-content transform on a
//! finalized page indicates a routing bug, not bad input, and panics.

use crate::config::SiteConfig;
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum PageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid front matter in {path}: {reason}")]
    FrontMatter { path: PathBuf, reason: String },
    #[error("unterminated shortcode in {0}")]
    UnterminatedShortcode(PathBuf),
}

/// Metadata decoded from a page's front matter.
///
/// Unknown user fields are ignored; absent fields take defaults.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct FrontMatter {
    pub title: String,
    pub draft: bool,
    /// Manual ordering weight; lower sorts first.
    pub weight: i32,
    /// Markup override (e.g. a `.txt` file declaring `markup: md`).
    pub markup: Option<String>,
    /// Language override; wins over any filename suffix.
    pub language: Option<String>,
}

/// A content page flowing through the handler chain.
#[derive(Debug, Clone)]
pub struct Page {
    /// Source path relative to the content root.
    pub source_path: PathBuf,
    pub front: FrontMatter,
    /// Assigned language code; empty until language assignment runs.
    pub language: String,
    /// Body as read from the source, front matter stripped.
    pub raw_content: String,
    /// Mutable copy the transform steps operate on. After rendering this
    /// holds the final HTML.
    pub work_content: String,
    /// Text before the summary divider, if the page had one.
    pub summary: Option<String>,
    /// Set once `render_content` has run; the page is then finalized.
    pub rendered: bool,
}

impl Page {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            front: FrontMatter::default(),
            language: String::new(),
            raw_content: String::new(),
            work_content: String::new(),
            summary: None,
            rendered: false,
        }
    }

    /// Read the page source and decode its front matter.
    pub fn read_from(&mut self, reader: &mut dyn Read) -> Result<(), PageError> {
        let mut raw = String::new();
        reader.read_to_string(&mut raw)?;

        let (front, body) =
            parse_front_matter(&raw).map_err(|reason| PageError::FrontMatter {
                path: self.source_path.clone(),
                reason,
            })?;
        self.front = front;
        self.raw_content = body;
        Ok(())
    }

    /// Whether this page should be converted at all.
    ///
    /// Draft pages are skipped unless the site builds drafts. Skipped pages
    /// are still collected — they exist, they just stay unconverted.
    pub fn should_build(&self, config: &SiteConfig) -> bool {
        !self.front.draft || config.build_drafts
    }

    /// Lowercase file extension, without the dot.
    pub fn ext(&self) -> String {
        self.source_path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }

    /// Route key for the conversion stage: front-matter markup if declared,
    /// the file extension otherwise.
    pub fn markup_or_ext(&self) -> String {
        match self.front.markup.as_deref() {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => self.ext(),
        }
    }

    /// Start working on a copy of the raw content.
    pub fn create_work_content_copy(&mut self) {
        self.work_content = self.raw_content.clone();
    }

    /// Expand `{{< name >}}` shortcodes in the work content.
    ///
    /// Unknown shortcode names are dropped with a warning — a diagnostic,
    /// not a build failure. An opened-but-unterminated shortcode is an
    /// error; callers decide whether it aborts their chain.
    pub fn process_shortcodes(&mut self) -> Result<(), PageError> {
        if !self.work_content.contains("{{<") {
            return Ok(());
        }

        let mut out = String::with_capacity(self.work_content.len());
        let mut rest = self.work_content.as_str();
        while let Some(start) = rest.find("{{<") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 3..];
            let Some(end) = after.find(">}}") else {
                return Err(PageError::UnterminatedShortcode(self.source_path.clone()));
            };
            let inner = after[..end].trim();
            let name = inner.split_whitespace().next().unwrap_or("");
            match name {
                "br" => out.push_str("<br>"),
                "hr" => out.push_str("<hr>"),
                _ => warn!(
                    shortcode = name,
                    page = %self.source_path.display(),
                    "unknown shortcode dropped"
                ),
            }
            rest = &after[end + 3..];
        }
        out.push_str(rest);
        self.work_content = out;
        Ok(())
    }

    /// Expand `:code:` emoji in the work content.
    pub fn emojify(&mut self) {
        for (code, glyph) in EMOJI {
            if self.work_content.contains(code) {
                self.work_content = self.work_content.replace(code, glyph);
            }
        }
    }

    /// Split the work content on the summary divider.
    ///
    /// The text before the divider becomes the summary; the divider itself
    /// is removed. Pages without a divider keep `summary = None`.
    pub fn replace_divider(&mut self, divider: &str) {
        if let Some(pos) = self.work_content.find(divider) {
            self.summary = Some(self.work_content[..pos].trim().to_string());
            self.work_content = self.work_content.replacen(divider, "", 1);
        }
    }

    /// Render the work content to HTML and finalize the page.
    ///
    /// Markdown-family markup goes through pulldown-cmark. Other markup
    /// passes through untouched with a warning; the page is finalized either
    /// way so it cannot re-enter conversion.
    pub fn render_content(&mut self) {
        let markup = self.markup_or_ext();
        match markup.as_str() {
            "md" | "markdown" | "mdown" | "mmark" => {
                let parser = pulldown_cmark::Parser::new(&self.work_content);
                let mut html = String::with_capacity(self.work_content.len() * 2);
                pulldown_cmark::html::push_html(&mut html, parser);
                self.work_content = html;
            }
            other => {
                warn!(
                    markup = other,
                    page = %self.source_path.display(),
                    "no renderer for markup, passing content through"
                );
            }
        }
        self.rendered = true;
    }

    /// Key for the collector's terminal sort: weight, then title, then path.
    pub fn sort_key(&self) -> (i32, &str, &Path) {
        (self.front.weight, &self.front.title, &self.source_path)
    }
}

/// The emoji substitution table.
const EMOJI: &[(&str, &str)] = &[
    (":smile:", "😄"),
    (":heart:", "❤️"),
    (":tada:", "🎉"),
    (":warning:", "⚠️"),
    (":rocket:", "🚀"),
];

/// Split raw page source into decoded front matter and body.
///
/// Returns a human-readable reason on failure; the caller attaches the path.
fn parse_front_matter(raw: &str) -> Result<(FrontMatter, String), String> {
    if raw.starts_with("---") {
        return parse_fenced(raw, "---", |s| {
            serde_yaml::from_str(s).map_err(|e| e.to_string())
        });
    }
    if raw.starts_with("+++") {
        return parse_fenced(raw, "+++", |s| {
            toml::from_str(s).map_err(|e| e.to_string())
        });
    }
    if raw.trim_start().starts_with('{') {
        return parse_json(raw);
    }
    Ok((FrontMatter::default(), raw.to_string()))
}

fn parse_fenced(
    raw: &str,
    fence: &str,
    decode: impl Fn(&str) -> Result<FrontMatter, String>,
) -> Result<(FrontMatter, String), String> {
    let lines: Vec<&str> = raw.lines().collect();
    if lines.first().map(|l| l.trim()) != Some(fence) {
        return Ok((FrontMatter::default(), raw.to_string()));
    }
    let close = lines[1..]
        .iter()
        .position(|l| l.trim() == fence)
        .ok_or_else(|| format!("front matter opened with {fence} but never closed"))?
        + 1;

    let block = lines[1..close].join("\n");
    let front = if block.trim().is_empty() {
        FrontMatter::default()
    } else {
        decode(&block)?
    };
    let body = lines[close + 1..].join("\n");
    Ok((front, body))
}

fn parse_json(raw: &str) -> Result<(FrontMatter, String), String> {
    let mut stream = serde_json::Deserializer::from_str(raw).into_iter::<FrontMatter>();
    match stream.next() {
        Some(Ok(front)) => {
            let body = raw[stream.byte_offset()..].trim_start().to_string();
            Ok((front, body))
        }
        Some(Err(e)) => Err(e.to_string()),
        None => Err("empty JSON front matter".to_string()),
    }
}

//! Shared test utilities for the bindery test suite.
//!
//! Provides the tree-builder used by capture, handler and orchestrator
//! tests, plus lookup helpers over processed page collections.

use crate::page::Page;
use std::path::Path;

/// Write a content file at `rel` under `root`, creating parent directories.
pub fn write_source(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

/// Find a page by its source path. Panics with a clear message on miss.
pub fn find_page<'a>(pages: &'a [Page], source: &str) -> &'a Page {
    pages
        .iter()
        .find(|p| p.source_path == Path::new(source))
        .unwrap_or_else(|| {
            let paths: Vec<String> = pages
                .iter()
                .map(|p| p.source_path.to_string_lossy().into_owned())
                .collect();
            panic!("page '{source}' not found. Available: {paths:?}")
        })
}

/// All page titles in collection order.
pub fn page_titles(pages: &[Page]) -> Vec<&str> {
    pages.iter().map(|p| p.front.title.as_str()).collect()
}

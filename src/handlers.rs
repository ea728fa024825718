//! The default content handler set.
//!
//! Four handlers cover every file the capture pass can produce:
//!
//! 1. [`first_step`] — constructs the page and decodes front matter. Pages
//!    that should not build are sent to the collector as-is; everything else
//!    re-routes the chain by its markup.
//! 2. [`page_handle`] — the conversion step for markup pages: language
//!    assignment, work copy, shortcodes, optional emoji, summary divider,
//!    render.
//! 3. [`html_handle`] — the conversion step for raw HTML pages: work copy
//!    and shortcodes only, no markdown render.
//! 4. [`copy_file`] — the wildcard step: stream the bytes unchanged to the
//!    publish collaborator.
//!
//! [`default_pipelines`] wires them into the standard registry:
//!
//! ```text
//! markup files:  first_step → page_handle
//!                               └─ html/htm → html_handle
//! everything else:  copy_file
//! ```

use crate::routing::{DEFAULT_ROUTE, Handler, Pipelines};
use crate::site::Site;
use std::sync::Arc;
use tracing::warn;

/// Extensions that go through page conversion rather than plain copying.
const MARKUP_EXTENSIONS: &[&str] = &[
    "html", "htm", "mdown", "markdown", "md", "asciidoc", "adoc", "ad", "rest", "rst", "mmark",
    "org",
];

/// Build the standard registry for a site.
pub fn default_pipelines(site: Arc<Site>) -> Pipelines {
    let mut pipes = Pipelines::new();
    pipes
        .for_extensions(MARKUP_EXTENSIONS)
        .stage(first_step(site.clone()))
        .stage(page_handle(site.clone()))
        .or(html_handle(site.clone()), &["html", "htm"]);

    // Everything else (images etc.) is copied to the destination.
    pipes.for_unknown_files().stage(copy_file(site));
    pipes
}

/// Construct the page and read its front matter.
///
/// A page that should not build is complete at this point: it goes straight
/// to the collector and the chain continues with no page attached, so the
/// conversion stages no-op. Otherwise the next route key is the page's
/// markup (front matter override or file extension).
pub fn first_step(site: Arc<Site>) -> Handler {
    Arc::new(move |unit, pages| {
        let mut page = site.new_page(&unit.filename);
        let mut reader = site.open_source(&unit.filename)?;
        page.read_from(reader.as_mut())?;

        if !page.should_build(&site.config) {
            let _ = pages.send(page);
            return Ok(DEFAULT_ROUTE.to_string());
        }

        let route = page.markup_or_ext();
        unit.page = Some(page);
        Ok(route)
    })
}

/// Convert a markup page and hand it to the collector.
pub fn page_handle(site: Arc<Site>) -> Handler {
    Arc::new(move |unit, pages| {
        assert_not_finalized(unit);
        let Some(mut page) = unit.page.take() else {
            return Ok(DEFAULT_ROUTE.to_string());
        };

        // The page may end up on a different language site than the one
        // that did the initial read, so the assignment happens here.
        site.assign_site_by_language(&mut page);

        if page.rendered {
            panic!(
                "page {:?} already rendered, does not need conversion",
                page.source_path
            );
        }

        // Work on a copy of the raw content from now on.
        page.create_work_content_copy();

        if let Err(err) = page.process_shortcodes() {
            warn!(error = %err, "shortcode processing failed");
        }

        if site.config.enable_emoji {
            page.emojify();
        }

        page.replace_divider(&site.config.summary_divider);
        page.render_content();

        let _ = pages.send(page);
        unit.finalized = true;
        Ok(DEFAULT_ROUTE.to_string())
    })
}

/// Convert a raw HTML page: shortcodes only, the content already is HTML.
pub fn html_handle(_site: Arc<Site>) -> Handler {
    Arc::new(move |unit, pages| {
        assert_not_finalized(unit);
        let Some(mut page) = unit.page.take() else {
            return Ok(DEFAULT_ROUTE.to_string());
        };

        if page.rendered {
            panic!(
                "page {:?} already rendered, does not need conversion",
                page.source_path
            );
        }

        page.create_work_content_copy();

        if let Err(err) = page.process_shortcodes() {
            warn!(error = %err, "shortcode processing failed");
        }

        let _ = pages.send(page);
        unit.finalized = true;
        Ok(DEFAULT_ROUTE.to_string())
    })
}

/// Stream a non-content file unchanged to the publish collaborator.
pub fn copy_file(site: Arc<Site>) -> Handler {
    Arc::new(move |unit, _pages| {
        let mut reader = site.open_source(&unit.filename)?;
        site.publish(&unit.filename, reader.as_mut())?;
        Ok(DEFAULT_ROUTE.to_string())
    })
}

fn assert_not_finalized(unit: &crate::routing::WorkUnit) {
    if unit.finalized {
        panic!(
            "work item {:?} already finalized; re-dispatching a finished file is a routing bug",
            unit.filename
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::fs::OsFs;
    use crate::page::Page;
    use crate::routing::WorkUnit;
    use crate::test_helpers::write_source;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    fn site_with(config: SiteConfig, files: &[(&str, &str)]) -> (Arc<Site>, TempDir) {
        let tmp = TempDir::new().unwrap();
        let content = tmp.path().join("content");
        std::fs::create_dir_all(&content).unwrap();
        for (rel, body) in files {
            write_source(&content, rel, body);
        }
        let site = Site::new(
            config,
            Arc::new(OsFs),
            content,
            tmp.path().join("public"),
        );
        (Arc::new(site), tmp)
    }

    fn page_channel() -> (crate::routing::PageTx, mpsc::UnboundedReceiver<Page>) {
        mpsc::unbounded_channel()
    }

    // =========================================================================
    // first_step
    // =========================================================================

    #[test]
    fn first_step_routes_by_extension() {
        let (site, _tmp) =
            site_with(SiteConfig::default(), &[("post.md", "---\ntitle: T\n---\nBody")]);
        let (tx, mut rx) = page_channel();
        let mut unit = WorkUnit::single("post.md");

        let route = first_step(site)(&mut unit, &tx).unwrap();

        assert_eq!(route, "md");
        assert!(unit.page.is_some());
        assert!(rx.try_recv().is_err(), "buildable page is not sent yet");
    }

    #[test]
    fn first_step_routes_by_front_matter_markup() {
        let (site, _tmp) = site_with(
            SiteConfig::default(),
            &[("notes.rst", "---\nmarkup: md\n---\n# H")],
        );
        let (tx, _rx) = page_channel();
        let mut unit = WorkUnit::single("notes.rst");

        let route = first_step(site)(&mut unit, &tx).unwrap();

        assert_eq!(route, "md");
    }

    #[test]
    fn first_step_sends_skipped_drafts_straight_to_collector() {
        let (site, _tmp) = site_with(
            SiteConfig::default(),
            &[("draft.md", "---\ndraft: true\n---\nUnfinished")],
        );
        let (tx, mut rx) = page_channel();
        let mut unit = WorkUnit::single("draft.md");

        let route = first_step(site)(&mut unit, &tx).unwrap();

        assert_eq!(route, DEFAULT_ROUTE);
        assert!(unit.page.is_none());
        let page = rx.try_recv().unwrap();
        assert!(!page.rendered);
        assert!(page.front.draft);
    }

    #[test]
    fn first_step_fails_on_malformed_front_matter() {
        let (site, _tmp) = site_with(
            SiteConfig::default(),
            &[("bad.md", "---\ntitle: [unclosed\n---\nBody")],
        );
        let (tx, _rx) = page_channel();
        let mut unit = WorkUnit::single("bad.md");

        assert!(first_step(site)(&mut unit, &tx).is_err());
    }

    // =========================================================================
    // page_handle
    // =========================================================================

    #[test]
    fn page_handle_converts_and_collects() {
        let config = SiteConfig {
            enable_emoji: true,
            ..SiteConfig::default()
        };
        let (site, _tmp) = site_with(config, &[]);
        let (tx, mut rx) = page_channel();

        let mut unit = WorkUnit::single("post.md");
        let mut page = Page::new("post.md");
        page.raw_content =
            "Summary line :rocket:\n<!--more-->\n# Heading\n\nRest.".to_string();
        unit.page = Some(page);

        page_handle(site)(&mut unit, &tx).unwrap();

        assert!(unit.finalized);
        assert!(unit.page.is_none());

        let page = rx.try_recv().unwrap();
        assert!(page.rendered);
        assert_eq!(page.language, "en");
        assert_eq!(page.summary.as_deref(), Some("Summary line 🚀"));
        assert!(page.work_content.contains("<h1>Heading</h1>"));
    }

    #[test]
    fn page_handle_without_page_is_a_no_op() {
        let (site, _tmp) = site_with(SiteConfig::default(), &[]);
        let (tx, mut rx) = page_channel();
        let mut unit = WorkUnit::single("skipped.md");

        let route = page_handle(site)(&mut unit, &tx).unwrap();

        assert_eq!(route, DEFAULT_ROUTE);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    #[should_panic(expected = "already rendered")]
    fn page_handle_panics_on_rendered_page() {
        let (site, _tmp) = site_with(SiteConfig::default(), &[]);
        let (tx, _rx) = page_channel();

        let mut unit = WorkUnit::single("post.md");
        let mut page = Page::new("post.md");
        page.rendered = true;
        unit.page = Some(page);

        let _ = page_handle(site)(&mut unit, &tx);
    }

    #[test]
    #[should_panic(expected = "already finalized")]
    fn page_handle_panics_on_finalized_unit() {
        let (site, _tmp) = site_with(SiteConfig::default(), &[]);
        let (tx, _rx) = page_channel();

        let mut unit = WorkUnit::single("post.md");
        unit.finalized = true;

        let _ = page_handle(site)(&mut unit, &tx);
    }

    // =========================================================================
    // html_handle
    // =========================================================================

    #[test]
    fn html_handle_keeps_content_unrendered() {
        let (site, _tmp) = site_with(SiteConfig::default(), &[]);
        let (tx, mut rx) = page_channel();

        let mut unit = WorkUnit::single("page.html");
        let mut page = Page::new("page.html");
        page.raw_content = "<p># not a heading</p>".to_string();
        unit.page = Some(page);

        html_handle(site)(&mut unit, &tx).unwrap();

        let page = rx.try_recv().unwrap();
        assert!(!page.rendered);
        assert_eq!(page.work_content, "<p># not a heading</p>");
    }

    // =========================================================================
    // copy_file
    // =========================================================================

    #[test]
    fn copy_file_publishes_bytes_unchanged() {
        let (site, tmp) = site_with(SiteConfig::default(), &[("images/logo.png", "PNGBYTES")]);
        let (tx, mut rx) = page_channel();
        let mut unit = WorkUnit::single("images/logo.png");

        copy_file(site)(&mut unit, &tx).unwrap();

        let written = std::fs::read(tmp.path().join("public/images/logo.png")).unwrap();
        assert_eq!(written, b"PNGBYTES");
        assert!(rx.try_recv().is_err(), "assets produce no pages");
    }

    #[test]
    fn copy_file_fails_on_missing_source() {
        let (site, _tmp) = site_with(SiteConfig::default(), &[]);
        let (tx, _rx) = page_channel();
        let mut unit = WorkUnit::single("nope.png");

        assert!(copy_file(site)(&mut unit, &tx).is_err());
    }

    // =========================================================================
    // default registry, end to end per file
    // =========================================================================

    #[test]
    fn registry_renders_markdown_files() {
        let (site, _tmp) = site_with(
            SiteConfig::default(),
            &[("post.md", "---\ntitle: T\n---\n# Hello")],
        );
        let pipes = default_pipelines(site);
        let (tx, mut rx) = page_channel();

        let mut unit = WorkUnit::single("post.md");
        pipes.dispatch(&mut unit, &tx).unwrap();

        let page = rx.try_recv().unwrap();
        assert!(page.rendered);
        assert!(page.work_content.contains("<h1>Hello</h1>"));
    }

    #[test]
    fn registry_diverts_html_files_to_html_handler() {
        let (site, _tmp) = site_with(
            SiteConfig::default(),
            &[("page.html", "---\ntitle: T\n---\n<h1>Raw</h1>")],
        );
        let pipes = default_pipelines(site);
        let (tx, mut rx) = page_channel();

        let mut unit = WorkUnit::single("page.html");
        pipes.dispatch(&mut unit, &tx).unwrap();

        let page = rx.try_recv().unwrap();
        assert!(!page.rendered);
        assert_eq!(page.work_content, "<h1>Raw</h1>");
    }

    #[test]
    fn registry_copies_unknown_files() {
        let (site, tmp) = site_with(SiteConfig::default(), &[("data.bin", "BYTES")]);
        let pipes = default_pipelines(site);
        let (tx, _rx) = page_channel();

        let mut unit = WorkUnit::single("data.bin");
        pipes.dispatch(&mut unit, &tx).unwrap();

        assert!(tmp.path().join("public/data.bin").exists());
    }

    #[test]
    fn registry_respects_markup_override_for_html_route() {
        // A .md file whose front matter declares `markup: html` diverges to
        // the html handler at stage two.
        let (site, _tmp) = site_with(
            SiteConfig::default(),
            &[("odd.md", "---\nmarkup: html\n---\n<b>kept</b>")],
        );
        let pipes = default_pipelines(site);
        let (tx, mut rx) = page_channel();

        let mut unit = WorkUnit::single("odd.md");
        pipes.dispatch(&mut unit, &tx).unwrap();

        let page = rx.try_recv().unwrap();
        assert!(!page.rendered);
        assert_eq!(page.work_content, "<b>kept</b>");
    }
}

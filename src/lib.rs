//! # Bindery
//!
//! The content-ingestion core of a static site build: walk a content tree,
//! classify directories into standalone files and *bundles* (a directory
//! whose contents form one addressable unit, like a page with co-located
//! images), and turn every file concurrently into either a renderable page
//! or a pass-through asset.
//!
//! # Architecture: Capture, Route, Process
//!
//! A build runs in two phases over three cooperating pieces:
//!
//! ```text
//! 1. Capture   content/  →  singles + bundles   (synchronous tree walk)
//! 2. Process   captured  →  pages + assets      (worker pool + collector)
//!                 │
//!                 └── each file dispatched through the handler registry
//! ```
//!
//! The capture pass is a plain recursive walk with symlink-cycle protection;
//! all concurrency lives in the processing phase, where a pool of worker
//! tasks drains the captured work and a single collector task owns the page
//! collection. Handlers are registered up front in a routing table keyed by
//! file extension, so "what happens to a `.md` file" is data you can inspect
//! and test, not a chain of `if`s.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`capture`] | Walks the content tree, classifies bundles, produces the capture result |
//! | [`bundler`] | Orchestrates the worker pool, conduits, collector and cancellation |
//! | [`routing`] | Extension-keyed registry of handler chains and the dispatch loop |
//! | [`handlers`] | The default handler set: front matter, conversion, HTML, copy |
//! | [`page`] | Page type, front matter decoding, content transforms, rendering |
//! | [`site`] | Build-wide context: config, language assignment, publishing |
//! | [`config`] | `config.toml` loading and validation |
//! | [`fs`] | Source filesystem abstraction (cycle-safe, race-tolerant) |
//!
//! # Design Decisions
//!
//! ## Single-Writer Page Collection
//!
//! Workers never touch the page collection. They send finished pages over a
//! conduit to the one collector task that owns the collection outright and
//! performs the single terminal sort. Exactly one mutator means no locking
//! and no ordering surprises: the final order is a property of the sort key,
//! never of task scheduling.
//!
//! ## Routing as Data
//!
//! The handler registry is a mapping of mappings — extension → stages →
//! route key → handler — built once before processing starts and read-only
//! afterwards. Misconfiguration (duplicate route keys, duplicate extension
//! registration) fails at build time, before any file is touched.
//!
//! ## Fail the Run, Not the File
//!
//! There are no retries and no skipped failures: the first handler error
//! cancels outstanding work and fails the build, because a silently partial
//! page set produces an inconsistent site. Only genuinely benign races —
//! a file deleted between directory listing and stat — are tolerated.
//!
//! ## Bundles Absorb Differently by Kind
//!
//! A leaf bundle (`index.*`) owns its entire subtree; a branch bundle
//! (`_index.*`) owns only its own directory, and descendant files become
//! standalone singles instead. Mixing nested subtrees into section bundles
//! would make resource ownership ambiguous, so the asymmetry is deliberate
//! and load-bearing.

pub mod bundler;
pub mod capture;
pub mod config;
pub mod fs;
pub mod handlers;
pub mod page;
pub mod routing;
pub mod site;

#[cfg(test)]
pub(crate) mod test_helpers;

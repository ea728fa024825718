//! Handler routing tables.
//!
//! Content processing is a small interpreted state machine. A file's
//! extension selects a [`Pipeline`]; a pipeline is an ordered chain of
//! [`Stage`]s; each stage maps a *route key* to a handler. Dispatch starts
//! at the wildcard key, runs the matching handler of each stage in turn, and
//! adopts the handler's returned key as the next route key. The chain stops
//! at an empty key or when the stages run out.
//!
//! The whole registry is plain data built once before processing starts, so
//! it can be inspected and tested without touching any file I/O, and shared
//! read-only across any number of workers.
//!
//! Misconfiguration — registering two handlers for one route key in the same
//! stage, or two pipelines for one extension — panics at build time, before
//! a single file is processed.

use crate::capture::BundleDir;
use crate::page::{Page, PageError};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

/// Route key selecting handlers within a stage. `*` is the wildcard.
pub type RouteKey = String;

/// The reserved wildcard/default route key.
pub const DEFAULT_ROUTE: &str = "*";

/// Sending half of the page conduit handlers emit finished pages into.
pub type PageTx = UnboundedSender<Page>;

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error(transparent)]
    Page(#[from] PageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-file unit of work carried through one handler chain.
///
/// Created when a worker dequeues a path, destroyed when the chain ends.
pub struct WorkUnit {
    /// The bundle this file belongs to, if any. Resources can consult the
    /// owner through this.
    pub bundle: Option<BundleDir>,
    /// Source path relative to the content root.
    pub filename: PathBuf,
    /// The in-progress page, once a handler constructs one.
    pub page: Option<Page>,
    /// Set once the unit's page has been handed to the collector. Handlers
    /// must refuse to touch a finalized unit.
    pub finalized: bool,
}

impl WorkUnit {
    pub fn single(filename: impl Into<PathBuf>) -> Self {
        Self {
            bundle: None,
            filename: filename.into(),
            page: None,
            finalized: false,
        }
    }

    pub fn bundled(filename: impl Into<PathBuf>, bundle: BundleDir) -> Self {
        Self {
            bundle: Some(bundle),
            filename: filename.into(),
            page: None,
            finalized: false,
        }
    }
}

/// A handler: one idempotent processing step.
///
/// Returns the next route key; an empty key ends the chain early.
pub type Handler =
    Arc<dyn Fn(&mut WorkUnit, &PageTx) -> Result<RouteKey, HandlerError> + Send + Sync>;

/// One step of a pipeline: a routing table with a default handler.
pub struct Stage {
    default: Handler,
    overrides: HashMap<RouteKey, Handler>,
}

impl Stage {
    fn new(default: Handler) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    fn add(&mut self, key: &str, handler: Handler) {
        if key == DEFAULT_ROUTE {
            panic!("route key {DEFAULT_ROUTE:?} is reserved for the stage default");
        }
        if self.overrides.insert(key.to_string(), handler).is_some() {
            panic!("handler with route key {key:?} already registered in this stage");
        }
    }

    /// Resolve a route key, falling back to the stage default.
    pub fn get(&self, key: &str) -> &Handler {
        self.overrides.get(key).unwrap_or(&self.default)
    }
}

/// An ordered chain of stages for one group of extensions.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Append a stage with `handler` as its default.
    pub fn stage(&mut self, handler: Handler) -> &mut Self {
        self.stages.push(Stage::new(handler));
        self
    }

    /// Register `handler` for specific route keys on the most recent stage.
    pub fn or(&mut self, handler: Handler, keys: &[&str]) -> &mut Self {
        let stage = self
            .stages
            .last_mut()
            .unwrap_or_else(|| panic!("or() requires a stage to attach to"));
        for key in keys {
            stage.add(key, handler.clone());
        }
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }
}

/// The full registry: extension → pipeline, with a wildcard fallback.
#[derive(Default)]
pub struct Pipelines {
    by_ext: HashMap<String, usize>,
    pipes: Vec<Pipeline>,
}

impl Pipelines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a pipeline shared by all the given extensions.
    pub fn for_extensions(&mut self, extensions: &[&str]) -> &mut Pipeline {
        let index = self.pipes.len();
        self.pipes.push(Pipeline::default());
        for ext in extensions {
            let ext = ext.trim_start_matches('.').to_lowercase();
            if self.by_ext.insert(ext.clone(), index).is_some() {
                panic!("pipeline for extension {ext:?} already registered");
            }
        }
        &mut self.pipes[index]
    }

    /// Start the wildcard pipeline used for files with no registered
    /// extension.
    pub fn for_unknown_files(&mut self) -> &mut Pipeline {
        self.for_extensions(&[DEFAULT_ROUTE])
    }

    /// Pipeline for an extension, falling back to the wildcard one.
    pub fn matching_or_default(&self, ext: &str) -> Option<&Pipeline> {
        let ext = ext.trim_start_matches('.').to_lowercase();
        self.by_ext
            .get(&ext)
            .or_else(|| self.by_ext.get(DEFAULT_ROUTE))
            .map(|&i| &self.pipes[i])
    }

    /// Run one file through its pipeline.
    ///
    /// Any handler error aborts the chain for this file and propagates.
    pub fn dispatch(&self, unit: &mut WorkUnit, pages: &PageTx) -> Result<(), HandlerError> {
        let ext = unit
            .filename
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let Some(pipeline) = self.matching_or_default(&ext) else {
            return Ok(());
        };

        let mut route: RouteKey = DEFAULT_ROUTE.to_string();
        for stage in pipeline.stages() {
            let handler = stage.get(&route);
            route = handler(unit, pages)?;
            if route.is_empty() {
                // End of pipe.
                break;
            }
        }
        Ok(())
    }
}

//! Source store and its persistence contract.
//!
//! The store is an ordered in-memory collection; persistence is a narrow
//! whole-collection-replace contract so any key/value or blob backend can
//! satisfy it. Persistence writes are fire-and-forget relative to the
//! in-memory state: a failed write is logged and swallowed, and the
//! in-memory collection remains authoritative for the session.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::warn;

use crate::models::{Category, Source, SourceDraft};

/// Persistence contract for the source collection.
///
/// `save` replaces the entire stored collection — there are no incremental
/// writes. `load` returns an empty collection when nothing was stored yet.
pub trait SourceRepository: Send + Sync {
    fn load(&self) -> Result<Vec<Source>>;
    fn save(&self, sources: &[Source]) -> Result<()>;
}

/// JSON-file-backed repository. One file, rewritten on every save.
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SourceRepository for JsonFileRepository {
    fn load(&self) -> Result<Vec<Source>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read source store: {}", self.path.display()))?;
        serde_json::from_str(&content).with_context(|| "Failed to parse source store")
    }

    fn save(&self, sources: &[Source]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(sources)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write source store: {}", self.path.display()))
    }
}

/// In-memory repository for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryRepository {
    inner: std::sync::Mutex<Vec<Source>>,
}

impl SourceRepository for MemoryRepository {
    fn load(&self) -> Result<Vec<Source>> {
        Ok(self.inner.lock().expect("repository lock poisoned").clone())
    }

    fn save(&self, sources: &[Source]) -> Result<()> {
        *self.inner.lock().expect("repository lock poisoned") = sources.to_vec();
        Ok(())
    }
}

/// Ordered collection of sources with insertion-order listing.
///
/// The store has no notion of the session's focused source; callers that
/// remove a focused source must clear their own focus.
pub struct SourceStore {
    sources: Vec<Source>,
    repository: Option<Box<dyn SourceRepository>>,
}

impl SourceStore {
    /// An ephemeral store with no persistence.
    pub fn in_memory() -> Self {
        Self {
            sources: Vec::new(),
            repository: None,
        }
    }

    /// A store backed by a repository. The initial collection comes from
    /// `load`; a load failure degrades to an empty store with a warning.
    pub fn with_repository(repository: Box<dyn SourceRepository>) -> Self {
        let sources = match repository.load() {
            Ok(sources) => sources,
            Err(e) => {
                warn!("failed to load stored sources, starting empty: {:#}", e);
                Vec::new()
            }
        };
        Self {
            sources,
            repository: Some(repository),
        }
    }

    /// Insert a new source at the end of the collection and return it.
    pub fn add(&mut self, draft: SourceDraft) -> &Source {
        let source = draft.into_source();
        self.sources.push(source);
        self.persist();
        self.sources.last().expect("just pushed")
    }

    /// Remove a source by id. No-op (and idempotent) when absent.
    pub fn remove(&mut self, id: &str) {
        let before = self.sources.len();
        self.sources.retain(|s| s.id != id);
        if self.sources.len() != before {
            self.persist();
        }
    }

    /// All sources of one category, in insertion order.
    pub fn list_by_category(&self, category: Category) -> Vec<&Source> {
        self.sources
            .iter()
            .filter(|s| s.category == category)
            .collect()
    }

    /// Flip the participation flag of one source. No-op when absent.
    pub fn set_selected(&mut self, id: &str, selected: bool) {
        if let Some(source) = self.sources.iter_mut().find(|s| s.id == id) {
            source.selected = selected;
            self.persist();
        }
    }

    /// Remove every source.
    pub fn clear(&mut self) {
        if !self.sources.is_empty() {
            self.sources.clear();
            self.persist();
        }
    }

    pub fn all(&self) -> &[Source] {
        &self.sources
    }

    pub fn get(&self, id: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    fn persist(&self) {
        if let Some(repo) = &self.repository {
            if let Err(e) = repo.save(&self.sources) {
                // In-memory state stays authoritative.
                warn!("failed to persist sources: {:#}", e);
            }
        }
    }
}

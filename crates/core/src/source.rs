use std::collections::HashMap;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::fs::local::LocalFs;
use crate::fs::SourceFs;

/// One named, independently-rooted filesystem: a name paired with an
/// implementation of the filesystem trait.
#[derive(Clone)]
pub struct Source {
    pub name: Arc<str>,
    pub fs: Arc<dyn SourceFs>,
}

impl Source {
    pub fn new(name: impl Into<Arc<str>>, fs: Arc<dyn SourceFs>) -> Self {
        Self { name: name.into(), fs }
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source").field("name", &self.name).finish_non_exhaustive()
    }
}

/// The process-wide, immutable set of configured sources. Built once at
/// startup from [`EngineConfig::sources`] and shared behind an `Arc`.
/// Fan-out operations address sources by name; an unrecognized name in
/// `filter_fs` is simply not present among the results rather than an
/// error.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    sources: HashMap<Arc<str>, Source>,
    /// Preserves config order so tree merges and fan-out iterate sources
    /// deterministically rather than by hash order.
    order: Vec<Arc<str>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: Source) {
        if !self.sources.contains_key(&source.name) {
            self.order.push(source.name.clone());
        }
        self.sources.insert(source.name.clone(), source);
    }

    pub fn get(&self, name: &str) -> Option<&Source> {
        self.sources.get(name)
    }

    /// All sources in configured order, or — when `filter` is non-empty —
    /// only those whose name is in `filter`. Unknown names in `filter`
    /// are simply absent from the result, never an error.
    pub fn selected<'a>(&'a self, filter: &std::collections::HashSet<String>) -> Vec<&'a Source> {
        self.order
            .iter()
            .filter_map(|name| self.sources.get(name))
            .filter(|s| filter.is_empty() || filter.contains(&*s.name))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Builds a [`Registry`] of [`LocalFs`]-backed sources from the
/// configured `sources` list.
pub fn registry_from_config(config: &EngineConfig) -> Result<Registry> {
    let mut registry = Registry::new();
    for entry in &config.sources {
        if entry.name.is_empty() {
            return Err(EngineError::UnknownSource("source entry has an empty name".to_string()));
        }
        let fs: Arc<dyn SourceFs> = Arc::new(LocalFs::new(&entry.path));
        registry.insert(Source::new(entry.name.clone(), fs));
    }
    Ok(registry)
}

use std::collections::HashSet;

use crate::config::EngineConfig;

/// The configured sets of directory basenames and file extensions that
/// are skipped during walks.
#[derive(Debug, Clone, Default)]
pub struct ExclusionPolicy {
    exclude_dirs: HashSet<String>,
    exclude_extensions: HashSet<String>,
}

impl ExclusionPolicy {
    pub fn new(exclude_dirs: impl IntoIterator<Item = String>, exclude_extensions: impl IntoIterator<Item = String>) -> Self {
        Self {
            exclude_dirs: exclude_dirs.into_iter().collect(),
            exclude_extensions: exclude_extensions.into_iter().collect(),
        }
    }

    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self::new(cfg.exclude_dirs.iter().cloned(), cfg.exclude_extensions.iter().cloned())
    }

    /// Whether a directory with this basename should be pruned from a
    /// walk entirely, skipping everything beneath it.
    pub fn should_skip_dir(&self, basename: &str) -> bool {
        self.exclude_dirs.contains(basename)
    }

    /// Whether a file with this extension (leading dot included) should
    /// be skipped.
    pub fn should_skip_file(&self, extension: Option<&str>) -> bool {
        match extension {
            Some(ext) => self.exclude_extensions.contains(ext),
            None => false,
        }
    }
}

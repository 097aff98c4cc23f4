use std::path::{Path as StdPath, PathBuf};

use async_trait::async_trait;
use ignore::{WalkBuilder, WalkState};
use tokio::sync::mpsc;
use tracing::warn;

use crate::exclude::ExclusionPolicy;
use crate::fs::{ReadableByteStream, SourceFs, Stat, WalkEntry};
use crate::path::LogPath;

/// A source backed by a directory on the local filesystem, rooted at
/// `root`. All paths handed to this implementation are confined under
/// `root`.
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &StdPath {
        &self.root
    }
}

#[async_trait]
impl SourceFs for LocalFs {
    async fn open(&self, path: &LogPath) -> std::io::Result<ReadableByteStream> {
        let abs = path.resolve_under(&self.root);
        let file = tokio::fs::File::open(abs).await?;
        Ok(Box::pin(file))
    }

    async fn lstat(&self, path: &LogPath) -> std::io::Result<Stat> {
        let abs = path.resolve_under(&self.root);
        let meta = tokio::fs::symlink_metadata(abs).await?;
        Ok(Stat { size: meta.len(), is_dir: meta.is_dir() })
    }

    fn walk(&self, path: LogPath, policy: ExclusionPolicy) -> mpsc::Receiver<WalkEntry> {
        let abs_start = path.resolve_under(&self.root);
        let (tx, rx) = mpsc::channel(256);

        // A blocking producer driving `ignore::WalkBuilder`'s parallel
        // walker, pushed into an async-visible channel. The exclusion
        // policy is applied via `filter_entry`, and the emitted path is
        // rebased onto the source-relative `path` rather than an
        // absolute filesystem path.
        tokio::task::spawn_blocking(move || {
            let mut builder = WalkBuilder::new(&abs_start);
            builder
                .standard_filters(false)
                .hidden(false)
                .follow_links(false)
                .threads(4);

            let policy_for_filter = policy.clone();
            builder.filter_entry(move |entry| match entry.file_type() {
                Some(ft) if ft.is_dir() => {
                    let name = entry.file_name().to_string_lossy();
                    !policy_for_filter.should_skip_dir(&name)
                }
                _ => {
                    let ext = entry
                        .path()
                        .extension()
                        .map(|e| format!(".{}", e.to_string_lossy()));
                    !policy_for_filter.should_skip_file(ext.as_deref())
                }
            });

            let walker = builder.build_parallel();
            walker.run(|| {
                let tx = tx.clone();
                let abs_start = abs_start.clone();
                let base = path.clone();
                Box::new(move |entry| {
                    let entry = match entry {
                        Ok(e) => e,
                        Err(err) => {
                            warn!(error = %err, "walk entry error, skipping");
                            return WalkState::Continue;
                        }
                    };

                    if entry.path() == abs_start {
                        return WalkState::Continue;
                    }

                    let meta = match entry.metadata() {
                        Ok(m) => m,
                        Err(err) => {
                            warn!(path = %entry.path().display(), error = %err, "lstat failed during walk, skipping");
                            return WalkState::Continue;
                        }
                    };

                    let rel = entry.path().strip_prefix(&abs_start).unwrap_or(entry.path());
                    let log_path = base.joined(
                        &rel.components()
                            .map(|c| c.as_os_str().to_string_lossy().into_owned())
                            .collect::<Vec<_>>(),
                    );

                    let walk_entry = WalkEntry {
                        path: log_path,
                        stat: Stat { size: meta.len(), is_dir: meta.is_dir() },
                    };

                    if tx.blocking_send(walk_entry).is_err() {
                        return WalkState::Quit;
                    }

                    WalkState::Continue
                })
            });
        });

        rx
    }
}

pub mod local;

use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;

use crate::exclude::ExclusionPolicy;
use crate::path::LogPath;

/// A readable byte stream opened from a source.
pub type ReadableByteStream = Pin<Box<dyn AsyncRead + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub size: u64,
    pub is_dir: bool,
}

/// One entry produced by a source's walk, already past the exclusion
/// policy (pruned directories and skipped extensions never reach the
/// consumer).
#[derive(Debug, Clone)]
pub struct WalkEntry {
    pub path: LogPath,
    pub stat: Stat,
}

/// What the core requires of a source backend. Implemented for a local
/// filesystem root in [`local::LocalFs`]; SSH/SFTP- and archive-backed
/// sources are out of scope for the core but can implement this trait
/// without the core changing.
#[async_trait]
pub trait SourceFs: Send + Sync + 'static {
    async fn open(&self, path: &LogPath) -> std::io::Result<ReadableByteStream>;

    async fn lstat(&self, path: &LogPath) -> std::io::Result<Stat>;

    /// Walk starting at `path`, applying `policy` to prune directories
    /// and skip files as it goes. Walker errors are logged by the
    /// implementation and never surfaced on the channel — a failed walk
    /// looks identical to an empty one to the caller.
    ///
    /// Walking order is unspecified.
    fn walk(&self, path: LogPath, policy: ExclusionPolicy) -> mpsc::Receiver<WalkEntry>;

    fn join(&self, segments: &[String]) -> LogPath {
        LogPath::from_segments(segments.iter().cloned())
    }
}

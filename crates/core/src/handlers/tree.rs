use std::collections::HashSet;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::exclude::ExclusionPolicy;
use crate::model::{Meta, Response};
use crate::path::LogPath;
use crate::source::Registry;
use crate::tree::cache::TreeCache;
use crate::tree::{build_tree, filter_by_source};

/// `get-file-tree`: cache lookup, fan out a walk per source on miss,
/// then apply `filter_fs` to the cached, unfiltered tree before
/// emitting.
pub async fn handle(
    meta: Meta,
    base: LogPath,
    filter_fs: HashSet<String>,
    registry: &Registry,
    cache: &TreeCache,
    config: &EngineConfig,
    cancel: &CancellationToken,
    out: &mpsc::Sender<Response>,
) {
    let key = base.as_key();
    let ttl = config.cache_expiration();

    let merged = match cache.get(&key, ttl) {
        Some(tree) => tree,
        None => {
            let policy = ExclusionPolicy::from_config(config);
            let sources = registry.selected(&HashSet::new());
            let tree = build_tree(&sources, &base, &policy, cancel).await;
            cache.insert(key, tree.clone());
            tree
        }
    };

    if cancel.is_cancelled() {
        return;
    }

    let filtered = filter_by_source(&merged, &filter_fs);
    let _ = out.send(Response::tree(meta, filtered)).await;
}

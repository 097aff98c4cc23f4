use std::collections::HashSet;

use regex::Regex;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::exclude::ExclusionPolicy;
use crate::model::{Meta, Response, TimeFilter};
use crate::parser::ParserDispatch;
use crate::path::LogPath;
use crate::reader::{scan_file, ScanRequest};
use crate::source::Registry;

/// `search`: compile once, then per filtered source walk `base` and
/// scan every visited file serially within that source's task — one
/// fan-out task per source, no further fan-out per file.
pub async fn handle(
    meta: Meta,
    base: LogPath,
    pattern: String,
    filter_fs: HashSet<String>,
    filter_time: TimeFilter,
    registry: &Registry,
    dispatch: &ParserDispatch,
    config: &EngineConfig,
    cancel: &CancellationToken,
    out: &mpsc::Sender<Response>,
) {
    let regex = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(err) => {
            let _ = out.send(Response::error(meta.clone(), err.to_string())).await;
            return;
        }
    };

    let sources = registry.selected(&filter_fs);
    let policy = ExclusionPolicy::from_config(config);

    let content_batch_size = config.content_batch_size;
    let content_batch_time = config.content_batch_time();
    let search_max_size = config.search_max_size;
    let legacy_time_filter = config.legacy_time_filter;

    let mut tasks = JoinSet::new();

    for source in sources {
        let source = source.clone();
        let dispatch = dispatch.clone();
        let base = base.clone();
        let policy = policy.clone();
        let regex = regex.clone();
        let meta = meta.clone();
        let cancel = cancel.clone();
        let out = out.clone();

        tasks.spawn(async move {
            if cancel.is_cancelled() {
                return;
            }
            let mut walk = source.fs.walk(base, policy);
            while let Some(entry) = walk.recv().await {
                if cancel.is_cancelled() {
                    return;
                }
                if entry.stat.is_dir {
                    continue;
                }
                let req = ScanRequest {
                    meta: meta.clone(),
                    path: entry.path,
                    regex: Some(regex.clone()),
                    filter_time,
                    search_max_size,
                    content_batch_size,
                    content_batch_time,
                    legacy_time_filter,
                };
                scan_file(&source, &dispatch, req, &cancel, &out).await;
            }
        });
    }

    while tasks.join_next().await.is_some() {}
}

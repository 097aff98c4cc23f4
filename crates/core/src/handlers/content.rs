use std::collections::HashSet;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::model::{Meta, Response, TimeFilter};
use crate::parser::ParserDispatch;
use crate::path::LogPath;
use crate::reader::{scan_file, ScanRequest};
use crate::source::Registry;

/// `get-content`: one reader per filtered source, no regex, streamed
/// until each source's scan ends.
pub async fn handle(
    meta: Meta,
    path: LogPath,
    filter_fs: HashSet<String>,
    filter_time: TimeFilter,
    registry: &Registry,
    dispatch: &ParserDispatch,
    config: &EngineConfig,
    cancel: &CancellationToken,
    out: &mpsc::Sender<Response>,
) {
    let sources = registry.selected(&filter_fs);
    let mut tasks = JoinSet::new();

    let content_batch_size = config.content_batch_size;
    let content_batch_time = config.content_batch_time();
    let search_max_size = config.search_max_size;
    let legacy_time_filter = config.legacy_time_filter;

    for source in sources {
        let source = source.clone();
        let dispatch = dispatch.clone();
        let path = path.clone();
        let meta = meta.clone();
        let cancel = cancel.clone();
        let out = out.clone();

        tasks.spawn(async move {
            if cancel.is_cancelled() {
                return;
            }
            if let Ok(stat) = source.fs.lstat(&path).await {
                if stat.is_dir {
                    return;
                }
            }
            let req = ScanRequest {
                meta,
                path,
                regex: None,
                filter_time,
                search_max_size,
                content_batch_size,
                content_batch_time,
                legacy_time_filter,
            };
            scan_file(&source, &dispatch, req, &cancel, &out).await;
        });
    }

    while tasks.join_next().await.is_some() {}
}

pub mod cache;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::exclude::ExclusionPolicy;
use crate::model::{File, FileInstance};
use crate::path::LogPath;
use crate::source::Source;

/// Mutex-protected merge target for per-source walks. `index` tracks
/// the position of each already-seen `key` so a second sighting appends
/// an instance instead of a new node.
#[derive(Default)]
struct Combiner {
    index: HashMap<String, usize>,
    files: Vec<File>,
}

impl Combiner {
    fn record(&mut self, key: String, path: LogPath, is_dir: bool, instance: FileInstance) {
        match self.index.get(&key) {
            Some(&idx) => self.files[idx].instances.push(instance),
            None => {
                let idx = self.files.len();
                self.files.push(File { key: key.clone(), path, is_dir, instances: vec![instance] });
                self.index.insert(key, idx);
            }
        }
    }
}

/// Walks every source under `base`, merging results into a single
/// unordered list of [`File`] nodes. Insertion order is nondeterministic
/// because source walks race; callers must not depend on it.
pub async fn build_tree(
    sources: &[&Source],
    base: &LogPath,
    policy: &ExclusionPolicy,
    cancel: &CancellationToken,
) -> Vec<File> {
    let combiner = Arc::new(Mutex::new(Combiner::default()));
    let mut tasks = JoinSet::new();

    for source in sources {
        let fs = source.fs.clone();
        let name: Arc<str> = source.name.clone();
        let base = base.clone();
        let policy = policy.clone();
        let combiner = combiner.clone();
        let cancel = cancel.clone();

        tasks.spawn(async move {
            if cancel.is_cancelled() {
                return;
            }
            let mut rx = fs.walk(base, policy);
            while let Some(entry) = rx.recv().await {
                if cancel.is_cancelled() {
                    break;
                }
                let key = entry.path.as_key();
                let instance = FileInstance { size: entry.stat.size, fs: name.to_string() };
                combiner.lock().record(key, entry.path, entry.stat.is_dir, instance);
            }
        });
    }

    while tasks.join_next().await.is_some() {}

    Arc::try_unwrap(combiner).map(|m| m.into_inner().files).unwrap_or_else(|arc| arc.lock().files.clone())
}

/// Applies `filter_fs` to an already-merged tree: drop instances whose
/// source isn't in the filter, then drop files left with no instances.
/// An empty filter passes everything through.
pub fn filter_by_source(tree: &[File], filter_fs: &HashSet<String>) -> Vec<File> {
    if filter_fs.is_empty() {
        return tree.to_vec();
    }
    tree.iter()
        .filter_map(|file| {
            let instances: Vec<FileInstance> =
                file.instances.iter().filter(|inst| filter_fs.contains(&inst.fs)).cloned().collect();
            if instances.is_empty() {
                None
            } else {
                Some(File { key: file.key.clone(), path: file.path.clone(), is_dir: file.is_dir, instances })
            }
        })
        .collect()
}

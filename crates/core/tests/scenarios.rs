use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use ferri_core::config::EngineConfig;
use ferri_core::dispatcher::{Dispatcher, EngineShared};
use ferri_core::fs::local::LocalFs;
use ferri_core::model::{Action, Log, Meta, Request, Response, WireTimeFilter};
use ferri_core::parser::ParserDispatch;
use ferri_core::path::LogPath;
use ferri_core::source::{Registry, Source};
use ferri_core::tree::cache::TreeCache;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Three-source fixture mirroring the scenarios above: `node1` carries a
/// multi-line structured log and the only copy of a matching line;
/// `service1.log` exists (non-empty only in `node1`) everywhere;
/// `service2.log` exists, empty, only in `node1`/`node2`.
fn fixture() -> (Vec<tempfile::TempDir>, Registry) {
    let node1 = tempfile::tempdir().unwrap();
    let node2 = tempfile::tempdir().unwrap();
    let node3 = tempfile::tempdir().unwrap();

    std::fs::write(
        node1.path().join("mancala.stratolog"),
        concat!(
            r#"{"msg":"booting up","level":"INFO","time":"2024-10-01T05:40:46Z"}"#,
            "\n",
            r#"{"msg":"seen 2d03c436-c197-464f-9ad0-d861e650cd61 in request","level":"INFO","time":"2024-10-01T05:40:47Z"}"#,
            "\n",
            r#"{"msg":"still running","level":"INFO","time":"2024-10-01T05:40:48Z"}"#,
            "\n",
            r#"{"msg":"boom\nat foo.rs:1\nat bar.rs:2","level":"ERROR","time":"2024-10-01T05:40:49Z"}"#,
            "\n",
        ),
    )
    .unwrap();

    std::fs::write(node1.path().join("service1.log"), "find me\n").unwrap();
    std::fs::write(node2.path().join("service1.log"), "").unwrap();
    std::fs::write(node3.path().join("service1.log"), "").unwrap();

    std::fs::write(node1.path().join("service2.log"), "").unwrap();
    std::fs::write(node2.path().join("service2.log"), "").unwrap();
    // node3 intentionally has no service2.log: silent non-participation.

    let mut registry = Registry::new();
    registry.insert(Source::new("node1", Arc::new(LocalFs::new(node1.path())) as Arc<dyn ferri_core::fs::SourceFs>));
    registry.insert(Source::new("node2", Arc::new(LocalFs::new(node2.path())) as Arc<dyn ferri_core::fs::SourceFs>));
    registry.insert(Source::new("node3", Arc::new(LocalFs::new(node3.path())) as Arc<dyn ferri_core::fs::SourceFs>));

    (vec![node1, node2, node3], registry)
}

fn shared(registry: Registry) -> Arc<EngineShared> {
    Arc::new(EngineShared {
        registry,
        dispatch: ParserDispatch::default(),
        config: EngineConfig::default(),
        cache: TreeCache::new(),
    })
}

fn request(id: i64, action: Action) -> Request {
    Request {
        meta: Meta::for_request(id, action),
        path: None,
        base_path: None,
        regexp: None,
        filter_fs: HashSet::new(),
        filter_time: WireTimeFilter::default(),
    }
}

/// Drains `rx` until the terminal marker for `id` arrives, returning every
/// response seen along the way (including the terminal one).
async fn drain_until_finished(rx: &mut mpsc::Receiver<Response>, id: i64) -> Vec<Response> {
    let mut collected = Vec::new();
    timeout(Duration::from_secs(5), async {
        loop {
            let resp = rx.recv().await.expect("channel closed before terminal marker");
            let is_terminal = resp.meta.id == id && resp.finished == Some(true);
            collected.push(resp);
            if is_terminal {
                break;
            }
        }
    })
    .await
    .expect("timed out waiting for terminal marker");
    collected
}

#[tokio::test]
async fn scenario_1_get_content_multiline_stratolog() {
    let (_dirs, registry) = fixture();
    let (tx, mut rx) = mpsc::channel(64);
    let dispatcher = Dispatcher::new(shared(registry), tx);

    let mut req = request(1, Action::GetContent);
    req.path = Some(LogPath::from_segments(["mancala.stratolog".to_string()]));
    dispatcher.accept(req);

    let responses = drain_until_finished(&mut rx, 1).await;
    let lines: Vec<Log> = responses.into_iter().filter_map(|r| r.lines).flatten().collect();

    assert_eq!(lines.len(), 4);
    for (i, line) in lines.iter().enumerate() {
        assert_eq!(line.line, (i + 1) as u64);
    }
    for line in &lines[..3] {
        assert_eq!(line.level, "INFO");
    }
    assert_eq!(lines[3].level, "ERROR");
    assert!(lines[3].msg.contains("at foo.rs:1"));
    assert!(lines[3].msg.contains("at bar.rs:2"));
}

#[tokio::test]
async fn scenario_2_get_content_empty_file_across_two_sources() {
    let (_dirs, registry) = fixture();
    let (tx, mut rx) = mpsc::channel(64);
    let dispatcher = Dispatcher::new(shared(registry), tx);

    let mut req = request(2, Action::GetContent);
    req.path = Some(LogPath::from_segments(["service2.log".to_string()]));
    dispatcher.accept(req);

    let responses = drain_until_finished(&mut rx, 2).await;
    let payloads: Vec<_> = responses.iter().filter(|r| r.lines.is_some()).collect();

    assert_eq!(payloads.len(), 2);
    let mut seen: Vec<&str> = payloads.iter().map(|r| r.meta.fs.as_deref().unwrap()).collect();
    seen.sort();
    assert_eq!(seen, vec!["node1", "node2"]);
    for resp in &payloads {
        assert_eq!(resp.lines, Some(vec![]));
    }
}

#[tokio::test]
async fn scenario_3_get_content_partial_file() {
    let (_dirs, registry) = fixture();
    let (tx, mut rx) = mpsc::channel(64);
    let dispatcher = Dispatcher::new(shared(registry), tx);

    let mut req = request(3, Action::GetContent);
    req.path = Some(LogPath::from_segments(["service1.log".to_string()]));
    dispatcher.accept(req);

    let responses = drain_until_finished(&mut rx, 3).await;
    let payloads: Vec<_> = responses.iter().filter(|r| r.lines.is_some()).collect();
    assert_eq!(payloads.len(), 3);

    let node1_resp = payloads.iter().find(|r| r.meta.fs.as_deref() == Some("node1")).unwrap();
    let lines = node1_resp.lines.as_ref().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].msg, "find me");
    assert_eq!(lines[0].line, 1);

    for name in ["node2", "node3"] {
        let resp = payloads.iter().find(|r| r.meta.fs.as_deref() == Some(name)).unwrap();
        assert_eq!(resp.lines, Some(vec![]));
    }
}

#[tokio::test]
async fn scenario_4_search_exact_match() {
    let (_dirs, registry) = fixture();
    let (tx, mut rx) = mpsc::channel(64);
    let dispatcher = Dispatcher::new(shared(registry), tx);

    let mut req = request(4, Action::Search);
    req.regexp = Some("2d03c436-c197-464f-9ad0-d861e650cd61".to_string());
    dispatcher.accept(req);

    let responses = drain_until_finished(&mut rx, 4).await;
    let payloads: Vec<_> = responses.iter().filter(|r| r.lines.is_some()).collect();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].meta.fs.as_deref(), Some("node1"));
    let lines = payloads[0].lines.as_ref().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].line, 2);
    assert!(lines[0].msg.contains("2d03c436-c197-464f-9ad0-d861e650cd61"));
}

#[tokio::test]
async fn scenario_5_search_regex_metachars() {
    let (_dirs, registry) = fixture();
    let (tx, mut rx) = mpsc::channel(64);
    let dispatcher = Dispatcher::new(shared(registry), tx);

    let mut req = request(5, Action::Search);
    req.regexp = Some("2d03c436-[c197]+-464f-9ad0-d861e650cd61".to_string());
    dispatcher.accept(req);

    let responses = drain_until_finished(&mut rx, 5).await;
    let payloads: Vec<_> = responses.iter().filter(|r| r.lines.is_some()).collect();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].meta.fs.as_deref(), Some("node1"));
    assert_eq!(payloads[0].lines.as_ref().unwrap().len(), 1);
}

#[tokio::test]
async fn scenario_6_search_with_source_filter() {
    let (_dirs, registry) = fixture();
    let (tx, mut rx) = mpsc::channel(64);
    let dispatcher = Dispatcher::new(shared(registry), tx);

    let mut req = request(6, Action::Search);
    req.regexp = Some("2d03c436-c197-464f-9ad0-d861e650cd61".to_string());
    req.filter_fs = ["node1".to_string()].into_iter().collect();
    dispatcher.accept(req);

    let responses = drain_until_finished(&mut rx, 6).await;
    let payloads: Vec<_> = responses.iter().filter(|r| r.lines.is_some()).collect();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].meta.fs.as_deref(), Some("node1"));
}

#[tokio::test]
async fn scenario_7_get_file_tree_with_source_filter() {
    let (_dirs, registry) = fixture();
    let (tx, mut rx) = mpsc::channel(64);
    let dispatcher = Dispatcher::new(shared(registry), tx);

    let mut req = request(7, Action::GetFileTree);
    req.filter_fs = ["node2".to_string()].into_iter().collect();
    dispatcher.accept(req);

    let responses = drain_until_finished(&mut rx, 7).await;
    let tree = responses.into_iter().find_map(|r| r.tree).expect("tree response");

    assert!(!tree.is_empty());
    for file in &tree {
        assert_eq!(file.instances.len(), 1);
        assert_eq!(file.instances[0].fs, "node2");
    }
}

#[tokio::test]
async fn scenario_8_preemption() {
    let (_dirs, registry) = fixture();
    let (tx, mut rx) = mpsc::channel(256);
    let dispatcher = Dispatcher::new(shared(registry), tx);

    let mut first = request(1, Action::Search);
    first.regexp = Some(".".to_string());
    dispatcher.accept(first);

    let mut second = request(2, Action::Search);
    second.regexp = Some(".".to_string());
    dispatcher.accept(second);

    let mut seen_finished = HashSet::new();
    let mut last_payload_after_finish: Option<i64> = None;

    timeout(Duration::from_secs(5), async {
        while seen_finished.len() < 2 {
            let resp = rx.recv().await.expect("channel closed early");
            if resp.finished == Some(true) {
                seen_finished.insert(resp.meta.id);
            } else if seen_finished.contains(&resp.meta.id) {
                last_payload_after_finish = Some(resp.meta.id);
            }
        }
    })
    .await
    .expect("both requests should settle");

    assert_eq!(seen_finished, [1, 2].into_iter().collect());
    assert!(last_payload_after_finish.is_none(), "a payload arrived after its own terminal marker");
}

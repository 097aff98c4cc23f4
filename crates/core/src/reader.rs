use std::time::{Duration, Instant};

use regex::Regex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::model::{Log, Meta, Response, TimeFilter};
use crate::parser::{self, ParseOutcome, ParserDispatch, ParserMemory};
use crate::path::LogPath;
use crate::source::Source;
use crate::time::passes_time_filter;

const INITIAL_BUFFER: usize = 64 * 1024;
const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Everything the reader needs beyond the source and its own open file
/// handle.
pub struct ScanRequest {
    pub meta: Meta,
    pub path: LogPath,
    pub regex: Option<Regex>,
    pub filter_time: TimeFilter,
    pub search_max_size: usize,
    pub content_batch_size: usize,
    pub content_batch_time: Duration,
    pub legacy_time_filter: bool,
}

/// Reads one delimiter-terminated line into `buf`, growing it past
/// whatever the underlying reader buffers internally. Returns `Ok(None)`
/// at EOF with nothing read, `Ok(Some(len))` otherwise. Errors once
/// `buf` would exceed `max` without finding a newline, aborting the scan
/// of this file.
async fn read_line_capped<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max: usize,
) -> std::io::Result<Option<usize>> {
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(if buf.is_empty() { None } else { Some(buf.len()) });
        }
        if let Some(pos) = available.iter().position(|&b| b == b'\n') {
            buf.extend_from_slice(&available[..=pos]);
            reader.consume(pos + 1);
            return Ok(Some(buf.len()));
        }
        let n = available.len();
        buf.extend_from_slice(available);
        reader.consume(n);
        if buf.len() > max {
            return Err(std::io::Error::other("line exceeds maximum buffer size"));
        }
    }
}

fn response_meta(req: &Meta, fs_name: &str, path: &LogPath) -> Meta {
    Meta { id: req.id, action: req.action, fs: Some(fs_name.to_string()), path: Some(path.clone()) }
}

async fn flush(
    batch: &mut Vec<Log>,
    sent_any: &mut bool,
    last_flush: &mut Instant,
    meta: &Meta,
    fs_name: &str,
    path: &LogPath,
    out: &mpsc::Sender<Response>,
) {
    let lines = std::mem::take(batch);
    *sent_any = true;
    *last_flush = Instant::now();
    let _ = out.send(Response::lines(response_meta(meta, fs_name, path), lines)).await;
}

/// Scans one file in one source, emitting batched [`Response`]s on
/// `out`. Silent on any per-source failure: a missing file, a
/// permission error, or a scan-buffer overrun simply stops this file's
/// contribution, without surfacing to the caller.
pub async fn scan_file(
    source: &Source,
    dispatch: &ParserDispatch,
    req: ScanRequest,
    cancel: &CancellationToken,
    out: &mpsc::Sender<Response>,
) {
    let stream = match source.fs.open(&req.path).await {
        Ok(s) => s,
        Err(err) => {
            warn!(fs = %source.name, path = %req.path, error = %err, "open failed, dropping source silently");
            return;
        }
    };
    let mut reader = BufReader::with_capacity(INITIAL_BUFFER, stream);

    let kind = dispatch.select(&req.path);
    let mut memory = ParserMemory::fresh(kind);

    let file_name = req.path.file_name().unwrap_or_default().to_string();
    let fs_name = source.name.to_string();

    let mut line_number: u64 = 1;
    let mut offset: u64 = 0;
    let mut batch: Vec<Log> = Vec::new();
    let mut last_flush = Instant::now();
    let mut sent_any = false;
    let mut matched_total: usize = 0;
    let mut line_buf = Vec::new();
    let mut capped = false;

    loop {
        if cancel.is_cancelled() {
            return;
        }

        line_buf.clear();
        let read = match read_line_capped(&mut reader, &mut line_buf, MAX_LINE_BYTES).await {
            Ok(Some(n)) => n,
            Ok(None) => break,
            Err(err) => {
                warn!(fs = %fs_name, path = %req.path, error = %err, "aborting scan");
                break;
            }
        };
        let len = read as u64;

        let stripped = line_buf.strip_suffix(b"\n").unwrap_or(&line_buf[..]);
        let stripped = stripped.strip_suffix(b"\r").unwrap_or(stripped);
        if stripped.is_empty() {
            line_number += 1;
            offset += len;
            continue;
        }

        let outcome = parser::parse(kind, &req.path, &line_buf, &mut memory);
        let mut new_match = false;

        match outcome {
            ParseOutcome::Emit(mut log) => {
                if let Some(re) = &req.regex {
                    if !re.is_match(&log.msg) {
                        line_number += 1;
                        offset += len;
                        continue;
                    }
                }
                log.file_name = file_name.clone();
                log.fs = fs_name.clone();
                log.line = line_number;
                log.offset = offset;
                if !passes_time_filter(log.time, req.filter_time.start, req.filter_time.end, req.legacy_time_filter) {
                    line_number += 1;
                    offset += len;
                    continue;
                }
                batch.push(log);
                new_match = req.regex.is_some();
            }
            ParseOutcome::Extend(log) => {
                if let Some(re) = &req.regex {
                    if !re.is_match(&log.msg) {
                        line_number += 1;
                        offset += len;
                        continue;
                    }
                }
                if let Some(last) = batch.last_mut() {
                    last.msg = log.msg;
                }
            }
        }

        line_number += 1;
        offset += len;
        if new_match {
            matched_total += 1;
        }

        let should_flush = batch.len() > req.content_batch_size || last_flush.elapsed() > req.content_batch_time;
        if should_flush {
            flush(&mut batch, &mut sent_any, &mut last_flush, &req.meta, &fs_name, &req.path, out).await;
        }

        if req.regex.is_some() && matched_total >= req.search_max_size {
            if !batch.is_empty() {
                flush(&mut batch, &mut sent_any, &mut last_flush, &req.meta, &fs_name, &req.path, out).await;
            }
            capped = true;
            break;
        }
    }

    if capped {
        return;
    }

    if batch.is_empty() && (sent_any || req.regex.is_some()) {
        return;
    }
    flush(&mut batch, &mut sent_any, &mut last_flush, &req.meta, &fs_name, &req.path, out).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::local::LocalFs;
    use crate::model::Action;
    use std::sync::Arc;

    fn source_with(content: &str) -> (tempfile::TempDir, Source) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.log"), content).unwrap();
        let source = Source::new("node1", Arc::new(LocalFs::new(dir.path())));
        (dir, source)
    }

    fn base_req(path: LogPath, regex: Option<Regex>) -> ScanRequest {
        ScanRequest {
            meta: Meta::for_request(1, Action::GetContent),
            path,
            regex,
            filter_time: TimeFilter::default(),
            search_max_size: 5000,
            content_batch_size: 2000,
            content_batch_time: Duration::from_secs(2),
            legacy_time_filter: false,
        }
    }

    #[tokio::test]
    async fn emits_one_batch_with_increasing_line_numbers() {
        let (_dir, source) = source_with("first\nsecond\nthird\n");
        let dispatch = ParserDispatch::default();
        let (tx, mut rx) = mpsc::channel(8);
        let req = base_req(LogPath::from_segments(["a.log".to_string()]), None);
        scan_file(&source, &dispatch, req, &CancellationToken::new(), &tx).await;
        drop(tx);

        let mut all = Vec::new();
        while let Some(resp) = rx.recv().await {
            all.extend(resp.lines.unwrap_or_default());
        }
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].line, 1);
        assert_eq!(all[1].line, 2);
        assert_eq!(all[2].line, 3);
        assert!(all[1].offset >= all[0].offset);
    }

    #[tokio::test]
    async fn empty_file_emits_one_response_with_empty_lines() {
        let (_dir, source) = source_with("");
        let dispatch = ParserDispatch::default();
        let (tx, mut rx) = mpsc::channel(8);
        let req = base_req(LogPath::from_segments(["a.log".to_string()]), None);
        scan_file(&source, &dispatch, req, &CancellationToken::new(), &tx).await;
        drop(tx);

        let resp = rx.recv().await.unwrap();
        assert_eq!(resp.lines, Some(vec![]));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn non_matching_file_emits_nothing_when_regex_is_present() {
        let (_dir, source) = source_with("nothing interesting here\n");
        let dispatch = ParserDispatch::default();
        let (tx, mut rx) = mpsc::channel(8);
        let req = base_req(LogPath::from_segments(["a.log".to_string()]), Some(Regex::new("needle").unwrap()));
        scan_file(&source, &dispatch, req, &CancellationToken::new(), &tx).await;
        drop(tx);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn regex_filters_to_matching_lines_only() {
        let (_dir, source) = source_with("alpha\nneedle here\nbeta\n");
        let dispatch = ParserDispatch::default();
        let (tx, mut rx) = mpsc::channel(8);
        let req = base_req(LogPath::from_segments(["a.log".to_string()]), Some(Regex::new("needle").unwrap()));
        scan_file(&source, &dispatch, req, &CancellationToken::new(), &tx).await;
        drop(tx);

        let mut all = Vec::new();
        while let Some(resp) = rx.recv().await {
            all.extend(resp.lines.unwrap_or_default());
        }
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].msg, "needle here");
        assert_eq!(all[0].line, 2);
    }

    #[tokio::test]
    async fn search_cap_stops_after_search_max_size_matches() {
        let content: String = (0..10).map(|_| "needle\n").collect();
        let (_dir, source) = source_with(&content);
        let dispatch = ParserDispatch::default();
        let (tx, mut rx) = mpsc::channel(32);
        let mut req = base_req(LogPath::from_segments(["a.log".to_string()]), Some(Regex::new("needle").unwrap()));
        req.search_max_size = 3;
        scan_file(&source, &dispatch, req, &CancellationToken::new(), &tx).await;
        drop(tx);

        let mut all = Vec::new();
        while let Some(resp) = rx.recv().await {
            all.extend(resp.lines.unwrap_or_default());
        }
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn interior_blank_lines_are_not_emitted_as_records() {
        let (_dir, source) = source_with("first\n\nsecond\n\n\nthird\n");
        let dispatch = ParserDispatch::default();
        let (tx, mut rx) = mpsc::channel(8);
        let req = base_req(LogPath::from_segments(["a.log".to_string()]), None);
        scan_file(&source, &dispatch, req, &CancellationToken::new(), &tx).await;
        drop(tx);

        let mut all = Vec::new();
        while let Some(resp) = rx.recv().await {
            all.extend(resp.lines.unwrap_or_default());
        }
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].msg, "first");
        assert_eq!(all[1].msg, "second");
        assert_eq!(all[2].msg, "third");
        // line numbers still count blank lines, so they're not contiguous
        assert_eq!(all[0].line, 1);
        assert_eq!(all[1].line, 3);
        assert_eq!(all[2].line, 6);
    }

    #[tokio::test]
    async fn missing_file_emits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = Source::new("node1", Arc::new(LocalFs::new(dir.path())));
        let dispatch = ParserDispatch::default();
        let (tx, mut rx) = mpsc::channel(8);
        let req = base_req(LogPath::from_segments(["missing.log".to_string()]), None);
        scan_file(&source, &dispatch, req, &CancellationToken::new(), &tx).await;
        drop(tx);
        assert!(rx.recv().await.is_none());
    }
}

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::path::LogPath;

/// Client-chosen request id, echoed verbatim and used only to group
/// responses and implement preemption.
pub type RequestId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    GetFileTree,
    GetContent,
    Search,
    /// Catches any action string the server doesn't recognize so the
    /// rest of the request still deserializes; the dispatcher responds
    /// to it with nothing but the terminal marker.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    pub id: RequestId,
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<LogPath>,
}

impl Meta {
    pub fn for_request(id: RequestId, action: Action) -> Self {
        Self { id, action, fs: None, path: None }
    }

    pub fn with_source(mut self, fs: impl Into<String>, path: LogPath) -> Self {
        self.fs = Some(fs.into());
        self.path = Some(path);
        self
    }
}

/// Inbound time-range filter, as received on the wire (RFC3339 strings).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireTimeFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

/// Parsed form of `WireTimeFilter`, used internally by the reader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl From<&WireTimeFilter> for TimeFilter {
    fn from(wire: &WireTimeFilter) -> Self {
        Self {
            start: wire.start.as_deref().and_then(crate::time::parse_log_time),
            end: wire.end.as_deref().and_then(crate::time::parse_log_time),
        }
    }
}

/// A request inbound from a client. `path` and `base_path` are
/// interchangeable base-location inputs; the non-empty one wins,
/// preferring `path` when both are set.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub meta: Meta,
    #[serde(default)]
    pub path: Option<LogPath>,
    #[serde(default)]
    pub base_path: Option<LogPath>,
    #[serde(default)]
    pub regexp: Option<String>,
    #[serde(default)]
    pub filter_fs: HashSet<String>,
    #[serde(default)]
    pub filter_time: WireTimeFilter,
}

impl Request {
    /// The base/path location to operate on, preferring a non-empty
    /// `path` then a non-empty `base_path`.
    pub fn location(&self) -> LogPath {
        match (&self.path, &self.base_path) {
            (Some(p), _) if !p.is_root() => p.clone(),
            (_, Some(b)) if !b.is_root() => b.clone(),
            (Some(p), _) => p.clone(),
            (_, Some(b)) => b.clone(),
            (None, None) => LogPath::root(),
        }
    }
}

/// One parsed, source-attributed log line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Log {
    pub msg: String,
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fs: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file_name: String,
    /// 1-based line number within the file.
    pub line: u64,
    /// Cumulative byte count over scanned content up to but not
    /// including this line.
    pub offset: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_of_origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_no: Option<u64>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub args: serde_json::Map<String, serde_json::Value>,
}

/// One source's copy of a logical file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInstance {
    pub size: u64,
    pub fs: String,
}

/// A merged tree node; `key` is the merge key (slash-joined relative
/// path).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub key: String,
    pub path: LogPath,
    pub is_dir: bool,
    pub instances: Vec<FileInstance>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Response {
    pub meta: Meta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<Log>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree: Option<Vec<File>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished: Option<bool>,
}

impl Default for Meta {
    fn default() -> Self {
        Self { id: 0, action: Action::GetContent, fs: None, path: None }
    }
}

impl Response {
    pub fn terminal(meta: Meta) -> Self {
        Self {
            meta: Meta { fs: None, path: None, ..meta },
            lines: None,
            tree: None,
            error: None,
            finished: Some(true),
        }
    }

    pub fn error(meta: Meta, message: impl Into<String>) -> Self {
        Self { meta, lines: None, tree: None, error: Some(message.into()), finished: None }
    }

    pub fn lines(meta: Meta, lines: Vec<Log>) -> Self {
        Self { meta, lines: Some(lines), tree: None, error: None, finished: None }
    }

    pub fn tree(meta: Meta, tree: Vec<File>) -> Self {
        Self { meta, lines: None, tree: Some(tree), error: None, finished: None }
    }
}

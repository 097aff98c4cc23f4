use serde::Deserialize;
use serde_json::{Map, Value};

use crate::model::Log;
use crate::parser::ParseOutcome;
use crate::path::LogPath;
use crate::time::parse_log_time;

/// The structured parser is stateless: every keyed record is
/// self-contained on one physical line (a multi-line message, such as a
/// traceback, is carried as an embedded `\n` inside the JSON `msg`
/// string rather than reconstructed from several physical lines).
#[derive(Debug, Clone, Default)]
pub struct StructuredMemory;

#[derive(Debug, Deserialize)]
struct KeyedRecord {
    #[serde(default)]
    msg: String,
    #[serde(default)]
    level: String,
    #[serde(default)]
    time: Option<Value>,
    #[serde(default)]
    thread: Option<String>,
    #[serde(default)]
    line_no: Option<u64>,
    #[serde(default)]
    path_of_origin: Option<String>,
    #[serde(default)]
    args: Option<Map<String, Value>>,
}

fn time_value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Recognizes keyed records (JSON objects with fields `msg`, `level`,
/// `time`, `thread`, `line_no`, `path_of_origin`, `args`); falls back to
/// the raw line as `msg` when a line isn't a valid keyed record, rather
/// than failing the scan.
pub fn parse(_path: &LogPath, raw: &[u8], _memory: &mut StructuredMemory) -> ParseOutcome {
    match serde_json::from_slice::<KeyedRecord>(raw) {
        Ok(record) => {
            let time = record.time.as_ref().and_then(time_value_to_string).and_then(|s| parse_log_time(&s));
            ParseOutcome::Emit(Log {
                msg: record.msg,
                level: record.level,
                time,
                thread: record.thread,
                line_no: record.line_no,
                path_of_origin: record.path_of_origin,
                args: record.args.unwrap_or_default(),
                ..Default::default()
            })
        }
        Err(_) => {
            let line = String::from_utf8_lossy(raw).trim_end_matches(['\r', '\n']).to_string();
            ParseOutcome::Emit(Log { msg: line, level: String::new(), time: None, ..Default::default() })
        }
    }
}

use crate::model::Log;
use crate::parser::ParseOutcome;
use crate::path::LogPath;

/// Tracks the message text of the record currently being built, so an
/// indented continuation line (e.g. a stack trace under its header) can
/// extend it.
#[derive(Debug, Clone, Default)]
pub struct RawMemory {
    current: Option<String>,
}

fn is_continuation(line: &str) -> bool {
    line.starts_with(' ') || line.starts_with('\t')
}

/// The fallback parser: uses the raw line as `msg` with an empty level
/// and no time.
pub fn parse(_path: &LogPath, raw: &[u8], memory: &mut RawMemory) -> ParseOutcome {
    let line = String::from_utf8_lossy(raw).trim_end_matches(['\r', '\n']).to_string();

    if is_continuation(&line) && memory.current.is_some() {
        let acc = memory.current.as_mut().expect("checked above");
        acc.push('\n');
        acc.push_str(line.trim());
        return ParseOutcome::Extend(Log { msg: acc.clone(), level: String::new(), time: None, ..Default::default() });
    }

    memory.current = Some(line.clone());
    ParseOutcome::Emit(Log { msg: line, level: String::new(), time: None, ..Default::default() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_each_emit_their_own_record() {
        let mut mem = RawMemory::default();
        let path = LogPath::root();
        match parse(&path, b"first line", &mut mem) {
            ParseOutcome::Emit(log) => assert_eq!(log.msg, "first line"),
            other => panic!("expected Emit, got {other:?}"),
        }
        match parse(&path, b"second line", &mut mem) {
            ParseOutcome::Emit(log) => assert_eq!(log.msg, "second line"),
            other => panic!("expected Emit, got {other:?}"),
        }
    }

    #[test]
    fn indented_lines_extend_the_previous_record() {
        let mut mem = RawMemory::default();
        let path = LogPath::root();
        match parse(&path, b"ERROR boom", &mut mem) {
            ParseOutcome::Emit(log) => assert_eq!(log.msg, "ERROR boom"),
            other => panic!("expected Emit, got {other:?}"),
        }
        match parse(&path, b"  at foo.rs:1", &mut mem) {
            ParseOutcome::Extend(log) => assert_eq!(log.msg, "ERROR boom\nat foo.rs:1"),
            other => panic!("expected Extend, got {other:?}"),
        }
        match parse(&path, b"  at bar.rs:2", &mut mem) {
            ParseOutcome::Extend(log) => assert_eq!(log.msg, "ERROR boom\nat foo.rs:1\nat bar.rs:2"),
            other => panic!("expected Extend, got {other:?}"),
        }
    }

    #[test]
    fn leading_continuation_with_no_prior_record_emits_normally() {
        let mut mem = RawMemory::default();
        let path = LogPath::root();
        match parse(&path, b"  looks indented but nothing precedes it", &mut mem) {
            ParseOutcome::Emit(_) => {}
            other => panic!("expected Emit, got {other:?}"),
        }
    }
}

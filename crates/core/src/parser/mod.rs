pub mod raw;
pub mod structured;

use regex::Regex;

use crate::model::Log;
use crate::path::LogPath;

/// Which parser family handles a file, selected by matching its path
/// against [`ParserDispatch`]'s configured regex list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserKind {
    Structured,
    Raw,
}

/// Opaque per-file parser state, threaded through calls to support
/// multi-line record continuations. Always fresh per file scan, never
/// shared across files or sources.
#[derive(Debug, Clone)]
pub enum ParserMemory {
    Structured(structured::StructuredMemory),
    Raw(raw::RawMemory),
}

impl ParserMemory {
    pub fn fresh(kind: ParserKind) -> Self {
        match kind {
            ParserKind::Structured => ParserMemory::Structured(structured::StructuredMemory::default()),
            ParserKind::Raw => ParserMemory::Raw(raw::RawMemory::default()),
        }
    }
}

/// Result of one `parse` call.
#[derive(Debug, Clone)]
pub enum ParseOutcome {
    /// A new record; the reader appends it to the current batch.
    Emit(Log),
    /// Extends the record most recently emitted for this file (e.g. an
    /// indented stack-trace continuation line); the reader merges it
    /// into that record in place rather than appending a new one. If
    /// that record has already been flushed in an earlier batch, the
    /// extension is dropped — streaming output already sent cannot be
    /// retroactively edited.
    Extend(Log),
}

/// Parses one physical line into a log record, given the parser state
/// carried across prior lines of the same file. A continuation line can
/// extend rather than replace the prior record.
pub fn parse(kind: ParserKind, path: &LogPath, raw: &[u8], memory: &mut ParserMemory) -> ParseOutcome {
    match (kind, memory) {
        (ParserKind::Structured, ParserMemory::Structured(mem)) => structured::parse(path, raw, mem),
        (ParserKind::Raw, ParserMemory::Raw(mem)) => raw::parse(path, raw, mem),
        // Memory/kind mismatch can't happen through `ParserDispatch`,
        // which always pairs a kind with `ParserMemory::fresh(kind)`.
        _ => unreachable!("parser memory kind must match dispatch kind"),
    }
}

/// Selects a [`ParserKind`] for a path by matching a configured list of
/// regexes against its slash-joined key, falling back to
/// [`ParserKind::Raw`] when nothing matches.
#[derive(Debug, Clone)]
pub struct ParserDispatch {
    rules: Vec<(Regex, ParserKind)>,
}

impl ParserDispatch {
    pub fn new(rules: Vec<(Regex, ParserKind)>) -> Self {
        Self { rules }
    }

    pub fn select(&self, path: &LogPath) -> ParserKind {
        let key = path.as_key();
        self.rules
            .iter()
            .find(|(re, _)| re.is_match(&key))
            .map(|(_, kind)| *kind)
            .unwrap_or(ParserKind::Raw)
    }
}

impl Default for ParserDispatch {
    fn default() -> Self {
        let rules = vec![
            (Regex::new(r"\.json$").unwrap(), ParserKind::Structured),
            (Regex::new(r"\.stratolog$").unwrap(), ParserKind::Structured),
        ];
        Self::new(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_selects_structured_for_known_extensions() {
        let dispatch = ParserDispatch::default();
        assert_eq!(
            dispatch.select(&LogPath::from_segments(["a.stratolog".to_string()])),
            ParserKind::Structured
        );
        assert_eq!(
            dispatch.select(&LogPath::from_segments(["a.json".to_string()])),
            ParserKind::Structured
        );
        assert_eq!(
            dispatch.select(&LogPath::from_segments(["a.log".to_string()])),
            ParserKind::Raw
        );
    }
}

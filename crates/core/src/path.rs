use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path as StdPath, PathBuf};

/// A canonical, platform-neutral path: an ordered sequence of segments
/// with no empty components and no `.`/`..`. The empty sequence denotes
/// the root of a source.
///
/// Wire representation is a JSON array of strings; `Display` renders the
/// slash-joined form used as a `File::key`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogPath(Vec<String>);

impl LogPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            segments
                .into_iter()
                .map(Into::into)
                .filter(|s| !s.is_empty() && s != "." && s != "..")
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, segment: impl Into<String>) {
        let segment = segment.into();
        if !segment.is_empty() && segment != "." && segment != ".." {
            self.0.push(segment);
        }
    }

    pub fn joined(&self, other: &[String]) -> Self {
        let mut segments = self.0.clone();
        segments.extend(other.iter().filter(|s| !s.is_empty()).cloned());
        Self(segments)
    }

    /// Slash-joined key, used as `File::key` and as the merge key in the
    /// tree combiner.
    pub fn as_key(&self) -> String {
        self.0.join("/")
    }

    /// Resolve this path against a filesystem root, confining the result
    /// under `root` (the core never escapes a source's own rooting).
    pub fn resolve_under(&self, root: &StdPath) -> PathBuf {
        let mut buf = root.to_path_buf();
        for segment in &self.0 {
            buf.push(segment);
        }
        buf
    }

    /// Build a `LogPath` from a filesystem path relative to `root`.
    pub fn from_relative(rel: &StdPath) -> Self {
        Self::from_segments(
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned()),
        )
    }

    pub fn file_name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn extension(&self) -> Option<&str> {
        self.file_name().and_then(|name| {
            let idx = name.rfind('.')?;
            if idx == 0 { None } else { Some(&name[idx..]) }
        })
    }
}

impl fmt::Display for LogPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_key())
    }
}

impl From<Vec<String>> for LogPath {
    fn from(segments: Vec<String>) -> Self {
        Self::from_segments(segments)
    }
}

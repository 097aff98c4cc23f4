use thiserror::Error;

/// Errors surfaced by the engine itself, as opposed to per-source I/O
/// failures (those are logged and swallowed at the source boundary per
/// the error handling design: a source never aborts a request for the
/// others).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid regular expression: {0}")]
    InvalidRegex(#[from] regex::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("toml parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("toml serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("failed to initialize logger: {0}")]
    Logger(String),

    #[error("unknown source: {0}")]
    UnknownSource(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

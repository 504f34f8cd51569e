use thiserror::Error;

/// Errors raised outside the physics: files, parsing, wiring and configuration.
///
/// Physics evaluations never return these for bad numeric input; they
/// extrapolate or let NaN propagate to the caller.
#[derive(Debug, Error)]
pub enum MdoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("combustion table line {line}: {reason}")]
    CeaTable { line: usize, reason: String },

    #[error("table shape mismatch: expected {expected} values, found {found}")]
    TableShape { expected: usize, found: usize },

    #[error("component '{component}' has no value for port '{port}'")]
    MissingPort { component: String, port: String },

    #[error("unknown phase '{0}'")]
    UnknownPhase(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("initial guess for phase '{phase}': {reason}")]
    GuessMismatch { phase: String, reason: String },
}

pub type Result<T> = std::result::Result<T, MdoError>;

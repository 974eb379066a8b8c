//! Domain error types.

/// Top-level error type for revscan.
#[derive(Debug, thiserror::Error)]
pub enum RevscanError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("unknown filter profile: {name}")]
    UnknownProfile { name: String },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("malformed series {code}: {reason}")]
    MalformedSeries { code: String, reason: String },

    #[error("insufficient history for {code}: have {bars} bars, need {minimum}")]
    InsufficientHistory {
        code: String,
        bars: usize,
        minimum: usize,
    },

    #[error("simulation error for {code} at bar {index}: {reason}")]
    Simulation {
        code: String,
        index: usize,
        reason: String,
    },

    #[error("empty universe: {reason}")]
    EmptyUniverse { reason: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RevscanError {
    pub fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        RevscanError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&RevscanError> for std::process::ExitCode {
    fn from(err: &RevscanError) -> Self {
        let code: u8 = match err {
            RevscanError::Io(_) => 1,
            RevscanError::ConfigParse { .. }
            | RevscanError::ConfigMissing { .. }
            | RevscanError::ConfigInvalid { .. }
            | RevscanError::UnknownProfile { .. } => 2,
            RevscanError::DataSource { .. } | RevscanError::MalformedSeries { .. } => 3,
            RevscanError::Simulation { .. } => 4,
            RevscanError::InsufficientHistory { .. } | RevscanError::EmptyUniverse { .. } => 5,
            RevscanError::Report { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

/// A failure isolated to one security during a batch run.
#[derive(Debug)]
pub struct SeriesFailure {
    pub code: String,
    pub error: RevscanError,
}

impl std::fmt::Display for SeriesFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.error)
    }
}

//! Domain error types.

/// A parse error with position information for filter strings.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!("{input}\n{caret}\n{self}")
    }
}

/// Top-level error type for swingscan.
///
/// `InsufficientData` and `Fetch` are per-symbol and recovered by the
/// orchestrator; everything else rejects the whole request.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("fetch failed for {symbol}: {reason}")]
    Fetch { symbol: String, reason: String },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error(transparent)]
    FilterParse(#[from] ParseError),

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

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        EngineError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn fetch(symbol: &str, reason: impl Into<String>) -> Self {
        EngineError::Fetch {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors that only affect a single symbol within a batch.
    pub fn is_per_symbol(&self) -> bool {
        matches!(
            self,
            EngineError::InsufficientData { .. } | EngineError::Fetch { .. }
        )
    }
}

impl From<&EngineError> for std::process::ExitCode {
    fn from(err: &EngineError) -> Self {
        let code: u8 = match err {
            EngineError::Io(_) => 1,
            EngineError::ConfigParse { .. }
            | EngineError::ConfigMissing { .. }
            | EngineError::ConfigInvalid { .. } => 2,
            EngineError::Fetch { .. } => 3,
            EngineError::InvalidParameter { .. } | EngineError::FilterParse(_) => 4,
            EngineError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

//! Domain error types.

/// Top-level error type for bandtrader.
#[derive(Debug, thiserror::Error)]
pub enum BandtraderError {
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

    #[error("unknown candle interval: {0}")]
    UnknownInterval(String),

    #[error("insufficient data for {asset}: have {bars} bars, need {minimum}")]
    InsufficientData {
        asset: String,
        bars: usize,
        minimum: usize,
    },

    #[error("fetch failed for {asset}: {reason}")]
    FetchFailure { asset: String, reason: String },

    #[error("indicator calculation failed for {asset}: {reason}")]
    CalcFailure { asset: String, reason: String },

    #[error("invalid position: {reason}")]
    InvalidPosition { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BandtraderError {
    /// Short diagnostic shown in an `ERROR` snapshot.
    pub fn snapshot_reason(&self) -> &'static str {
        match self {
            BandtraderError::CalcFailure { .. } => "Calc error",
            BandtraderError::InsufficientData { .. } | BandtraderError::FetchFailure { .. } => {
                "No data"
            }
            _ => "Error",
        }
    }
}

impl From<&BandtraderError> for std::process::ExitCode {
    fn from(err: &BandtraderError) -> Self {
        let code: u8 = match err {
            BandtraderError::Io(_) => 1,
            BandtraderError::ConfigParse { .. }
            | BandtraderError::ConfigMissing { .. }
            | BandtraderError::ConfigInvalid { .. }
            | BandtraderError::UnknownInterval(_) => 2,
            BandtraderError::FetchFailure { .. } => 3,
            BandtraderError::InvalidPosition { .. } => 4,
            BandtraderError::InsufficientData { .. } | BandtraderError::CalcFailure { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

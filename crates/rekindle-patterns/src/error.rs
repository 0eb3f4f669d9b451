use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("pattern '{name}': invalid regex: {source}")]
    InvalidRegex {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("pattern '{name}': missing required field '{field}'")]
    MissingField { name: String, field: String },

    #[error("unknown recovery action: {0}")]
    UnknownRecoveryAction(String),
}

use thiserror::Error;

/// Setup problems that abort a whole run. They are carried inside
/// `anyhow::Error` and can be recovered with `downcast_ref`.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("No query was found for sheet {sheet}")]
    MissingQuery { sheet: String },

    #[error("Tracker query is empty")]
    EmptyQuery,

    #[error("Sheet {0} was not found")]
    MissingSheet(String),

    #[error("Chart with index {index} on sheet {sheet} was not found")]
    MissingChart { sheet: String, index: String },

    #[error("Confluence PageID must be numeric (sheet {sheet}, got {value:?})")]
    NonNumericPageId { sheet: String, value: String },

    #[error("{0} is not configured; run `statusbook config` first")]
    MissingSetting(&'static str),
}

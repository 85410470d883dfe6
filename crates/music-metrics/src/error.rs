use thiserror::Error;

/// A single metric failed; isolated by the invoker and reported inline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricError {
    #[error("{0}")]
    Computation(String),

    #[error("non-finite result ({0})")]
    NonFinite(f64),

    #[error("panicked: {0}")]
    Panicked(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for MetricError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Unknown category or mode; rejected before any computation starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRequestError {
    #[error("unknown category '{0}'")]
    UnknownCategory(String),

    #[error("unknown mode '{0}'")]
    UnknownMode(String),
}

/// A file reference could not be turned into a score.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("file is empty: {0}")]
    Empty(String),

    #[error("invalid file reference '{file}': {reason}")]
    InvalidReference { file: String, reason: String },

    #[error("failed to read {file}: {source}")]
    Unreadable {
        file: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to decode {file}: {source}")]
    Undecodable {
        file: String,
        #[source]
        source: score_model::Error,
    },
}

/// The static metric table is inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("no metrics registered for {category}/{granularity}")]
    Empty {
        category: &'static str,
        granularity: &'static str,
    },

    #[error("metric '{name}' registered twice for {category}/{granularity}")]
    Duplicate {
        name: &'static str,
        category: &'static str,
        granularity: &'static str,
    },

    #[error("metric '{name}' is shared by {first} and {second} at {granularity}")]
    SharedAcrossCategories {
        name: &'static str,
        first: &'static str,
        second: &'static str,
        granularity: &'static str,
    },
}

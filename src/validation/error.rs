use crate::processing::parser::ParseError;
use crate::utils::config::ConfigError;
use crate::validation::data::NetworkIssue;
use std::path::PathBuf;
use thiserror::Error;

/// Session-level failures. Per-node problems never surface here: they are
/// absorbed by the Stuck and Skip states.
#[derive(Debug, Error)]
pub enum LocalizationError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("scenario error: {0}")]
    Parse(#[from] ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid network: {}", join_issues(.0))]
    InvalidNetwork(Vec<NetworkIssue>),

    #[error("failed to write '{}': {source}", path.display())]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize report: {0}")]
    Report(#[from] serde_json::Error),
}

fn join_issues(issues: &[NetworkIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

use super::backend::BackendError;

/// Failures surfaced on the panel's status line. Each names the operation
/// that failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PanelError {
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Search failed: {0}")]
    SearchFailed(String),

    #[error("Filter failed: {0}")]
    FilterFailed(String),

    #[error("Replace failed: {0}")]
    ReplaceFailed(String),

    #[error("Replace all failed: {0}")]
    ReplaceAllFailed(String),

    #[error("Failed to load filter rule groups: {0}")]
    RuleGroupLoadFailed(String),

    #[error("Failed to save filter rule group: {0}")]
    RuleGroupSaveFailed(String),

    #[error("Failed to import filter rule groups: {0}")]
    RuleGroupImportFailed(String),

    #[error("Failed to export filter rule groups: {0}")]
    RuleGroupExportFailed(String),
}

/// Which slice of panel state an error belongs to. A success in one scope
/// only clears that scope's error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorScope {
    Search,
    Filter,
    Replace,
    RuleGroups,
}

impl PanelError {
    pub(crate) fn invalid_pattern(err: &regex::Error) -> Self {
        PanelError::InvalidPattern(err.to_string())
    }

    pub(crate) fn search(err: BackendError) -> Self {
        PanelError::SearchFailed(err.0)
    }

    pub(crate) fn filter(err: BackendError) -> Self {
        PanelError::FilterFailed(err.0)
    }
}

/// Non-error outcomes worth showing on the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelNotice {
    NoMatchesToReplace,
    Replaced { count: usize },
}

impl std::fmt::Display for PanelNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PanelNotice::NoMatchesToReplace => write!(f, "No matches to replace"),
            PanelNotice::Replaced { count: 1 } => write!(f, "Replaced 1 match"),
            PanelNotice::Replaced { count } => write!(f, "Replaced {count} matches"),
        }
    }
}

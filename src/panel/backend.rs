//! The command surface the orchestrator consumes. Every call may resolve in
//! any order relative to when it was issued; none can be aborted.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::query::{FilterRuleGroup, FilterRuleInput, FilterRuleStyle, SearchQuery};

/// `start`/`end` are UTF-8 byte offsets, `start_char`/`end_char` are char
/// offsets. `line` and `column` are 1-based; `column` counts chars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMatch {
    pub start: usize,
    pub end: usize,
    pub start_char: usize,
    pub end_char: usize,
    pub text: String,
    pub line: usize,
    pub column: usize,
    pub line_text: String,
}

impl SearchMatch {
    pub fn char_len(&self) -> usize {
        self.end_char.saturating_sub(self.start_char)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchChunk {
    pub matches: Vec<SearchMatch>,
    pub document_version: u64,
    pub next_offset: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCount {
    pub total_matches: usize,
    pub matched_lines: usize,
    pub document_version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFirst {
    pub first_match: Option<SearchMatch>,
    pub document_version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharRange {
    pub start_char: usize,
    pub end_char: usize,
}

/// How a filter match is painted: the whole line, or only the listed spans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "applyTo", rename_all = "lowercase")]
pub enum FilterHighlight {
    Line,
    Match { ranges: Vec<CharRange> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterMatch {
    pub line: usize,
    pub column: usize,
    pub length: usize,
    pub line_text: String,
    pub rule_index: usize,
    pub style: FilterRuleStyle,
    #[serde(flatten)]
    pub highlight: FilterHighlight,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterChunk {
    pub matches: Vec<FilterMatch>,
    pub document_version: u64,
    pub next_line: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCount {
    pub matched_lines: usize,
    pub document_version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentText {
    pub text: String,
    pub line_count: usize,
    pub document_version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct BackendError(pub String);

impl From<String> for BackendError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for BackendError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

#[async_trait]
pub trait DocumentBackend: Send + Sync {
    async fn document_version(&self, tab_id: &str) -> Result<u64, BackendError>;

    async fn search_count(&self, query: &SearchQuery) -> Result<SearchCount, BackendError>;

    async fn search_chunk(
        &self,
        query: &SearchQuery,
        start_offset: usize,
        max_results: usize,
    ) -> Result<SearchChunk, BackendError>;

    async fn search_first(
        &self,
        query: &SearchQuery,
        reverse: bool,
    ) -> Result<SearchFirst, BackendError>;

    async fn filter_count(
        &self,
        tab_id: &str,
        rules: &[FilterRuleInput],
        result_filter_keyword: Option<&str>,
        case_sensitive: bool,
    ) -> Result<FilterCount, BackendError>;

    async fn filter_chunk(
        &self,
        tab_id: &str,
        rules: &[FilterRuleInput],
        result_filter_keyword: Option<&str>,
        case_sensitive: bool,
        start_line: usize,
        max_results: usize,
    ) -> Result<FilterChunk, BackendError>;

    async fn document_text(&self, tab_id: &str) -> Result<DocumentText, BackendError>;

    /// Replaces the chars in `start_char..end_char`; returns the new line count.
    async fn edit_text(
        &self,
        tab_id: &str,
        start_char: usize,
        end_char: usize,
        new_text: &str,
    ) -> Result<usize, BackendError>;

    /// Replaces the 0-based line range `start_line..end_line`; returns the new line count.
    async fn replace_range(
        &self,
        tab_id: &str,
        start_line: usize,
        end_line: usize,
        new_text: &str,
    ) -> Result<usize, BackendError>;
}

#[async_trait]
pub trait RuleGroupStore: Send + Sync {
    async fn load_rule_groups(&self) -> Result<Vec<FilterRuleGroup>, BackendError>;

    async fn save_rule_groups(&self, groups: &[FilterRuleGroup]) -> Result<(), BackendError>;

    async fn import_rule_groups(&self, path: &Path) -> Result<Vec<FilterRuleGroup>, BackendError>;

    async fn export_rule_groups(
        &self,
        path: &Path,
        groups: &[FilterRuleGroup],
    ) -> Result<(), BackendError>;
}

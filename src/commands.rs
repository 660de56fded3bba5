//! In-process document backend: open documents live in [`AppState`] and every
//! [`DocumentBackend`] call runs directly against their ropes.

mod config;
mod constants;
mod document;
mod editing;
mod file_io;
mod search;
pub(crate) mod text_utils;
mod types;

pub(crate) use constants::*;

pub use config::{
    config_file_path, load_config, save_config, AppConfig, ConfigError, FileRuleGroupStore,
    SearchSettings,
};
pub use types::FileInfo;

use crate::panel::{
    normalize_result_filter_keyword, normalize_rule_groups, BackendError, CharRange,
    DocumentBackend, DocumentText, FilterApplyTo, FilterChunk, FilterCount, FilterHighlight,
    FilterMatch, FilterMatchMode, FilterRuleGroup, FilterRuleInput, FilterRuleStyle,
    RuleGroupStore, SearchChunk, SearchCount, SearchFirst, SearchMatch, SearchMode, SearchQuery,
};
use crate::state::{default_line_ending, AppState, Document, LineEnding};
use async_trait::async_trait;
use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use memmap2::Mmap;
use ropey::Rope;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct LocalBackend {
    state: Arc<AppState>,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn open_file(&self, path: &Path) -> Result<FileInfo, String> {
        file_io::open_file_impl(&self.state, path)
    }

    pub fn open_text(&self, name: &str, text: &str) -> FileInfo {
        file_io::open_text_impl(&self.state, name, text)
    }

    pub fn close(&self, id: &str) -> bool {
        file_io::close_file_impl(&self.state, id)
    }

    pub fn save(&self, id: &str) -> Result<(), String> {
        file_io::save_file_impl(&self.state, id)
    }

    pub fn is_dirty(&self, id: &str) -> Result<bool, String> {
        self.state
            .documents
            .get(id)
            .map(|doc| doc.is_dirty())
            .ok_or_else(|| DOCUMENT_NOT_FOUND.to_string())
    }

    pub fn text(&self, id: &str) -> Result<String, String> {
        document::get_document_text_impl(&self.state, id).map(|snapshot| snapshot.text)
    }
}

#[async_trait]
impl DocumentBackend for LocalBackend {
    async fn document_version(&self, tab_id: &str) -> Result<u64, BackendError> {
        document::get_document_version_impl(&self.state, tab_id).map_err(BackendError::from)
    }

    async fn search_count(&self, query: &SearchQuery) -> Result<SearchCount, BackendError> {
        search::search_count_impl(&self.state, query).map_err(BackendError::from)
    }

    async fn search_chunk(
        &self,
        query: &SearchQuery,
        start_offset: usize,
        max_results: usize,
    ) -> Result<SearchChunk, BackendError> {
        search::search_chunk_impl(&self.state, query, start_offset, max_results)
            .map_err(BackendError::from)
    }

    async fn search_first(
        &self,
        query: &SearchQuery,
        reverse: bool,
    ) -> Result<SearchFirst, BackendError> {
        search::search_first_impl(&self.state, query, reverse).map_err(BackendError::from)
    }

    async fn filter_count(
        &self,
        tab_id: &str,
        rules: &[FilterRuleInput],
        result_filter_keyword: Option<&str>,
        case_sensitive: bool,
    ) -> Result<FilterCount, BackendError> {
        search::filter_count_impl(&self.state, tab_id, rules, result_filter_keyword, case_sensitive)
            .map_err(BackendError::from)
    }

    async fn filter_chunk(
        &self,
        tab_id: &str,
        rules: &[FilterRuleInput],
        result_filter_keyword: Option<&str>,
        case_sensitive: bool,
        start_line: usize,
        max_results: usize,
    ) -> Result<FilterChunk, BackendError> {
        search::filter_chunk_impl(
            &self.state,
            tab_id,
            rules,
            result_filter_keyword,
            case_sensitive,
            start_line,
            max_results,
        )
        .map_err(BackendError::from)
    }

    async fn document_text(&self, tab_id: &str) -> Result<DocumentText, BackendError> {
        document::get_document_text_impl(&self.state, tab_id).map_err(BackendError::from)
    }

    async fn edit_text(
        &self,
        tab_id: &str,
        start_char: usize,
        end_char: usize,
        new_text: &str,
    ) -> Result<usize, BackendError> {
        editing::edit_text_impl(&self.state, tab_id, start_char, end_char, new_text)
            .map_err(BackendError::from)
    }

    async fn replace_range(
        &self,
        tab_id: &str,
        start_line: usize,
        end_line: usize,
        new_text: &str,
    ) -> Result<usize, BackendError> {
        editing::replace_line_range_impl(&self.state, tab_id, start_line, end_line, new_text)
            .map_err(BackendError::from)
    }
}

//! Incremental search / filter / replace orchestrator.
//!
//! [`SearchPanel`] turns panel intents (keyword typed, next pressed, result
//! list scrolled, rule dragged) into backend calls and keeps the loaded
//! result windows coherent with the document. All mutable state sits behind
//! one mutex that is never held across a backend call; responses are applied
//! only if their run token is still current.

mod backend;
mod cache;
mod error;
mod events;
mod filter_rules;
mod navigation;
mod pagination;
mod query;
mod replace;
mod run_version;
mod snapshot;

pub use backend::{
    BackendError, CharRange, DocumentBackend, DocumentText, FilterChunk, FilterCount,
    FilterHighlight, FilterMatch, RuleGroupStore, SearchChunk, SearchCount, SearchFirst,
    SearchMatch,
};
pub use error::{ErrorScope, PanelError, PanelNotice};
pub use events::{EventBus, PanelEvent};
pub use filter_rules::{merge_groups, normalize_rule_groups, FilterRuleList};
pub use navigation::{NavigationState, StepDirection};
pub use pagination::PagedResults;
pub use query::{
    FilterApplyTo, FilterMatchMode, FilterQuery, FilterRule, FilterRuleGroup, FilterRuleInput,
    FilterRuleStyle, SearchMode, SearchQuery,
};
pub use replace::{apply_planned_edits, plan_sequential_edits, replace_all_with_regex, PlannedEdit};
pub use snapshot::{PanelMode, TabSnapshot};

pub(crate) use query::normalize_result_filter_keyword;

use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::commands::SearchSettings;
use cache::{CacheEntry, VersionFencedCache};
use navigation::{Navigator, StepPlan};
use pagination::{Debouncer, ReentrancyLock};
use query::{FilterFingerprint, SearchFingerprint};
use replace::expand_single_replacement;
use run_version::{QueryClass, RunVersions};
use snapshot::SnapshotStore;

/// How a query run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A backend response was applied.
    Applied,
    /// The loaded window was still valid for the current document version.
    CacheHit,
    /// The window was dropped and fetched again from the start.
    Reloaded,
    /// A newer run of the same class started first; nothing was applied.
    Stale,
    /// A continuation fetch for this class is already in flight.
    Busy,
    /// Nothing to run: no active tab, empty query, or no further chunks.
    Skipped,
    Failed,
}

impl RunOutcome {
    pub fn has_results(self) -> bool {
        matches!(
            self,
            RunOutcome::Applied | RunOutcome::CacheHit | RunOutcome::Reloaded
        )
    }
}

enum Prepared<Q> {
    Ready(Q),
    NotReady,
}

type SearchResults = VersionFencedCache<SearchFingerprint, PagedResults<SearchMatch>>;
type SearchCounts = VersionFencedCache<SearchFingerprint, SearchCount>;
type FilterResults = VersionFencedCache<FilterFingerprint, PagedResults<FilterMatch>>;
type FilterCounts = VersionFencedCache<FilterFingerprint, FilterCount>;

#[derive(Default)]
struct PanelState {
    active_tab: Option<String>,
    view: TabSnapshot,
    visible_rows: usize,
    rules: FilterRuleList,
    rule_groups: Vec<FilterRuleGroup>,
    runs: RunVersions,
    search_results: SearchResults,
    search_counts: SearchCounts,
    filter_results: FilterResults,
    filter_counts: FilterCounts,
    search_nav: Navigator,
    filter_nav: Navigator,
    error: Option<(ErrorScope, PanelError)>,
    notice: Option<PanelNotice>,
    snapshots: SnapshotStore,
}

impl PanelState {
    fn search_query(&self) -> Option<SearchQuery> {
        let tab_id = self.active_tab.as_ref()?;
        Some(SearchQuery {
            tab_id: tab_id.clone(),
            keyword: self.view.keyword.clone(),
            mode: self.view.search_mode,
            case_sensitive: self.view.case_sensitive,
            result_filter_keyword: self.view.result_filter_keyword.clone(),
        })
    }

    fn filter_query(&self) -> Option<FilterQuery> {
        let tab_id = self.active_tab.as_ref()?;
        Some(FilterQuery {
            tab_id: tab_id.clone(),
            rules: self.rules.effective_inputs(),
            result_filter_keyword: self.view.result_filter_keyword.clone(),
            case_sensitive: self.view.case_sensitive,
        })
    }

    /// The current search query if it can be sent. An empty keyword clears the
    /// search side; a regex that does not compile clears it and records the error.
    fn prepare_search(&mut self) -> Prepared<SearchQuery> {
        let Some(query) = self.search_query() else {
            return Prepared::NotReady;
        };

        if query.is_empty() {
            self.reset_search();
            self.clear_error(ErrorScope::Search);
            return Prepared::NotReady;
        }

        if query.mode == SearchMode::Regex {
            if let Err(err) = query.build_regex() {
                self.reset_search();
                self.set_error(ErrorScope::Search, PanelError::invalid_pattern(&err));
                return Prepared::NotReady;
            }
        }

        Prepared::Ready(query)
    }

    fn prepare_filter(&mut self) -> Prepared<FilterQuery> {
        let Some(query) = self.filter_query() else {
            return Prepared::NotReady;
        };

        if query.is_empty() {
            self.reset_filter();
            self.clear_error(ErrorScope::Filter);
            return Prepared::NotReady;
        }

        if let Err(err) = self.rules.validate() {
            self.reset_filter();
            self.set_error(ErrorScope::Filter, PanelError::invalid_pattern(&err));
            return Prepared::NotReady;
        }

        Prepared::Ready(query)
    }

    fn reset_search(&mut self) {
        self.runs.supersede(QueryClass::Search);
        self.runs.supersede(QueryClass::SearchCount);
        self.search_results.clear();
        self.search_counts.clear();
        self.search_nav.reset();
    }

    fn reset_filter(&mut self) {
        self.runs.supersede(QueryClass::Filter);
        self.runs.supersede(QueryClass::FilterCount);
        self.filter_results.clear();
        self.filter_counts.clear();
        self.filter_nav.reset();
    }

    fn reset_all(&mut self) {
        self.runs.supersede_all();
        self.search_results.clear();
        self.search_counts.clear();
        self.filter_results.clear();
        self.filter_counts.clear();
        self.search_nav.reset();
        self.filter_nav.reset();
        self.error = None;
        self.notice = None;
    }

    fn set_error(&mut self, scope: ErrorScope, err: PanelError) {
        warn!(?scope, error = %err, "search panel operation failed");
        self.error = Some((scope, err));
    }

    fn clear_error(&mut self, scope: ErrorScope) {
        if matches!(self.error, Some((current, _)) if current == scope) {
            self.error = None;
        }
    }

    fn remember_view(&mut self) {
        if let Some(tab_id) = self.active_tab.as_deref() {
            self.snapshots.set(tab_id, self.view.clone());
        }
    }

    /// A query-affecting input changed: in-flight runs of the old query are
    /// dropped and navigation starts over.
    fn search_inputs_changed(&mut self) {
        self.runs.supersede(QueryClass::Search);
        self.runs.supersede(QueryClass::SearchCount);
        self.search_nav.reset();
        self.notice = None;
        self.remember_view();
    }

    fn filter_inputs_changed(&mut self) {
        self.reset_filter();
        self.clear_error(ErrorScope::Filter);
    }

    fn loaded_search(&self) -> Option<&PagedResults<SearchMatch>> {
        let fingerprint = self.search_query()?.fingerprint();
        self.search_results
            .peek(&fingerprint)
            .map(|entry| &entry.value)
    }

    fn loaded_filter(&self) -> Option<&PagedResults<FilterMatch>> {
        let fingerprint = self.filter_query()?.fingerprint();
        self.filter_results
            .peek(&fingerprint)
            .map(|entry| &entry.value)
    }

    fn search_summary(&self) -> String {
        if self.view.keyword.is_empty() {
            return String::new();
        }

        let count = self
            .search_query()
            .and_then(|query| self.search_counts.peek(&query.fingerprint()).map(|e| e.value));
        let current = self.search_nav.current();

        match (current, count) {
            (_, Some(count)) if count.total_matches == 0 => "No matches".to_string(),
            (Some(index), Some(count)) => format!(
                "{} / {} matches on {} lines",
                index + 1,
                count.total_matches,
                count.matched_lines
            ),
            (None, Some(count)) => format!(
                "{} matches on {} lines",
                count.total_matches, count.matched_lines
            ),
            (Some(index), None) => match self.loaded_search() {
                Some(page) => format!(
                    "{} / {}{}",
                    index + 1,
                    page.len(),
                    if page.has_more() { "+" } else { "" }
                ),
                None => String::new(),
            },
            (None, None) => String::new(),
        }
    }

    fn filter_summary(&self) -> String {
        if self.rules.effective_rules().next().is_none() {
            return String::new();
        }

        let count = self
            .filter_query()
            .and_then(|query| self.filter_counts.peek(&query.fingerprint()).map(|e| e.value));

        match (self.filter_nav.current(), count) {
            (_, Some(count)) if count.matched_lines == 0 => "No matching lines".to_string(),
            (Some(index), Some(count)) => {
                format!("{} / {} lines", index + 1, count.matched_lines)
            }
            (None, Some(count)) => format!("{} lines", count.matched_lines),
            _ => String::new(),
        }
    }
}

/// Selects the item a planned step lands on.
fn apply_step<M: Clone>(
    navigator: &mut Navigator,
    page: &PagedResults<M>,
    plan: StepPlan,
) -> Option<M> {
    match plan {
        StepPlan::MoveTo(index) | StepPlan::WrapTo(index) => {
            navigator.select(index, page.len())?;
            page.items.get(index).cloned()
        }
        StepPlan::FetchMore | StepPlan::Nothing => None,
    }
}

struct PanelInner {
    backend: Arc<dyn DocumentBackend>,
    rule_store: Arc<dyn RuleGroupStore>,
    settings: SearchSettings,
    events: EventBus,
    state: Mutex<PanelState>,
    search_fetch: ReentrancyLock,
    filter_fetch: ReentrancyLock,
    search_debounce: Debouncer,
    filter_debounce: Debouncer,
}

/// Cheap to clone; clones share one panel.
#[derive(Clone)]
pub struct SearchPanel {
    inner: Arc<PanelInner>,
}

impl SearchPanel {
    pub fn new(
        backend: Arc<dyn DocumentBackend>,
        rule_store: Arc<dyn RuleGroupStore>,
        settings: SearchSettings,
    ) -> Self {
        let settings = settings.normalized();
        let delay = settings.load_more_debounce();

        Self {
            inner: Arc::new(PanelInner {
                backend,
                rule_store,
                settings,
                events: EventBus::default(),
                state: Mutex::new(PanelState::default()),
                search_fetch: ReentrancyLock::new(),
                filter_fetch: ReentrancyLock::new(),
                search_debounce: Debouncer::new(delay),
                filter_debounce: Debouncer::new(delay),
            }),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut PanelState) -> R) -> R {
        let mut state = self.inner.state.lock();
        f(&mut state)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PanelEvent> {
        self.inner.events.subscribe()
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.inner.settings
    }

    fn navigate_to(&self, tab_id: &str, line: usize, column: usize, length: usize) {
        self.inner.events.publish(PanelEvent::NavigateToMatch {
            tab_id: tab_id.to_string(),
            line,
            column,
            length,
        });
    }

    fn navigate_to_search_match(&self, tab_id: &str, item: &SearchMatch) {
        self.navigate_to(tab_id, item.line, item.column, item.char_len());
    }

    fn navigate_to_filter_match(&self, tab_id: &str, item: &FilterMatch) {
        self.navigate_to(tab_id, item.line, item.column, item.length);
    }

    fn document_edited(&self, tab_id: &str, line_count: usize) {
        self.inner.events.publish(PanelEvent::DocumentEdited {
            tab_id: tab_id.to_string(),
            line_count,
        });
    }

    // ----- search -----

    /// Runs the current search: results and counts side by side, then fills
    /// the visible list and selects the first match if nothing is selected.
    pub async fn search(&self) -> RunOutcome {
        let (outcome, _) = tokio::join!(
            self.refresh_search(false),
            self.refresh_search_count(false)
        );
        if !outcome.has_results() {
            return outcome;
        }

        self.fill_search_viewport().await;

        let selected = self.with_state(|state| {
            if state.search_nav.current().is_some() {
                return None;
            }
            let tab_id = state.active_tab.clone()?;
            let page = state.loaded_search()?;
            let first = page.items.first()?.clone();
            let len = page.len();
            state.search_nav.select(0, len);
            Some((tab_id, first))
        });

        if let Some((tab_id, item)) = selected {
            self.navigate_to_search_match(&tab_id, &item);
        }

        outcome
    }

    /// Loads the first chunk for the current search. Unless `force`, a loaded
    /// window for the same query is reused after its document version has
    /// been confirmed with the backend.
    pub async fn refresh_search(&self, force: bool) -> RunOutcome {
        let prepared = self.with_state(|state| match state.prepare_search() {
            Prepared::Ready(query) => {
                let token = state.runs.begin(QueryClass::Search);
                let cached = !force && state.search_results.peek(&query.fingerprint()).is_some();
                Some((query, token, cached))
            }
            Prepared::NotReady => None,
        });
        let Some((query, token, cached)) = prepared else {
            return RunOutcome::Skipped;
        };
        let fingerprint = query.fingerprint();

        if cached {
            if let Ok(version) = self.inner.backend.document_version(&query.tab_id).await {
                let hit = self.with_state(|state| {
                    if !state.runs.is_current(token) {
                        return Some(RunOutcome::Stale);
                    }
                    if state.search_results.revalidate(&fingerprint, version).is_some() {
                        state.clear_error(ErrorScope::Search);
                        return Some(RunOutcome::CacheHit);
                    }
                    None
                });
                if let Some(outcome) = hit {
                    debug!(tab_id = %query.tab_id, ?outcome, "search cache lookup");
                    return outcome;
                }
                debug!(tab_id = %query.tab_id, version, "search cache entry outdated");
            }
        }

        let result = self
            .inner
            .backend
            .search_chunk(&query, 0, self.inner.settings.search_chunk_size)
            .await;

        self.with_state(|state| {
            if !state.runs.is_current(token) {
                debug!(tab_id = %query.tab_id, "dropping stale search response");
                return RunOutcome::Stale;
            }

            match result {
                Ok(chunk) => {
                    let page = PagedResults::new(chunk.matches, chunk.next_offset);
                    let len = page.len();
                    state.search_results.store(CacheEntry {
                        fingerprint,
                        document_version: chunk.document_version,
                        value: page,
                    });
                    state.search_nav.clamp(len);
                    state.clear_error(ErrorScope::Search);
                    RunOutcome::Applied
                }
                Err(err) => {
                    state.search_results.clear();
                    state.search_nav.reset();
                    state.set_error(ErrorScope::Search, PanelError::search(err));
                    RunOutcome::Failed
                }
            }
        })
    }

    pub async fn refresh_search_count(&self, force: bool) -> RunOutcome {
        let prepared = self.with_state(|state| match state.prepare_search() {
            Prepared::Ready(query) => {
                let token = state.runs.begin(QueryClass::SearchCount);
                let cached = !force && state.search_counts.peek(&query.fingerprint()).is_some();
                Some((query, token, cached))
            }
            Prepared::NotReady => None,
        });
        let Some((query, token, cached)) = prepared else {
            return RunOutcome::Skipped;
        };
        let fingerprint = query.fingerprint();

        if cached {
            if let Ok(version) = self.inner.backend.document_version(&query.tab_id).await {
                let hit = self.with_state(|state| {
                    if !state.runs.is_current(token) {
                        return Some(RunOutcome::Stale);
                    }
                    state
                        .search_counts
                        .revalidate(&fingerprint, version)
                        .map(|_| RunOutcome::CacheHit)
                });
                if let Some(outcome) = hit {
                    return outcome;
                }
            }
        }

        let result = self.inner.backend.search_count(&query).await;

        self.with_state(|state| {
            if !state.runs.is_current(token) {
                debug!(tab_id = %query.tab_id, "dropping stale search count");
                return RunOutcome::Stale;
            }

            match result {
                Ok(count) => {
                    state.search_counts.store(CacheEntry {
                        fingerprint,
                        document_version: count.document_version,
                        value: count,
                    });
                    RunOutcome::Applied
                }
                Err(err) => {
                    state.search_counts.clear();
                    state.set_error(ErrorScope::Search, PanelError::search(err));
                    RunOutcome::Failed
                }
            }
        })
    }

    /// Appends the next chunk to the loaded search window. Turned away with
    /// [`RunOutcome::Busy`] while another continuation is in flight.
    pub async fn load_more_search(&self) -> RunOutcome {
        let Some(_guard) = self.inner.search_fetch.try_acquire() else {
            return RunOutcome::Busy;
        };

        let prepared = self.with_state(|state| {
            let query = state.search_query().filter(|query| !query.is_empty())?;
            let entry = state.search_results.peek(&query.fingerprint())?;
            let cursor = entry.value.cursor?;
            let version = entry.document_version;
            let token = state.runs.begin(QueryClass::Search);
            Some((query, cursor, version, token))
        });
        let Some((query, cursor, loaded_version, token)) = prepared else {
            return RunOutcome::Skipped;
        };
        let fingerprint = query.fingerprint();

        let result = self
            .inner
            .backend
            .search_chunk(&query, cursor, self.inner.settings.search_chunk_size)
            .await;

        let outcome = self.with_state(|state| {
            if !state.runs.is_current(token) {
                return RunOutcome::Stale;
            }

            match result {
                Ok(chunk) if chunk.document_version != loaded_version => {
                    state.search_results.clear();
                    RunOutcome::Reloaded
                }
                Ok(chunk) => match state.search_results.peek_mut(&fingerprint) {
                    Some(entry) => {
                        let added = entry.value.extend(chunk.matches, chunk.next_offset);
                        debug!(tab_id = %query.tab_id, added, "search window extended");
                        RunOutcome::Applied
                    }
                    None => RunOutcome::Stale,
                },
                Err(err) => {
                    state.search_results.clear();
                    state.search_nav.reset();
                    state.set_error(ErrorScope::Search, PanelError::search(err));
                    RunOutcome::Failed
                }
            }
        });

        if outcome == RunOutcome::Reloaded {
            debug!(tab_id = %query.tab_id, "document changed under search window, reloading");
            return match self.refresh_search(true).await {
                RunOutcome::Applied => RunOutcome::Reloaded,
                other => other,
            };
        }

        outcome
    }

    /// Keeps fetching while the loaded window is shorter than the visible
    /// list, up to the configured number of rounds.
    pub async fn fill_search_viewport(&self) -> usize {
        let mut rounds = 0usize;
        while rounds < self.inner.settings.viewport_fill_max_rounds {
            let needs_fill = self.with_state(|state| {
                let rows = state.visible_rows;
                state
                    .loaded_search()
                    .map(|page| page.needs_fill(rows))
                    .unwrap_or(false)
            });
            if !needs_fill || self.load_more_search().await != RunOutcome::Applied {
                break;
            }
            rounds += 1;
        }
        rounds
    }

    /// Scroll-driven continuation, debounced. Must be called inside a tokio runtime.
    pub fn request_more_search_results(&self) {
        let panel = self.clone();
        self.inner.search_debounce.schedule(async move {
            panel.load_more_search().await;
        });
    }

    /// Moves to the next or previous match, growing the loaded window when
    /// stepping past its end. Before any window is loaded for the query the
    /// nearest match is fetched directly and shown while the window loads.
    pub async fn step(&self, direction: StepDirection) -> Option<SearchMatch> {
        let prepared = self.with_state(|state| match state.prepare_search() {
            Prepared::Ready(query) => {
                let loaded = state.search_results.peek(&query.fingerprint()).is_some();
                Some((query, loaded))
            }
            Prepared::NotReady => None,
        })?;

        let (query, loaded) = prepared;
        if !loaded {
            return self.step_to_first_match(query, direction).await;
        }

        if !self.refresh_search(false).await.has_results() {
            return None;
        }

        let fingerprint = query.fingerprint();
        let (selected, needs_fetch) = self.with_state(|state| {
            let Some(entry) = state.search_results.peek(&fingerprint) else {
                return (None, None);
            };
            let page = &entry.value;
            let plan = state.search_nav.plan_step(page.len(), page.has_more(), direction);
            if plan == StepPlan::FetchMore {
                return (None, Some(page.len()));
            }
            (apply_step(&mut state.search_nav, page, plan), None)
        });

        let selected = match needs_fetch {
            Some(previous_len) => {
                if self.load_more_search().await == RunOutcome::Busy {
                    return None;
                }
                self.with_state(|state| {
                    let entry = state.search_results.peek(&fingerprint)?;
                    let page = &entry.value;
                    let index = state.search_nav.finish_fetch_step(previous_len, page.len())?;
                    page.items.get(index).cloned()
                })
            }
            None => selected,
        };

        if let Some(item) = &selected {
            self.navigate_to_search_match(&query.tab_id, item);
        }
        selected
    }

    /// Steps in the direction of the panel's reverse toggle.
    pub async fn find_next(&self) -> Option<SearchMatch> {
        let reverse = self.with_state(|state| state.view.reverse_search);
        self.step(StepDirection::from_reverse(reverse)).await
    }

    pub async fn find_previous(&self) -> Option<SearchMatch> {
        let reverse = self.with_state(|state| state.view.reverse_search);
        self.step(StepDirection::from_reverse(!reverse)).await
    }

    async fn step_to_first_match(
        &self,
        query: SearchQuery,
        direction: StepDirection,
    ) -> Option<SearchMatch> {
        let token = self.with_state(|state| state.runs.begin(QueryClass::Search));
        let result = self
            .inner
            .backend
            .search_first(&query, direction.is_reverse())
            .await;

        let first = self.with_state(|state| {
            if !state.runs.is_current(token) {
                return Err(());
            }
            match result {
                Ok(found) => Ok(found.first_match),
                Err(err) => {
                    state.search_results.clear();
                    state.search_nav.reset();
                    state.set_error(ErrorScope::Search, PanelError::search(err));
                    Err(())
                }
            }
        });
        let first = first.ok()?;

        if let Some(item) = &first {
            self.navigate_to_search_match(&query.tab_id, item);
        }

        let (outcome, _) = tokio::join!(
            self.refresh_search(true),
            self.refresh_search_count(false)
        );
        let first = first?;
        if !outcome.has_results() {
            return Some(first);
        }

        // The shown match can lie past the first chunk; grow the window until
        // it is loaded so the next step continues from it.
        let fingerprint = query.fingerprint();
        loop {
            let located = self.with_state(|state| {
                let page = &state.search_results.peek(&fingerprint)?.value;
                let index = page
                    .items
                    .iter()
                    .position(|item| item.start == first.start && item.end == first.end);
                let passed = page.items.last().is_some_and(|item| item.start >= first.start);
                Some((index, page.has_more() && !passed))
            });

            match located {
                Some((Some(index), _)) => {
                    self.with_state(|state| {
                        let len = state.loaded_search().map_or(0, PagedResults::len);
                        state.search_nav.select(index, len);
                    });
                    break;
                }
                Some((None, true)) => {
                    if self.load_more_search().await != RunOutcome::Applied {
                        break;
                    }
                }
                Some((None, false)) => {
                    self.with_state(|state| {
                        let len = state.loaded_search().map_or(0, PagedResults::len);
                        let index = match direction {
                            StepDirection::Forward => 0,
                            StepDirection::Backward => len.saturating_sub(1),
                        };
                        state.search_nav.select(index, len);
                    });
                    break;
                }
                None => break,
            }
        }

        Some(first)
    }

    // ----- filter -----

    pub async fn filter(&self) -> RunOutcome {
        let (outcome, _) = tokio::join!(
            self.refresh_filter(false),
            self.refresh_filter_count(false)
        );
        if outcome.has_results() {
            self.fill_filter_viewport().await;
        }
        outcome
    }

    pub async fn refresh_filter(&self, force: bool) -> RunOutcome {
        let prepared = self.with_state(|state| match state.prepare_filter() {
            Prepared::Ready(query) => {
                let token = state.runs.begin(QueryClass::Filter);
                let cached = !force && state.filter_results.peek(&query.fingerprint()).is_some();
                Some((query, token, cached))
            }
            Prepared::NotReady => None,
        });
        let Some((query, token, cached)) = prepared else {
            return RunOutcome::Skipped;
        };
        let fingerprint = query.fingerprint();

        if cached {
            if let Ok(version) = self.inner.backend.document_version(&query.tab_id).await {
                let hit = self.with_state(|state| {
                    if !state.runs.is_current(token) {
                        return Some(RunOutcome::Stale);
                    }
                    if state.filter_results.revalidate(&fingerprint, version).is_some() {
                        state.clear_error(ErrorScope::Filter);
                        return Some(RunOutcome::CacheHit);
                    }
                    None
                });
                if let Some(outcome) = hit {
                    debug!(tab_id = %query.tab_id, ?outcome, "filter cache lookup");
                    return outcome;
                }
                debug!(tab_id = %query.tab_id, version, "filter cache entry outdated");
            }
        }

        let result = self
            .inner
            .backend
            .filter_chunk(
                &query.tab_id,
                &query.rules,
                query.result_filter(),
                query.case_sensitive,
                0,
                self.inner.settings.filter_chunk_size,
            )
            .await;

        self.with_state(|state| {
            if !state.runs.is_current(token) {
                debug!(tab_id = %query.tab_id, "dropping stale filter response");
                return RunOutcome::Stale;
            }

            match result {
                Ok(chunk) => {
                    let page = PagedResults::new(chunk.matches, chunk.next_line);
                    let len = page.len();
                    state.filter_results.store(CacheEntry {
                        fingerprint,
                        document_version: chunk.document_version,
                        value: page,
                    });
                    state.filter_nav.clamp(len);
                    state.clear_error(ErrorScope::Filter);
                    RunOutcome::Applied
                }
                Err(err) => {
                    state.filter_results.clear();
                    state.filter_nav.reset();
                    state.set_error(ErrorScope::Filter, PanelError::filter(err));
                    RunOutcome::Failed
                }
            }
        })
    }

    pub async fn refresh_filter_count(&self, force: bool) -> RunOutcome {
        let prepared = self.with_state(|state| match state.prepare_filter() {
            Prepared::Ready(query) => {
                let token = state.runs.begin(QueryClass::FilterCount);
                let cached = !force && state.filter_counts.peek(&query.fingerprint()).is_some();
                Some((query, token, cached))
            }
            Prepared::NotReady => None,
        });
        let Some((query, token, cached)) = prepared else {
            return RunOutcome::Skipped;
        };
        let fingerprint = query.fingerprint();

        if cached {
            if let Ok(version) = self.inner.backend.document_version(&query.tab_id).await {
                let hit = self.with_state(|state| {
                    if !state.runs.is_current(token) {
                        return Some(RunOutcome::Stale);
                    }
                    state
                        .filter_counts
                        .revalidate(&fingerprint, version)
                        .map(|_| RunOutcome::CacheHit)
                });
                if let Some(outcome) = hit {
                    return outcome;
                }
            }
        }

        let result = self
            .inner
            .backend
            .filter_count(
                &query.tab_id,
                &query.rules,
                query.result_filter(),
                query.case_sensitive,
            )
            .await;

        self.with_state(|state| {
            if !state.runs.is_current(token) {
                debug!(tab_id = %query.tab_id, "dropping stale filter count");
                return RunOutcome::Stale;
            }

            match result {
                Ok(count) => {
                    state.filter_counts.store(CacheEntry {
                        fingerprint,
                        document_version: count.document_version,
                        value: count,
                    });
                    RunOutcome::Applied
                }
                Err(err) => {
                    state.filter_counts.clear();
                    state.set_error(ErrorScope::Filter, PanelError::filter(err));
                    RunOutcome::Failed
                }
            }
        })
    }

    pub async fn load_more_filter(&self) -> RunOutcome {
        let Some(_guard) = self.inner.filter_fetch.try_acquire() else {
            return RunOutcome::Busy;
        };

        let prepared = self.with_state(|state| {
            let query = state.filter_query().filter(|query| !query.is_empty())?;
            let entry = state.filter_results.peek(&query.fingerprint())?;
            let cursor = entry.value.cursor?;
            let version = entry.document_version;
            let token = state.runs.begin(QueryClass::Filter);
            Some((query, cursor, version, token))
        });
        let Some((query, cursor, loaded_version, token)) = prepared else {
            return RunOutcome::Skipped;
        };
        let fingerprint = query.fingerprint();

        let result = self
            .inner
            .backend
            .filter_chunk(
                &query.tab_id,
                &query.rules,
                query.result_filter(),
                query.case_sensitive,
                cursor,
                self.inner.settings.filter_chunk_size,
            )
            .await;

        let outcome = self.with_state(|state| {
            if !state.runs.is_current(token) {
                return RunOutcome::Stale;
            }

            match result {
                Ok(chunk) if chunk.document_version != loaded_version => {
                    state.filter_results.clear();
                    RunOutcome::Reloaded
                }
                Ok(chunk) => match state.filter_results.peek_mut(&fingerprint) {
                    Some(entry) => {
                        let added = entry.value.extend(chunk.matches, chunk.next_line);
                        debug!(tab_id = %query.tab_id, added, "filter window extended");
                        RunOutcome::Applied
                    }
                    None => RunOutcome::Stale,
                },
                Err(err) => {
                    state.filter_results.clear();
                    state.filter_nav.reset();
                    state.set_error(ErrorScope::Filter, PanelError::filter(err));
                    RunOutcome::Failed
                }
            }
        });

        if outcome == RunOutcome::Reloaded {
            debug!(tab_id = %query.tab_id, "document changed under filter window, reloading");
            return match self.refresh_filter(true).await {
                RunOutcome::Applied => RunOutcome::Reloaded,
                other => other,
            };
        }

        outcome
    }

    pub async fn fill_filter_viewport(&self) -> usize {
        let mut rounds = 0usize;
        while rounds < self.inner.settings.viewport_fill_max_rounds {
            let needs_fill = self.with_state(|state| {
                let rows = state.visible_rows;
                state
                    .loaded_filter()
                    .map(|page| page.needs_fill(rows))
                    .unwrap_or(false)
            });
            if !needs_fill || self.load_more_filter().await != RunOutcome::Applied {
                break;
            }
            rounds += 1;
        }
        rounds
    }

    /// Scroll-driven continuation, debounced. Must be called inside a tokio runtime.
    pub fn request_more_filter_results(&self) {
        let panel = self.clone();
        self.inner.filter_debounce.schedule(async move {
            panel.load_more_filter().await;
        });
    }

    /// Moves through the matched lines. There is no single-line fast path:
    /// the first chunk is loaded before the first step lands.
    pub async fn step_filter(&self, direction: StepDirection) -> Option<FilterMatch> {
        if !self.refresh_filter(false).await.has_results() {
            return None;
        }

        let (tab_id, fingerprint) = self.with_state(|state| {
            let query = state.filter_query()?;
            Some((query.tab_id.clone(), query.fingerprint()))
        })?;

        let (selected, needs_fetch) = self.with_state(|state| {
            let Some(entry) = state.filter_results.peek(&fingerprint) else {
                return (None, None);
            };
            let page = &entry.value;
            let plan = state.filter_nav.plan_step(page.len(), page.has_more(), direction);
            if plan == StepPlan::FetchMore {
                return (None, Some(page.len()));
            }
            (apply_step(&mut state.filter_nav, page, plan), None)
        });

        let selected = match needs_fetch {
            Some(previous_len) => {
                if self.load_more_filter().await == RunOutcome::Busy {
                    return None;
                }
                self.with_state(|state| {
                    let entry = state.filter_results.peek(&fingerprint)?;
                    let page = &entry.value;
                    let index = state.filter_nav.finish_fetch_step(previous_len, page.len())?;
                    page.items.get(index).cloned()
                })
            }
            None => selected,
        };

        if let Some(item) = &selected {
            self.navigate_to_filter_match(&tab_id, item);
        }
        selected
    }

    // ----- replace -----

    /// Replaces the selected match (the first one when nothing is selected)
    /// after re-running the query against the current document.
    pub async fn replace_current(&self) -> Result<usize, PanelError> {
        let outcome = self.refresh_search(true).await;
        if outcome == RunOutcome::Failed {
            return Err(self.current_error(ErrorScope::Search));
        }
        if let Some(err) = self.invalid_pattern_error() {
            return Err(err);
        }

        let target = self.with_state(|state| {
            let query = state.search_query()?;
            let entry = state.search_results.peek(&query.fingerprint())?;
            let items = &entry.value.items;
            if items.is_empty() {
                return None;
            }
            let index = state.search_nav.current().unwrap_or(0).min(items.len() - 1);
            Some((query, index, items[index].clone(), state.view.replace_value.clone()))
        });
        let Some((query, index, item, template)) = target else {
            self.with_state(|state| state.notice = Some(PanelNotice::NoMatchesToReplace));
            return Ok(0);
        };

        let regex = match query.mode {
            SearchMode::Regex => Some(query.build_regex().map_err(|err| {
                let err = PanelError::invalid_pattern(&err);
                self.with_state(|state| state.set_error(ErrorScope::Search, err.clone()));
                err
            })?),
            _ => None,
        };
        let Some(replacement) = expand_single_replacement(regex.as_ref(), &item, &template) else {
            debug!(tab_id = %query.tab_id, line = item.line, "pattern no longer matches at selection");
            self.with_state(|state| state.notice = Some(PanelNotice::NoMatchesToReplace));
            return Ok(0);
        };

        let line_count = match self
            .inner
            .backend
            .edit_text(&query.tab_id, item.start_char, item.end_char, &replacement)
            .await
        {
            Ok(line_count) => line_count,
            Err(err) => {
                let err = PanelError::ReplaceFailed(err.0);
                self.with_state(|state| state.set_error(ErrorScope::Replace, err.clone()));
                return Err(err);
            }
        };

        info!(tab_id = %query.tab_id, line = item.line, "replaced current match");
        self.document_edited(&query.tab_id, line_count);
        self.with_state(|state| {
            state.clear_error(ErrorScope::Replace);
            state.notice = Some(PanelNotice::Replaced { count: 1 });
        });

        tokio::join!(self.refresh_search(true), self.refresh_search_count(true));

        let next = self.with_state(|state| {
            let page = state.loaded_search()?;
            let len = page.len();
            let index = index.min(len.checked_sub(1)?);
            let item = page.items.get(index)?.clone();
            state.search_nav.select(index, len);
            Some(item)
        });
        if let Some(item) = next {
            self.navigate_to_search_match(&query.tab_id, &item);
        }

        Ok(1)
    }

    /// Replaces every match of the current query. Regex queries substitute
    /// over the whole document text in one pass; literal and wildcard queries
    /// send one edit per match with offsets shifted by earlier edits.
    pub async fn replace_all(&self) -> Result<usize, PanelError> {
        let prepared = self.with_state(|state| match state.prepare_search() {
            Prepared::Ready(query) => Some((query, state.view.replace_value.clone())),
            Prepared::NotReady => None,
        });
        let Some((query, template)) = prepared else {
            if let Some(err) = self.invalid_pattern_error() {
                return Err(err);
            }
            self.with_state(|state| state.notice = Some(PanelNotice::NoMatchesToReplace));
            return Ok(0);
        };

        let result = match query.mode {
            SearchMode::Regex => self.replace_all_regex(&query, &template).await,
            SearchMode::Literal | SearchMode::Wildcard => {
                self.replace_all_sequential(&query, &template).await
            }
        };

        let replaced = match result {
            Ok(replaced) => replaced,
            Err(err) => {
                self.with_state(|state| state.set_error(ErrorScope::Replace, err.clone()));
                tokio::join!(self.refresh_search(true), self.refresh_search_count(true));
                return Err(err);
            }
        };

        self.with_state(|state| {
            state.clear_error(ErrorScope::Replace);
            state.notice = Some(if replaced == 0 {
                PanelNotice::NoMatchesToReplace
            } else {
                PanelNotice::Replaced { count: replaced }
            });
        });
        if replaced == 0 {
            return Ok(0);
        }

        info!(tab_id = %query.tab_id, replaced, mode = query.mode.label(), "replaced all matches");
        tokio::join!(self.refresh_search(true), self.refresh_search_count(true));
        self.with_state(|state| {
            state.search_nav.reset();
            if let Some(len) = state.loaded_search().map(PagedResults::len) {
                state.search_nav.select(0, len);
            }
        });

        Ok(replaced)
    }

    async fn replace_all_regex(&self, query: &SearchQuery, template: &str) -> Result<usize, PanelError> {
        let regex = query
            .build_regex()
            .map_err(|err| PanelError::invalid_pattern(&err))?;
        let backend = &self.inner.backend;

        let document = backend
            .document_text(&query.tab_id)
            .await
            .map_err(|err| PanelError::ReplaceAllFailed(err.0))?;

        let (text, replaced) = replace_all_with_regex(
            &regex,
            &document.text,
            template,
            query.result_filter(),
            query.case_sensitive,
        );
        if replaced == 0 {
            return Ok(0);
        }

        let current_version = backend
            .document_version(&query.tab_id)
            .await
            .map_err(|err| PanelError::ReplaceAllFailed(err.0))?;
        if current_version != document.document_version {
            return Err(PanelError::ReplaceAllFailed(
                "Document changed while replacing".to_string(),
            ));
        }

        let line_count = backend
            .replace_range(&query.tab_id, 0, document.line_count, &text)
            .await
            .map_err(|err| PanelError::ReplaceAllFailed(err.0))?;

        self.document_edited(&query.tab_id, line_count);
        Ok(replaced)
    }

    async fn replace_all_sequential(&self, query: &SearchQuery, template: &str) -> Result<usize, PanelError> {
        let matches = self
            .collect_all_search_matches(query)
            .await
            .map_err(|err| PanelError::ReplaceAllFailed(err.0))?;
        if matches.is_empty() {
            return Ok(0);
        }

        let edits = plan_sequential_edits(&matches, template);
        let total = edits.len();
        let mut line_count = None;

        for (applied, edit) in edits.iter().enumerate() {
            match self
                .inner
                .backend
                .edit_text(&query.tab_id, edit.start_char, edit.end_char, &edit.text)
                .await
            {
                Ok(count) => line_count = Some(count),
                Err(err) => {
                    if let Some(line_count) = line_count {
                        self.document_edited(&query.tab_id, line_count);
                    }
                    return Err(PanelError::ReplaceAllFailed(format!(
                        "{} ({} of {} replacements applied)",
                        err.0, applied, total
                    )));
                }
            }
        }

        if let Some(line_count) = line_count {
            self.document_edited(&query.tab_id, line_count);
        }
        Ok(total)
    }

    /// Every match of `query` in one document version: the loaded window when
    /// it is still current, then the remaining chunks.
    async fn collect_all_search_matches(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<SearchMatch>, BackendError> {
        let backend = &self.inner.backend;
        let chunk_size = self.inner.settings.search_chunk_size;
        let fingerprint = query.fingerprint();

        let version = backend.document_version(&query.tab_id).await?;
        let loaded = self.with_state(|state| {
            state
                .search_results
                .revalidate(&fingerprint, version)
                .map(|entry| (entry.value.items.clone(), entry.value.cursor))
        });

        let (mut matches, mut cursor, expected_version) = match loaded {
            Some((items, cursor)) => (items, cursor, version),
            None => {
                let chunk = backend.search_chunk(query, 0, chunk_size).await?;
                (chunk.matches, chunk.next_offset, chunk.document_version)
            }
        };

        while let Some(offset) = cursor {
            let chunk = backend.search_chunk(query, offset, chunk_size).await?;
            if chunk.document_version != expected_version {
                return Err(BackendError::from("Document changed while collecting matches"));
            }
            matches.extend(chunk.matches);
            cursor = chunk.next_offset;
        }

        Ok(matches)
    }

    /// The search pattern error recorded by the last query preparation.
    fn invalid_pattern_error(&self) -> Option<PanelError> {
        self.with_state(|state| match &state.error {
            Some((ErrorScope::Search, err @ PanelError::InvalidPattern(_))) => Some(err.clone()),
            _ => None,
        })
    }

    fn current_error(&self, scope: ErrorScope) -> PanelError {
        self.with_state(|state| match &state.error {
            Some((current, err)) if *current == scope => err.clone(),
            _ => PanelError::SearchFailed("Search did not complete".to_string()),
        })
    }

    // ----- filter rules -----

    pub fn rules(&self) -> Vec<FilterRule> {
        self.with_state(|state| state.rules.rules().to_vec())
    }

    pub fn add_rule(&self, rule: FilterRule) -> Uuid {
        self.with_state(|state| {
            let id = state.rules.add(rule);
            state.filter_inputs_changed();
            id
        })
    }

    pub fn update_rule(&self, rule: FilterRule) -> bool {
        self.with_state(|state| {
            let updated = state.rules.update(rule);
            if updated {
                state.filter_inputs_changed();
            }
            updated
        })
    }

    pub fn remove_rule(&self, id: Uuid) -> bool {
        self.with_state(|state| {
            let removed = state.rules.remove(id).is_some();
            if removed {
                state.filter_inputs_changed();
            }
            removed
        })
    }

    /// Drops `dragged` onto the slot held by `target`.
    pub fn move_rule(&self, dragged: Uuid, target: Uuid) -> bool {
        self.with_state(|state| {
            let moved = state.rules.move_rule(dragged, target);
            if moved {
                state.filter_inputs_changed();
            }
            moved
        })
    }

    pub fn clear_rules(&self) {
        self.with_state(|state| {
            state.rules.clear();
            state.filter_inputs_changed();
        });
    }

    // ----- rule groups -----

    pub fn rule_groups(&self) -> Vec<FilterRuleGroup> {
        self.with_state(|state| state.rule_groups.clone())
    }

    pub async fn refresh_rule_groups(&self) -> Result<Vec<FilterRuleGroup>, PanelError> {
        match self.inner.rule_store.load_rule_groups().await {
            Ok(groups) => {
                let groups = normalize_rule_groups(groups);
                self.with_state(|state| {
                    state.rule_groups = groups.clone();
                    state.clear_error(ErrorScope::RuleGroups);
                });
                Ok(groups)
            }
            Err(err) => Err(self.rule_group_error(PanelError::RuleGroupLoadFailed(err.0))),
        }
    }

    /// Saves the current rules under `name`, replacing a group of the same name.
    pub async fn save_rule_group(&self, name: &str) -> Result<(), PanelError> {
        let group = self.with_state(|state| FilterRuleGroup {
            name: name.to_string(),
            rules: state.rules.effective_inputs(),
        });

        let mut groups = match self.inner.rule_store.load_rule_groups().await {
            Ok(groups) => normalize_rule_groups(groups),
            Err(err) => return Err(self.rule_group_error(PanelError::RuleGroupSaveFailed(err.0))),
        };
        if !filter_rules::upsert_group(&mut groups, group) {
            return Err(self.rule_group_error(PanelError::RuleGroupSaveFailed(
                "A rule group needs a name and at least one rule with a keyword".to_string(),
            )));
        }

        self.store_rule_groups(groups, PanelError::RuleGroupSaveFailed).await
    }

    /// Replaces the current rules with the named group's rules.
    pub async fn load_rule_group(&self, name: &str) -> Result<(), PanelError> {
        let name = name.trim();
        let known = self.with_state(|state| {
            state
                .rule_groups
                .iter()
                .find(|group| group.name == name)
                .cloned()
        });
        let group = match known {
            Some(group) => Some(group),
            None => self
                .refresh_rule_groups()
                .await?
                .into_iter()
                .find(|group| group.name == name),
        };
        let Some(group) = group else {
            return Err(self.rule_group_error(PanelError::RuleGroupLoadFailed(format!(
                "Rule group not found: {name}"
            ))));
        };

        self.with_state(|state| {
            state.rules.load_group(&group);
            state.filter_inputs_changed();
            state.clear_error(ErrorScope::RuleGroups);
        });
        Ok(())
    }

    pub async fn delete_rule_group(&self, name: &str) -> Result<(), PanelError> {
        let mut groups = match self.inner.rule_store.load_rule_groups().await {
            Ok(groups) => normalize_rule_groups(groups),
            Err(err) => return Err(self.rule_group_error(PanelError::RuleGroupSaveFailed(err.0))),
        };
        if !filter_rules::remove_group(&mut groups, name) {
            return Ok(());
        }

        self.store_rule_groups(groups, PanelError::RuleGroupSaveFailed).await
    }

    /// Merges the groups in `path` into the stored set; incoming groups win
    /// by name. Returns how many groups the file contributed.
    pub async fn import_rule_groups(&self, path: &Path) -> Result<usize, PanelError> {
        let incoming = match self.inner.rule_store.import_rule_groups(path).await {
            Ok(groups) => normalize_rule_groups(groups),
            Err(err) => {
                return Err(self.rule_group_error(PanelError::RuleGroupImportFailed(err.0)))
            }
        };
        if incoming.is_empty() {
            return Err(self.rule_group_error(PanelError::RuleGroupImportFailed(
                "No valid filter rule groups found in import file".to_string(),
            )));
        }

        let existing = match self.inner.rule_store.load_rule_groups().await {
            Ok(groups) => groups,
            Err(err) => {
                return Err(self.rule_group_error(PanelError::RuleGroupImportFailed(err.0)))
            }
        };
        let imported = incoming.len();
        let merged = merge_groups(existing, incoming);

        self.store_rule_groups(merged, PanelError::RuleGroupImportFailed)
            .await?;
        info!(path = %path.display(), imported, "imported filter rule groups");
        Ok(imported)
    }

    pub async fn export_rule_groups(&self, path: &Path) -> Result<usize, PanelError> {
        let groups = match self.inner.rule_store.load_rule_groups().await {
            Ok(groups) => normalize_rule_groups(groups),
            Err(err) => {
                return Err(self.rule_group_error(PanelError::RuleGroupExportFailed(err.0)))
            }
        };
        if groups.is_empty() {
            return Err(self.rule_group_error(PanelError::RuleGroupExportFailed(
                "No valid filter rule groups to export".to_string(),
            )));
        }

        if let Err(err) = self.inner.rule_store.export_rule_groups(path, &groups).await {
            return Err(self.rule_group_error(PanelError::RuleGroupExportFailed(err.0)));
        }

        self.with_state(|state| state.clear_error(ErrorScope::RuleGroups));
        Ok(groups.len())
    }

    async fn store_rule_groups(
        &self,
        groups: Vec<FilterRuleGroup>,
        on_error: fn(String) -> PanelError,
    ) -> Result<(), PanelError> {
        if let Err(err) = self.inner.rule_store.save_rule_groups(&groups).await {
            return Err(self.rule_group_error(on_error(err.0)));
        }

        self.with_state(|state| {
            state.rule_groups = groups;
            state.clear_error(ErrorScope::RuleGroups);
        });
        Ok(())
    }

    fn rule_group_error(&self, err: PanelError) -> PanelError {
        self.with_state(|state| state.set_error(ErrorScope::RuleGroups, err.clone()));
        err
    }

    // ----- panel intents -----

    pub fn open_panel(&self, mode: PanelMode) {
        self.with_state(|state| {
            state.view.is_open = true;
            state.view.mode = mode;
            state.remember_view();
        });
    }

    pub fn close_panel(&self) {
        self.inner.search_debounce.cancel();
        self.inner.filter_debounce.cancel();

        let tab_id = self.with_state(|state| {
            state.view.is_open = false;
            state.remember_view();
            state.active_tab.clone()
        });
        if let Some(tab_id) = tab_id {
            self.inner.events.publish(PanelEvent::PanelClosed { tab_id });
        }
    }

    pub fn set_keyword(&self, keyword: impl Into<String>) {
        let keyword = keyword.into();
        self.with_state(|state| {
            if state.view.keyword != keyword {
                state.view.keyword = keyword;
                state.search_inputs_changed();
            }
        });
    }

    pub fn set_search_mode(&self, mode: SearchMode) {
        self.with_state(|state| {
            if state.view.search_mode != mode {
                state.view.search_mode = mode;
                state.search_inputs_changed();
            }
        });
    }

    pub fn set_case_sensitive(&self, case_sensitive: bool) {
        self.with_state(|state| {
            if state.view.case_sensitive != case_sensitive {
                state.view.case_sensitive = case_sensitive;
                state.search_inputs_changed();
                state.filter_inputs_changed();
            }
        });
    }

    /// The result filter narrows both the search and the filter results.
    pub fn set_result_filter_keyword(&self, keyword: impl Into<String>) {
        let keyword = keyword.into();
        self.with_state(|state| {
            if state.view.result_filter_keyword != keyword {
                state.view.result_filter_keyword = keyword;
                state.search_inputs_changed();
                state.filter_inputs_changed();
            }
        });
    }

    pub fn set_replace_value(&self, value: impl Into<String>) {
        let value = value.into();
        self.with_state(|state| {
            state.view.replace_value = value;
            state.remember_view();
        });
    }

    pub fn set_reverse_search(&self, reverse: bool) {
        self.with_state(|state| {
            state.view.reverse_search = reverse;
            state.remember_view();
        });
    }

    /// Rows the result list can show; drives viewport filling.
    pub fn set_visible_rows(&self, rows: usize) {
        self.with_state(|state| state.visible_rows = rows);
    }

    // ----- tabs -----

    /// Switches the panel to `tab_id`: every loaded window, count and
    /// in-flight run is dropped, and the tab's last panel inputs come back
    /// (or the defaults for a tab never seen before).
    pub fn activate_tab(&self, tab_id: impl Into<String>) {
        let tab_id = tab_id.into();
        let switched = self.with_state(|state| {
            if state.active_tab.as_deref() == Some(tab_id.as_str()) {
                return false;
            }

            state.reset_all();
            let restored = state.snapshots.get(&tab_id).cloned();
            debug!(tab_id = %tab_id, restored = restored.is_some(), "search panel switched tab");
            state.view = restored.unwrap_or_default();
            state.active_tab = Some(tab_id);
            true
        });

        if switched {
            self.inner.search_debounce.cancel();
            self.inner.filter_debounce.cancel();
        }
    }

    pub fn close_tab(&self, tab_id: &str) {
        self.with_state(|state| {
            state.snapshots.remove(tab_id);
            if state.active_tab.as_deref() == Some(tab_id) {
                state.reset_all();
                state.active_tab = None;
                state.view = TabSnapshot::default();
            }
        });
    }

    // ----- derived state -----

    pub fn active_tab(&self) -> Option<String> {
        self.with_state(|state| state.active_tab.clone())
    }

    pub fn view(&self) -> TabSnapshot {
        self.with_state(|state| state.view.clone())
    }

    pub fn snapshot(&self, tab_id: &str) -> Option<TabSnapshot> {
        self.with_state(|state| state.snapshots.get(tab_id).cloned())
    }

    pub fn search_results(&self) -> Vec<SearchMatch> {
        self.with_state(|state| {
            state
                .loaded_search()
                .map(|page| page.items.clone())
                .unwrap_or_default()
        })
    }

    pub fn has_more_search_results(&self) -> bool {
        self.with_state(|state| state.loaded_search().is_some_and(PagedResults::has_more))
    }

    pub fn search_count(&self) -> Option<SearchCount> {
        self.with_state(|state| {
            let fingerprint = state.search_query()?.fingerprint();
            state.search_counts.peek(&fingerprint).map(|entry| entry.value)
        })
    }

    pub fn current_search_index(&self) -> Option<usize> {
        self.with_state(|state| state.search_nav.current())
    }

    pub fn current_search_match(&self) -> Option<SearchMatch> {
        self.with_state(|state| {
            let index = state.search_nav.current()?;
            state.loaded_search()?.items.get(index).cloned()
        })
    }

    pub fn filter_results(&self) -> Vec<FilterMatch> {
        self.with_state(|state| {
            state
                .loaded_filter()
                .map(|page| page.items.clone())
                .unwrap_or_default()
        })
    }

    pub fn has_more_filter_results(&self) -> bool {
        self.with_state(|state| state.loaded_filter().is_some_and(PagedResults::has_more))
    }

    pub fn filter_count(&self) -> Option<FilterCount> {
        self.with_state(|state| {
            let fingerprint = state.filter_query()?.fingerprint();
            state.filter_counts.peek(&fingerprint).map(|entry| entry.value)
        })
    }

    pub fn current_filter_index(&self) -> Option<usize> {
        self.with_state(|state| state.filter_nav.current())
    }

    pub fn error(&self) -> Option<PanelError> {
        self.with_state(|state| state.error.as_ref().map(|(_, err)| err.clone()))
    }

    pub fn error_scope(&self) -> Option<ErrorScope> {
        self.with_state(|state| state.error.as_ref().map(|(scope, _)| *scope))
    }

    pub fn notice(&self) -> Option<PanelNotice> {
        self.with_state(|state| state.notice)
    }

    /// The most recent error, else the last replace notice, else a
    /// progress summary for the panel's mode.
    pub fn status_line(&self) -> String {
        self.with_state(|state| {
            if let Some((_, err)) = &state.error {
                return err.to_string();
            }
            if let Some(notice) = state.notice {
                return notice.to_string();
            }
            match state.view.mode {
                PanelMode::Filter => state.filter_summary(),
                PanelMode::Find | PanelMode::Replace => state.search_summary(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
    use std::time::Duration;

    fn found(start: usize, line: usize) -> SearchMatch {
        SearchMatch {
            start,
            end: start + 1,
            start_char: start,
            end_char: start + 1,
            text: "x".to_string(),
            line,
            column: 1,
            line_text: "x".to_string(),
        }
    }

    fn matched_line(line: usize) -> FilterMatch {
        FilterMatch {
            line,
            column: 1,
            length: 1,
            line_text: "x".to_string(),
            rule_index: 0,
            style: FilterRuleStyle::default(),
            highlight: FilterHighlight::Line,
        }
    }

    /// Serves scripted chunks, optionally delaying each response.
    #[derive(Default)]
    struct ScriptedBackend {
        version: AtomicU64,
        chunks: Mutex<VecDeque<(Duration, Result<SearchChunk, BackendError>)>>,
        chunk_calls: AtomicUsize,
        count_calls: AtomicUsize,
        edits: Mutex<Vec<(usize, usize, String)>>,
        filter_chunks: Mutex<VecDeque<FilterChunk>>,
        filter_chunk_calls: AtomicUsize,
        text: Mutex<Option<String>>,
        edit_after_text_fetch: AtomicBool,
        range_writes: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn push_chunk(&self, delay_ms: u64, matches: Vec<SearchMatch>, next_offset: Option<usize>) {
            let chunk = SearchChunk {
                matches,
                document_version: self.version.load(Ordering::SeqCst),
                next_offset,
            };
            self.chunks
                .lock()
                .push_back((Duration::from_millis(delay_ms), Ok(chunk)));
        }

        fn push_filter_chunk(&self, matches: Vec<FilterMatch>, next_line: Option<usize>) {
            self.filter_chunks.lock().push_back(FilterChunk {
                matches,
                document_version: self.version.load(Ordering::SeqCst),
                next_line,
            });
        }

        fn push_failure(&self, message: &str) {
            self.chunks
                .lock()
                .push_back((Duration::ZERO, Err(BackendError::from(message))));
        }
    }

    #[async_trait]
    impl DocumentBackend for ScriptedBackend {
        async fn document_version(&self, _tab_id: &str) -> Result<u64, BackendError> {
            Ok(self.version.load(Ordering::SeqCst))
        }

        async fn search_count(&self, _query: &SearchQuery) -> Result<SearchCount, BackendError> {
            self.count_calls.fetch_add(1, Ordering::SeqCst);
            Ok(SearchCount {
                total_matches: 3,
                matched_lines: 2,
                document_version: self.version.load(Ordering::SeqCst),
            })
        }

        async fn search_chunk(
            &self,
            _query: &SearchQuery,
            _start_offset: usize,
            _max_results: usize,
        ) -> Result<SearchChunk, BackendError> {
            self.chunk_calls.fetch_add(1, Ordering::SeqCst);
            let next = self.chunks.lock().pop_front();
            match next {
                Some((delay, result)) => {
                    tokio::time::sleep(delay).await;
                    result
                }
                None => Ok(SearchChunk {
                    matches: Vec::new(),
                    document_version: self.version.load(Ordering::SeqCst),
                    next_offset: None,
                }),
            }
        }

        async fn search_first(
            &self,
            _query: &SearchQuery,
            reverse: bool,
        ) -> Result<SearchFirst, BackendError> {
            Ok(SearchFirst {
                first_match: Some(if reverse { found(20, 3) } else { found(0, 1) }),
                document_version: self.version.load(Ordering::SeqCst),
            })
        }

        async fn filter_count(
            &self,
            _tab_id: &str,
            _rules: &[FilterRuleInput],
            _result_filter_keyword: Option<&str>,
            _case_sensitive: bool,
        ) -> Result<FilterCount, BackendError> {
            Err(BackendError::from("filter unsupported"))
        }

        async fn filter_chunk(
            &self,
            _tab_id: &str,
            _rules: &[FilterRuleInput],
            _result_filter_keyword: Option<&str>,
            _case_sensitive: bool,
            _start_line: usize,
            _max_results: usize,
        ) -> Result<FilterChunk, BackendError> {
            self.filter_chunk_calls.fetch_add(1, Ordering::SeqCst);
            let next = self.filter_chunks.lock().pop_front();
            next.ok_or_else(|| BackendError::from("filter unsupported"))
        }

        async fn document_text(&self, _tab_id: &str) -> Result<DocumentText, BackendError> {
            let text = self
                .text
                .lock()
                .clone()
                .ok_or_else(|| BackendError::from("text unsupported"))?;
            let snapshot = DocumentText {
                line_count: text.lines().count().max(1),
                text,
                document_version: self.version.load(Ordering::SeqCst),
            };
            if self.edit_after_text_fetch.load(Ordering::SeqCst) {
                self.version.fetch_add(1, Ordering::SeqCst);
            }
            Ok(snapshot)
        }

        async fn edit_text(
            &self,
            _tab_id: &str,
            start_char: usize,
            end_char: usize,
            new_text: &str,
        ) -> Result<usize, BackendError> {
            self.edits
                .lock()
                .push((start_char, end_char, new_text.to_string()));
            self.version.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        }

        async fn replace_range(
            &self,
            _tab_id: &str,
            _start_line: usize,
            _end_line: usize,
            new_text: &str,
        ) -> Result<usize, BackendError> {
            self.range_writes.lock().push(new_text.to_string());
            self.version.fetch_add(1, Ordering::SeqCst);
            Ok(new_text.lines().count().max(1))
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        groups: Mutex<Vec<FilterRuleGroup>>,
    }

    #[async_trait]
    impl RuleGroupStore for MemoryStore {
        async fn load_rule_groups(&self) -> Result<Vec<FilterRuleGroup>, BackendError> {
            Ok(self.groups.lock().clone())
        }

        async fn save_rule_groups(&self, groups: &[FilterRuleGroup]) -> Result<(), BackendError> {
            *self.groups.lock() = groups.to_vec();
            Ok(())
        }

        async fn import_rule_groups(&self, _path: &Path) -> Result<Vec<FilterRuleGroup>, BackendError> {
            Err(BackendError::from("Import file is empty"))
        }

        async fn export_rule_groups(
            &self,
            _path: &Path,
            _groups: &[FilterRuleGroup],
        ) -> Result<(), BackendError> {
            Ok(())
        }
    }

    fn panel_with(backend: Arc<ScriptedBackend>) -> SearchPanel {
        panel_with_settings(backend, SearchSettings::default())
    }

    fn panel_with_settings(backend: Arc<ScriptedBackend>, settings: SearchSettings) -> SearchPanel {
        let panel = SearchPanel::new(backend, Arc::new(MemoryStore::default()), settings);
        panel.activate_tab("tab");
        panel
    }

    fn starts(panel: &SearchPanel) -> Vec<usize> {
        panel.search_results().iter().map(|m| m.start).collect()
    }

    #[tokio::test]
    async fn empty_keyword_should_skip_backend_and_clear_results() {
        let backend = Arc::new(ScriptedBackend::default());
        let panel = panel_with(backend.clone());

        assert_eq!(panel.search().await, RunOutcome::Skipped);
        assert!(panel.search_results().is_empty());
        assert!(panel.search_count().is_none());
        assert_eq!(backend.chunk_calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend.count_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_regex_should_fail_before_any_backend_call() {
        let backend = Arc::new(ScriptedBackend::default());
        let panel = panel_with(backend.clone());
        panel.set_search_mode(SearchMode::Regex);
        panel.set_keyword("(");

        assert_eq!(panel.search().await, RunOutcome::Skipped);
        assert!(matches!(panel.error(), Some(PanelError::InvalidPattern(_))));
        assert_eq!(backend.chunk_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_of_superseded_run_should_be_dropped() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.push_chunk(100, vec![found(1, 1)], None);
        backend.push_chunk(10, vec![found(5, 2)], None);
        let panel = panel_with(backend.clone());
        panel.set_keyword("x");

        let (first, second) = tokio::join!(panel.refresh_search(true), panel.refresh_search(true));

        assert_eq!(first, RunOutcome::Stale);
        assert_eq!(second, RunOutcome::Applied);
        let starts: Vec<usize> = panel.search_results().iter().map(|m| m.start).collect();
        assert_eq!(starts, vec![5]);
    }

    #[tokio::test]
    async fn cache_hit_should_be_refetched_after_document_version_moves() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.push_chunk(0, vec![found(1, 1)], None);
        let panel = panel_with(backend.clone());
        panel.set_keyword("x");

        assert_eq!(panel.refresh_search(false).await, RunOutcome::Applied);
        assert_eq!(panel.refresh_search(false).await, RunOutcome::CacheHit);
        assert_eq!(backend.chunk_calls.load(Ordering::SeqCst), 1);

        backend.version.fetch_add(1, Ordering::SeqCst);
        backend.push_chunk(0, vec![found(9, 4)], None);
        assert_eq!(panel.refresh_search(false).await, RunOutcome::Applied);
        assert_eq!(backend.chunk_calls.load(Ordering::SeqCst), 2);
        assert_eq!(panel.search_results()[0].start, 9);
    }

    #[tokio::test]
    async fn step_should_fetch_more_then_wrap_when_exhausted() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.push_chunk(0, vec![found(0, 1), found(2, 1)], Some(3));
        backend.push_chunk(0, vec![found(4, 2)], None);
        let panel = panel_with(backend.clone());
        panel.set_keyword("x");

        assert_eq!(panel.refresh_search(false).await, RunOutcome::Applied);
        assert_eq!(panel.step(StepDirection::Forward).await.map(|m| m.start), Some(0));
        assert_eq!(panel.step(StepDirection::Forward).await.map(|m| m.start), Some(2));
        assert_eq!(panel.step(StepDirection::Forward).await.map(|m| m.start), Some(4));
        assert_eq!(panel.current_search_index(), Some(2));
        assert_eq!(panel.step(StepDirection::Forward).await.map(|m| m.start), Some(0));
        assert_eq!(panel.step(StepDirection::Backward).await.map(|m| m.start), Some(4));
    }

    #[tokio::test]
    async fn first_step_should_use_first_match_fast_path() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.push_chunk(0, vec![found(0, 1), found(10, 2), found(20, 3)], None);
        let panel = panel_with(backend.clone());
        let mut events = panel.subscribe();
        panel.set_keyword("x");

        let selected = panel.step(StepDirection::Backward).await;
        assert_eq!(selected.map(|m| m.start), Some(20));
        assert_eq!(panel.current_search_index(), Some(2));

        let event = events.recv().await.expect("navigate event");
        assert!(matches!(event, PanelEvent::NavigateToMatch { line: 3, .. }));
    }

    #[tokio::test]
    async fn failed_chunk_should_surface_search_error_and_clear_window() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.push_failure("Document not found");
        let panel = panel_with(backend.clone());
        panel.set_keyword("x");

        assert_eq!(panel.refresh_search(true).await, RunOutcome::Failed);
        assert_eq!(
            panel.error(),
            Some(PanelError::SearchFailed("Document not found".to_string()))
        );
        assert_eq!(panel.status_line(), "Search failed: Document not found");
        assert!(panel.search_results().is_empty());
    }

    #[tokio::test]
    async fn replace_current_without_matches_should_not_call_backend() {
        let backend = Arc::new(ScriptedBackend::default());
        let panel = panel_with(backend.clone());
        panel.set_keyword("x");

        assert_eq!(panel.replace_current().await, Ok(0));
        assert_eq!(panel.notice(), Some(PanelNotice::NoMatchesToReplace));
        assert!(backend.edits.lock().is_empty());
    }

    #[tokio::test]
    async fn replace_current_should_edit_selected_match_by_char_range() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.push_chunk(0, vec![found(3, 1)], None);
        let panel = panel_with(backend.clone());
        let mut events = panel.subscribe();
        panel.set_keyword("x");
        panel.set_replace_value("yy");

        assert_eq!(panel.replace_current().await, Ok(1));
        assert_eq!(backend.edits.lock().clone(), vec![(3, 4, "yy".to_string())]);
        assert_eq!(panel.status_line(), "Replaced 1 match");

        let event = events.recv().await.expect("edited event");
        assert!(matches!(event, PanelEvent::DocumentEdited { line_count: 1, .. }));
    }

    #[tokio::test]
    async fn tab_switch_should_restore_snapshot_or_defaults() {
        let backend = Arc::new(ScriptedBackend::default());
        let panel = panel_with(backend);
        panel.open_panel(PanelMode::Replace);
        panel.set_keyword("needle");

        panel.activate_tab("other");
        assert_eq!(panel.view(), TabSnapshot::default());

        panel.activate_tab("tab");
        let view = panel.view();
        assert_eq!(view.keyword, "needle");
        assert_eq!(view.mode, PanelMode::Replace);

        panel.close_tab("tab");
        assert!(panel.snapshot("tab").is_none());
        assert!(panel.active_tab().is_none());
    }

    #[tokio::test]
    async fn rule_edits_should_reset_filter_state() {
        let backend = Arc::new(ScriptedBackend::default());
        let panel = panel_with(backend);
        panel.add_rule(FilterRule::new("warn", FilterMatchMode::Contains, FilterApplyTo::Line));

        assert_eq!(panel.filter().await, RunOutcome::Failed);
        assert_eq!(panel.error_scope(), Some(ErrorScope::Filter));

        panel.add_rule(FilterRule::new("err", FilterMatchMode::Contains, FilterApplyTo::Line));
        assert!(panel.error().is_none());
        assert!(panel.current_filter_index().is_none());
    }

    #[tokio::test]
    async fn save_rule_group_should_reject_rules_without_keywords() {
        let backend = Arc::new(ScriptedBackend::default());
        let panel = panel_with(backend);
        panel.add_rule(FilterRule::new(" ", FilterMatchMode::Contains, FilterApplyTo::Line));

        let err = panel.save_rule_group("logs").await.expect_err("empty group");
        assert!(matches!(err, PanelError::RuleGroupSaveFailed(_)));

        panel.add_rule(FilterRule::new("warn", FilterMatchMode::Contains, FilterApplyTo::Line));
        panel.save_rule_group(" logs ").await.expect("save group");
        assert_eq!(panel.rule_groups()[0].name, "logs");

        panel.clear_rules();
        panel.load_rule_group("logs").await.expect("load group");
        assert_eq!(panel.rules().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn scroll_request_during_fetch_should_be_ignored_not_restarted() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.push_chunk(0, vec![found(0, 1)], Some(5));
        backend.push_chunk(100, vec![found(5, 2)], Some(9));
        backend.push_chunk(0, vec![found(9, 3)], None);
        let panel = panel_with(backend.clone());
        panel.set_keyword("x");
        assert_eq!(panel.refresh_search(false).await, RunOutcome::Applied);

        panel.request_more_search_results();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(backend.chunk_calls.load(Ordering::SeqCst), 2);

        panel.request_more_search_results();
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(backend.chunk_calls.load(Ordering::SeqCst), 2);
        assert_eq!(starts(&panel), vec![0, 5]);
        assert!(panel.has_more_search_results());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_load_more_should_be_turned_away() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.push_chunk(0, vec![found(0, 1)], Some(5));
        backend.push_chunk(50, vec![found(5, 2)], None);
        let panel = panel_with(backend.clone());
        panel.set_keyword("x");
        panel.refresh_search(false).await;

        let (first, second) = tokio::join!(panel.load_more_search(), panel.load_more_search());

        assert_eq!(first, RunOutcome::Applied);
        assert_eq!(second, RunOutcome::Busy);
        assert_eq!(backend.chunk_calls.load(Ordering::SeqCst), 2);
        assert_eq!(starts(&panel), vec![0, 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_scroll_requests_should_load_one_search_chunk() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.push_chunk(0, vec![found(0, 1)], Some(5));
        backend.push_chunk(0, vec![found(5, 2)], Some(9));
        let panel = panel_with(backend.clone());
        panel.set_keyword("x");
        panel.refresh_search(false).await;

        for _ in 0..3 {
            panel.request_more_search_results();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(backend.chunk_calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(backend.chunk_calls.load(Ordering::SeqCst), 2);
        assert_eq!(starts(&panel), vec![0, 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_scroll_requests_should_load_one_filter_chunk() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.push_filter_chunk(vec![matched_line(1)], Some(1));
        backend.push_filter_chunk(vec![matched_line(2)], Some(2));
        let panel = panel_with(backend.clone());
        panel.add_rule(FilterRule::new("x", FilterMatchMode::Contains, FilterApplyTo::Line));
        assert_eq!(panel.refresh_filter(false).await, RunOutcome::Applied);

        for _ in 0..3 {
            panel.request_more_filter_results();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(backend.filter_chunk_calls.load(Ordering::SeqCst), 2);
        let lines: Vec<usize> = panel.filter_results().iter().map(|m| m.line).collect();
        assert_eq!(lines, vec![1, 2]);
    }

    #[tokio::test]
    async fn viewport_fill_should_stop_after_configured_rounds() {
        let backend = Arc::new(ScriptedBackend::default());
        for start in 0..5 {
            backend.push_chunk(0, vec![found(start, start + 1)], Some(start + 1));
        }
        let panel = panel_with_settings(
            backend.clone(),
            SearchSettings {
                viewport_fill_max_rounds: 2,
                ..SearchSettings::default()
            },
        );
        panel.set_keyword("x");
        panel.set_visible_rows(10);
        panel.refresh_search(false).await;

        assert_eq!(panel.fill_search_viewport().await, 2);
        assert_eq!(backend.chunk_calls.load(Ordering::SeqCst), 3);
        assert_eq!(starts(&panel), vec![0, 1, 2]);
        assert!(panel.has_more_search_results());
    }

    #[tokio::test]
    async fn load_more_after_document_change_should_reload_from_start() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.push_chunk(0, vec![found(0, 1)], Some(1));
        let panel = panel_with(backend.clone());
        panel.set_keyword("x");
        panel.refresh_search(false).await;

        backend.version.fetch_add(1, Ordering::SeqCst);
        backend.push_chunk(0, vec![found(1, 1)], None);
        backend.push_chunk(0, vec![found(7, 1), found(8, 2)], None);

        assert_eq!(panel.load_more_search().await, RunOutcome::Reloaded);
        assert_eq!(starts(&panel), vec![7, 8]);
        assert_eq!(backend.chunk_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn backward_fast_path_should_load_window_up_to_shown_match() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.push_chunk(0, vec![found(0, 1)], Some(5));
        backend.push_chunk(0, vec![found(10, 2)], Some(15));
        backend.push_chunk(0, vec![found(20, 3)], None);
        let panel = panel_with(backend.clone());
        panel.set_keyword("x");

        let shown = panel.step(StepDirection::Backward).await;
        assert_eq!(shown.map(|m| m.start), Some(20));
        assert_eq!(panel.current_search_index(), Some(2));

        let previous = panel.step(StepDirection::Backward).await;
        assert_eq!(previous.map(|m| m.start), Some(10));
    }

    #[tokio::test]
    async fn regex_replace_all_should_refuse_when_document_changed_meanwhile() {
        let backend = Arc::new(ScriptedBackend::default());
        *backend.text.lock() = Some("a1 b2".to_string());
        backend.edit_after_text_fetch.store(true, Ordering::SeqCst);
        let panel = panel_with(backend.clone());
        panel.set_search_mode(SearchMode::Regex);
        panel.set_keyword(r"\d");
        panel.set_replace_value("#");

        assert_eq!(
            panel.replace_all().await,
            Err(PanelError::ReplaceAllFailed(
                "Document changed while replacing".to_string()
            ))
        );
        assert!(backend.range_writes.lock().is_empty());
        assert_eq!(panel.error_scope(), Some(ErrorScope::Replace));
    }

    #[tokio::test]
    async fn regex_replace_all_should_write_substituted_text_once() {
        let backend = Arc::new(ScriptedBackend::default());
        *backend.text.lock() = Some("a1 b2".to_string());
        let panel = panel_with(backend.clone());
        panel.set_search_mode(SearchMode::Regex);
        panel.set_keyword(r"\d");
        panel.set_replace_value("#");

        assert_eq!(panel.replace_all().await, Ok(2));
        assert_eq!(backend.range_writes.lock().clone(), vec!["a# b#".to_string()]);
    }

    #[tokio::test]
    async fn replace_current_with_invalid_regex_should_return_the_error() {
        let backend = Arc::new(ScriptedBackend::default());
        let panel = panel_with(backend.clone());
        panel.set_search_mode(SearchMode::Regex);
        panel.set_keyword("(");
        panel.set_replace_value("y");

        let err = panel.replace_current().await.expect_err("invalid pattern");
        assert!(matches!(err, PanelError::InvalidPattern(_)));
        assert!(panel.notice().is_none());
        assert!(backend.edits.lock().is_empty());
    }

    #[tokio::test]
    async fn replace_current_should_expand_regex_against_its_line() {
        let backend = Arc::new(ScriptedBackend::default());
        let inside_word = SearchMatch {
            start: 1,
            end: 2,
            start_char: 1,
            end_char: 2,
            text: "x".to_string(),
            line: 1,
            column: 2,
            line_text: "ax".to_string(),
        };
        backend.push_chunk(0, vec![inside_word], None);
        let panel = panel_with(backend.clone());
        panel.set_search_mode(SearchMode::Regex);
        panel.set_case_sensitive(true);
        panel.set_keyword(r"\Bx");
        panel.set_replace_value("[$0]");

        assert_eq!(panel.replace_current().await, Ok(1));
        assert_eq!(backend.edits.lock().clone(), vec![(1, 2, "[x]".to_string())]);
    }

    #[tokio::test]
    async fn delete_rule_group_should_drop_only_the_named_group() {
        let backend = Arc::new(ScriptedBackend::default());
        let panel = panel_with(backend);
        panel.add_rule(FilterRule::new("warn", FilterMatchMode::Contains, FilterApplyTo::Line));
        panel.save_rule_group("logs").await.expect("save logs");
        panel.save_rule_group("audit").await.expect("save audit");

        panel.delete_rule_group("logs").await.expect("delete");
        panel.delete_rule_group("missing").await.expect("delete missing");

        let names: Vec<String> = panel
            .refresh_rule_groups()
            .await
            .expect("groups")
            .into_iter()
            .map(|group| group.name)
            .collect();
        assert_eq!(names, vec!["audit".to_string()]);
    }

    #[tokio::test]
    async fn close_panel_should_announce_closed_tab() {
        let backend = Arc::new(ScriptedBackend::default());
        let panel = panel_with(backend);
        panel.open_panel(PanelMode::Find);
        let mut events = panel.subscribe();

        panel.close_panel();

        assert!(!panel.view().is_open);
        let event = events.recv().await.expect("closed event");
        assert_eq!(
            event,
            PanelEvent::PanelClosed {
                tab_id: "tab".to_string()
            }
        );
    }
}

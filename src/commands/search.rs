use regex::{Regex, RegexBuilder};

use super::*;
use super::text_utils::{
    build_byte_to_char_map, build_line_starts, escape_regex_literal, find_line_index_by_offset,
    get_line_text, matches_result_filter, normalize_rope_line_text, wildcard_to_regex_source,
};

/// Case-sensitive literals go through plain substring search; every other
/// mode and case setting compiles to a regex.
pub(super) enum SearchMatcher {
    Literal(String),
    Pattern(Regex),
}

impl SearchMatcher {
    pub(super) fn compile(keyword: &str, mode: SearchMode, case_sensitive: bool) -> Result<Self, String> {
        let source = match mode {
            SearchMode::Literal if case_sensitive => {
                return Ok(SearchMatcher::Literal(keyword.to_string()));
            }
            SearchMode::Literal => escape_regex_literal(keyword),
            SearchMode::Wildcard => wildcard_to_regex_source(keyword),
            SearchMode::Regex => keyword.to_string(),
        };

        RegexBuilder::new(&source)
            .case_insensitive(!case_sensitive)
            .build()
            .map(SearchMatcher::Pattern)
            .map_err(|e| e.to_string())
    }

    /// Non-empty, non-overlapping match spans at or after byte `from`.
    pub(super) fn spans_from<'a>(
        &'a self,
        text: &'a str,
        from: usize,
    ) -> Box<dyn Iterator<Item = (usize, usize)> + 'a> {
        let from = normalize_search_offset(text, from);
        let slice = text.get(from..).unwrap_or_default();

        match self {
            SearchMatcher::Literal(needle) => {
                if needle.is_empty() {
                    return Box::new(std::iter::empty());
                }
                Box::new(
                    slice
                        .match_indices(needle.as_str())
                        .map(move |(start, matched)| (from + start, from + start + matched.len())),
                )
            }
            SearchMatcher::Pattern(regex) => Box::new(
                regex
                    .find_iter(slice)
                    .filter(|found| found.start() < found.end())
                    .map(move |found| (from + found.start(), from + found.end())),
            ),
        }
    }
}

fn normalize_search_offset(text: &str, start_offset: usize) -> usize {
    let mut offset = start_offset.min(text.len());

    while offset < text.len() && !text.is_char_boundary(offset) {
        offset += 1;
    }

    offset
}

/// Line and char lookup tables for one snapshot of a document's text.
struct TextIndex<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
    byte_to_char: Vec<usize>,
}

impl<'a> TextIndex<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            line_starts: build_line_starts(text),
            byte_to_char: build_byte_to_char_map(text),
        }
    }

    fn line_text_at(&self, offset: usize) -> String {
        let line_index = find_line_index_by_offset(&self.line_starts, offset);
        get_line_text(self.text, &self.line_starts, line_index)
    }

    fn build_match(&self, start: usize, end: usize) -> Option<SearchMatch> {
        if start >= end || end > self.text.len() {
            return None;
        }
        if !self.text.is_char_boundary(start) || !self.text.is_char_boundary(end) {
            return None;
        }

        let line_index = find_line_index_by_offset(&self.line_starts, start);
        let line_start = *self.line_starts.get(line_index).unwrap_or(&0usize);
        let start_char = *self.byte_to_char.get(start).unwrap_or(&0usize);
        let end_char = *self.byte_to_char.get(end).unwrap_or(&start_char);
        let line_start_char = *self.byte_to_char.get(line_start).unwrap_or(&0usize);

        Some(SearchMatch {
            start,
            end,
            start_char,
            end_char,
            text: self.text.get(start..end).unwrap_or_default().to_string(),
            line: line_index + 1,
            column: start_char.saturating_sub(line_start_char) + 1,
            line_text: get_line_text(self.text, &self.line_starts, line_index),
        })
    }
}

fn document_text(doc: &Document) -> String {
    doc.rope.chunks().collect()
}

pub(super) fn search_chunk_impl(
    state: &AppState,
    query: &SearchQuery,
    start_offset: usize,
    max_results: usize,
) -> Result<SearchChunk, String> {
    let Some(doc) = state.documents.get(&query.tab_id) else {
        return Err(DOCUMENT_NOT_FOUND.to_string());
    };

    if query.is_empty() {
        return Ok(SearchChunk {
            matches: Vec::new(),
            document_version: doc.document_version,
            next_offset: None,
        });
    }

    let matcher = SearchMatcher::compile(&query.keyword, query.mode, query.case_sensitive)?;
    let source_text = document_text(&doc);
    let index = TextIndex::new(&source_text);
    let result_filter = query.result_filter();
    let effective_max = max_results.max(1);

    let mut matches = Vec::new();
    let mut next_offset = None;

    for (start, end) in matcher.spans_from(&source_text, start_offset) {
        if matches.len() >= effective_max {
            next_offset = Some(start);
            break;
        }

        let Some(item) = index.build_match(start, end) else {
            continue;
        };
        if !matches_result_filter(&item.line_text, result_filter, query.case_sensitive) {
            continue;
        }

        matches.push(item);
    }

    Ok(SearchChunk {
        matches,
        document_version: doc.document_version,
        next_offset,
    })
}

pub(super) fn search_count_impl(state: &AppState, query: &SearchQuery) -> Result<SearchCount, String> {
    let Some(doc) = state.documents.get(&query.tab_id) else {
        return Err(DOCUMENT_NOT_FOUND.to_string());
    };

    if query.is_empty() {
        return Ok(SearchCount {
            total_matches: 0,
            matched_lines: 0,
            document_version: doc.document_version,
        });
    }

    let matcher = SearchMatcher::compile(&query.keyword, query.mode, query.case_sensitive)?;
    let source_text = document_text(&doc);
    let line_starts = build_line_starts(&source_text);
    let result_filter = query.result_filter();

    let mut total_matches = 0usize;
    let mut matched_lines = 0usize;
    let mut last_line_index: Option<usize> = None;

    for (start, _) in matcher.spans_from(&source_text, 0) {
        let line_index = find_line_index_by_offset(&line_starts, start);
        if result_filter.is_some() {
            let line_text = get_line_text(&source_text, &line_starts, line_index);
            if !matches_result_filter(&line_text, result_filter, query.case_sensitive) {
                continue;
            }
        }

        total_matches = total_matches.saturating_add(1);
        if last_line_index != Some(line_index) {
            matched_lines = matched_lines.saturating_add(1);
            last_line_index = Some(line_index);
        }
    }

    Ok(SearchCount {
        total_matches,
        matched_lines,
        document_version: doc.document_version,
    })
}

/// The first match in the document, or the last one when `reverse`.
pub(super) fn search_first_impl(
    state: &AppState,
    query: &SearchQuery,
    reverse: bool,
) -> Result<SearchFirst, String> {
    let Some(doc) = state.documents.get(&query.tab_id) else {
        return Err(DOCUMENT_NOT_FOUND.to_string());
    };

    if query.is_empty() {
        return Ok(SearchFirst {
            first_match: None,
            document_version: doc.document_version,
        });
    }

    let matcher = SearchMatcher::compile(&query.keyword, query.mode, query.case_sensitive)?;
    let source_text = document_text(&doc);
    let index = TextIndex::new(&source_text);
    let result_filter = query.result_filter();

    let mut candidates = matcher.spans_from(&source_text, 0).filter(|(start, _)| {
        result_filter.is_none()
            || matches_result_filter(&index.line_text_at(*start), result_filter, query.case_sensitive)
    });
    let edge = if reverse {
        candidates.last()
    } else {
        candidates.next()
    };

    Ok(SearchFirst {
        first_match: edge.and_then(|(start, end)| index.build_match(start, end)),
        document_version: doc.document_version,
    })
}

pub(super) struct CompiledFilterRule {
    rule_index: usize,
    keyword: String,
    match_mode: FilterMatchMode,
    regex: Option<Regex>,
    style: FilterRuleStyle,
    apply_to: FilterApplyTo,
}

/// Blank-keyword rules are skipped but keep their slot, so `rule_index`
/// always points into the list the caller sent.
pub(super) fn compile_filter_rules(rules: &[FilterRuleInput]) -> Result<Vec<CompiledFilterRule>, String> {
    let mut compiled = Vec::new();

    for (rule_index, rule) in rules.iter().enumerate() {
        if rule.keyword.is_empty() {
            continue;
        }

        let match_mode = FilterMatchMode::parse(&rule.match_mode)?;
        let apply_to = FilterApplyTo::parse(&rule.apply_to)?;

        let regex = match match_mode {
            FilterMatchMode::Contains => None,
            FilterMatchMode::Regex => Some(
                RegexBuilder::new(&rule.keyword)
                    .build()
                    .map_err(|e| e.to_string())?,
            ),
            FilterMatchMode::Wildcard => Some(
                RegexBuilder::new(&wildcard_to_regex_source(&rule.keyword))
                    .build()
                    .map_err(|e| e.to_string())?,
            ),
        };

        let background_color = rule.background_color.trim();
        compiled.push(CompiledFilterRule {
            rule_index,
            keyword: rule.keyword.clone(),
            match_mode,
            regex,
            style: FilterRuleStyle {
                background_color: if background_color.is_empty() {
                    None
                } else {
                    Some(background_color.to_string())
                },
                text_color: if rule.text_color.trim().is_empty() {
                    DEFAULT_FILTER_RULE_TEXT.to_string()
                } else {
                    rule.text_color.clone()
                },
                bold: rule.bold,
                italic: rule.italic,
            },
            apply_to,
        });
    }

    Ok(compiled)
}

fn line_matches_filter_rule(line_text: &str, rule: &CompiledFilterRule) -> bool {
    match rule.match_mode {
        FilterMatchMode::Contains => line_text.contains(&rule.keyword),
        FilterMatchMode::Regex | FilterMatchMode::Wildcard => rule
            .regex
            .as_ref()
            .map(|regex| regex.is_match(line_text))
            .unwrap_or(false),
    }
}

fn collect_filter_rule_ranges(
    line_text: &str,
    rule: &CompiledFilterRule,
    max_ranges: usize,
) -> Vec<(usize, usize)> {
    if max_ranges == 0 {
        return Vec::new();
    }

    match rule.match_mode {
        FilterMatchMode::Contains => line_text
            .match_indices(&rule.keyword)
            .take(max_ranges)
            .map(|(start, matched)| (start, start + matched.len()))
            .collect(),
        FilterMatchMode::Regex | FilterMatchMode::Wildcard => rule
            .regex
            .as_ref()
            .map(|regex| {
                regex
                    .find_iter(line_text)
                    .take(max_ranges)
                    .map(|found| (found.start(), found.end()))
                    .collect()
            })
            .unwrap_or_default(),
    }
}

fn build_filter_match(
    line_number: usize,
    line_text: &str,
    rule: &CompiledFilterRule,
    ranges_in_bytes: Vec<(usize, usize)>,
) -> FilterMatch {
    let byte_to_char = build_byte_to_char_map(line_text);
    let to_char = |offset: usize| *byte_to_char.get(offset).unwrap_or(&0usize);

    let (column, length) = match ranges_in_bytes.first().copied() {
        Some((start, end)) => {
            let start_char = to_char(start);
            let end_char = to_char(end).max(start_char);
            (start_char + 1, end_char - start_char)
        }
        None => (1, 0),
    };

    let highlight = match rule.apply_to {
        FilterApplyTo::Line => FilterHighlight::Line,
        FilterApplyTo::Match => FilterHighlight::Match {
            ranges: ranges_in_bytes
                .into_iter()
                .map(|(start, end)| CharRange {
                    start_char: to_char(start),
                    end_char: to_char(end),
                })
                .collect(),
        },
    };

    FilterMatch {
        line: line_number,
        column,
        length,
        line_text: line_text.to_string(),
        rule_index: rule.rule_index,
        style: rule.style.clone(),
        highlight,
    }
}

/// The first rule in list order that matches claims the line.
fn match_line_with_filter_rules(
    line_number: usize,
    line_text: &str,
    rules: &[CompiledFilterRule],
) -> Option<FilterMatch> {
    let rule = rules
        .iter()
        .find(|rule| line_matches_filter_rule(line_text, rule))?;

    let max_ranges = match rule.apply_to {
        FilterApplyTo::Line => 1,
        FilterApplyTo::Match => FILTER_MAX_RANGES_PER_LINE,
    };
    let ranges = collect_filter_rule_ranges(line_text, rule, max_ranges);

    Some(build_filter_match(line_number, line_text, rule, ranges))
}

fn rope_line_text(doc: &Document, line_index: usize) -> String {
    normalize_rope_line_text(&doc.rope.line(line_index).to_string())
}

pub(super) fn filter_count_impl(
    state: &AppState,
    tab_id: &str,
    rules: &[FilterRuleInput],
    result_filter_keyword: Option<&str>,
    case_sensitive: bool,
) -> Result<FilterCount, String> {
    let Some(doc) = state.documents.get(tab_id) else {
        return Err(DOCUMENT_NOT_FOUND.to_string());
    };

    let compiled_rules = compile_filter_rules(rules)?;
    if compiled_rules.is_empty() {
        return Ok(FilterCount {
            matched_lines: 0,
            document_version: doc.document_version,
        });
    }

    let result_filter_keyword = result_filter_keyword.and_then(normalize_result_filter_keyword);
    let matched_lines = (0..doc.rope.len_lines())
        .map(|line_index| rope_line_text(&doc, line_index))
        .filter(|line_text| matches_result_filter(line_text, result_filter_keyword, case_sensitive))
        .filter(|line_text| {
            compiled_rules
                .iter()
                .any(|rule| line_matches_filter_rule(line_text, rule))
        })
        .count();

    Ok(FilterCount {
        matched_lines,
        document_version: doc.document_version,
    })
}

pub(super) fn filter_chunk_impl(
    state: &AppState,
    tab_id: &str,
    rules: &[FilterRuleInput],
    result_filter_keyword: Option<&str>,
    case_sensitive: bool,
    start_line: usize,
    max_results: usize,
) -> Result<FilterChunk, String> {
    let Some(doc) = state.documents.get(tab_id) else {
        return Err(DOCUMENT_NOT_FOUND.to_string());
    };

    let compiled_rules = compile_filter_rules(rules)?;
    if compiled_rules.is_empty() {
        return Ok(FilterChunk {
            matches: Vec::new(),
            document_version: doc.document_version,
            next_line: None,
        });
    }

    let effective_max = max_results.max(1);
    let total_lines = doc.rope.len_lines();
    let result_filter_keyword = result_filter_keyword.and_then(normalize_result_filter_keyword);
    let mut matches: Vec<FilterMatch> = Vec::new();
    let mut next_line = None;

    for line_index in start_line.min(total_lines)..total_lines {
        let line_text = rope_line_text(&doc, line_index);
        if !matches_result_filter(&line_text, result_filter_keyword, case_sensitive) {
            continue;
        }

        if let Some(filter_match) =
            match_line_with_filter_rules(line_index + 1, &line_text, &compiled_rules)
        {
            if matches.len() >= effective_max {
                next_line = Some(line_index);
                break;
            }
            matches.push(filter_match);
        }
    }

    Ok(FilterChunk {
        matches,
        document_version: doc.document_version,
        next_line,
    })
}

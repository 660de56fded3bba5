//! Immutable query and rule values.
//!
//! A fresh [`SearchQuery`] / [`FilterQuery`] is built from the panel view on
//! every intent; nothing here is mutated in place once handed to a backend
//! call. Fingerprints are the cache keys.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::commands::text_utils::{escape_regex_literal, wildcard_to_regex_source};
use crate::commands::DEFAULT_FILTER_RULE_TEXT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Literal,
    Regex,
    Wildcard,
}

impl SearchMode {
    pub fn label(self) -> &'static str {
        match self {
            SearchMode::Literal => "literal",
            SearchMode::Regex => "regex",
            SearchMode::Wildcard => "wildcard",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_lowercase().as_str() {
            "literal" => Ok(SearchMode::Literal),
            "regex" => Ok(SearchMode::Regex),
            "wildcard" => Ok(SearchMode::Wildcard),
            _ => Err("Unsupported search mode".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub tab_id: String,
    pub keyword: String,
    pub mode: SearchMode,
    pub case_sensitive: bool,
    #[serde(default)]
    pub result_filter_keyword: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchFingerprint {
    tab_id: String,
    keyword: String,
    mode: SearchMode,
    case_sensitive: bool,
    result_filter_keyword: String,
}

impl SearchQuery {
    pub fn new(tab_id: impl Into<String>, keyword: impl Into<String>) -> Self {
        Self {
            tab_id: tab_id.into(),
            keyword: keyword.into(),
            mode: SearchMode::Literal,
            case_sensitive: false,
            result_filter_keyword: String::new(),
        }
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_result_filter(mut self, keyword: impl Into<String>) -> Self {
        self.result_filter_keyword = keyword.into();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keyword.is_empty()
    }

    /// Trimmed result-filter keyword, `None` when blank.
    pub fn result_filter(&self) -> Option<&str> {
        normalize_result_filter_keyword(&self.result_filter_keyword)
    }

    pub fn fingerprint(&self) -> SearchFingerprint {
        SearchFingerprint {
            tab_id: self.tab_id.clone(),
            keyword: self.keyword.clone(),
            mode: self.mode,
            case_sensitive: self.case_sensitive,
            result_filter_keyword: fold_result_filter(
                &self.result_filter_keyword,
                self.case_sensitive,
            ),
        }
    }

    pub fn regex_source(&self) -> String {
        match self.mode {
            SearchMode::Literal => escape_regex_literal(&self.keyword),
            SearchMode::Wildcard => wildcard_to_regex_source(&self.keyword),
            SearchMode::Regex => self.keyword.clone(),
        }
    }

    pub fn build_regex(&self) -> Result<Regex, regex::Error> {
        RegexBuilder::new(&self.regex_source())
            .case_insensitive(!self.case_sensitive)
            .build()
    }
}

impl PartialEq for SearchQuery {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint() == other.fingerprint()
    }
}

impl Eq for SearchQuery {}

pub(crate) fn normalize_result_filter_keyword(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn fold_result_filter(value: &str, case_sensitive: bool) -> String {
    let trimmed = value.trim();
    if case_sensitive {
        trimmed.to_string()
    } else {
        trimmed.to_lowercase()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMatchMode {
    #[default]
    Contains,
    Regex,
    Wildcard,
}

impl FilterMatchMode {
    pub fn label(self) -> &'static str {
        match self {
            FilterMatchMode::Contains => "contains",
            FilterMatchMode::Regex => "regex",
            FilterMatchMode::Wildcard => "wildcard",
        }
    }

    pub fn parse(mode: &str) -> Result<Self, String> {
        match mode.trim().to_lowercase().as_str() {
            "contains" | "exist" | "exists" => Ok(FilterMatchMode::Contains),
            "regex" => Ok(FilterMatchMode::Regex),
            "wildcard" => Ok(FilterMatchMode::Wildcard),
            _ => Err("Unsupported filter match mode".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterApplyTo {
    #[default]
    Line,
    Match,
}

impl FilterApplyTo {
    pub fn label(self) -> &'static str {
        match self {
            FilterApplyTo::Line => "line",
            FilterApplyTo::Match => "match",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_lowercase().as_str() {
            "line" => Ok(FilterApplyTo::Line),
            "match" => Ok(FilterApplyTo::Match),
            _ => Err("Unsupported filter apply target".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRuleStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    pub text_color: String,
    pub bold: bool,
    pub italic: bool,
}

impl Default for FilterRuleStyle {
    fn default() -> Self {
        Self {
            background_color: None,
            text_color: DEFAULT_FILTER_RULE_TEXT.to_string(),
            bold: false,
            italic: false,
        }
    }
}

/// A rule as edited in the panel. Ids are session-local and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterRule {
    pub id: Uuid,
    pub keyword: String,
    pub match_mode: FilterMatchMode,
    pub style: FilterRuleStyle,
    pub apply_to: FilterApplyTo,
}

impl FilterRule {
    pub fn new(
        keyword: impl Into<String>,
        match_mode: FilterMatchMode,
        apply_to: FilterApplyTo,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            keyword: keyword.into(),
            match_mode,
            style: FilterRuleStyle::default(),
            apply_to,
        }
    }

    pub fn with_style(mut self, style: FilterRuleStyle) -> Self {
        self.style = style;
        self
    }

    pub fn is_effective(&self) -> bool {
        !self.keyword.trim().is_empty()
    }

    pub fn regex_source(&self) -> Option<String> {
        match self.match_mode {
            FilterMatchMode::Contains => None,
            FilterMatchMode::Regex => Some(self.keyword.clone()),
            FilterMatchMode::Wildcard => Some(wildcard_to_regex_source(&self.keyword)),
        }
    }

    pub fn validate(&self) -> Result<(), regex::Error> {
        if let Some(source) = self.regex_source() {
            RegexBuilder::new(&source).build()?;
        }

        Ok(())
    }

    pub fn to_input(&self) -> FilterRuleInput {
        FilterRuleInput {
            keyword: self.keyword.clone(),
            match_mode: self.match_mode.label().to_string(),
            background_color: self.style.background_color.clone().unwrap_or_default(),
            text_color: self.style.text_color.clone(),
            bold: self.style.bold,
            italic: self.style.italic,
            apply_to: self.apply_to.label().to_string(),
        }
    }

    /// Builds an editable rule from its persisted form with a fresh id.
    pub fn from_input(input: &FilterRuleInput) -> Result<Self, String> {
        let background_color = input.background_color.trim();

        Ok(Self {
            id: Uuid::new_v4(),
            keyword: input.keyword.clone(),
            match_mode: FilterMatchMode::parse(&input.match_mode)?,
            style: FilterRuleStyle {
                background_color: if background_color.is_empty() {
                    None
                } else {
                    Some(background_color.to_string())
                },
                text_color: if input.text_color.trim().is_empty() {
                    DEFAULT_FILTER_RULE_TEXT.to_string()
                } else {
                    input.text_color.clone()
                },
                bold: input.bold,
                italic: input.italic,
            },
            apply_to: FilterApplyTo::parse(&input.apply_to)?,
        })
    }
}

fn default_match_mode() -> String {
    FilterMatchMode::Contains.label().to_string()
}

fn default_apply_to() -> String {
    FilterApplyTo::Line.label().to_string()
}

/// Wire and on-disk shape of a rule. Modes stay strings so that a file with
/// an unknown mode can still be read and the offending rule dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRuleInput {
    pub keyword: String,
    #[serde(default = "default_match_mode")]
    pub match_mode: String,
    #[serde(default)]
    pub background_color: String,
    #[serde(default)]
    pub text_color: String,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default = "default_apply_to")]
    pub apply_to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRuleGroup {
    pub name: String,
    #[serde(default)]
    pub rules: Vec<FilterRuleInput>,
}

#[derive(Debug, Clone)]
pub struct FilterQuery {
    pub tab_id: String,
    pub rules: Vec<FilterRuleInput>,
    pub result_filter_keyword: String,
    pub case_sensitive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterFingerprint {
    tab_id: String,
    rules: Vec<FilterRuleInput>,
    result_filter_keyword: String,
    case_sensitive: bool,
}

impl FilterQuery {
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn result_filter(&self) -> Option<&str> {
        normalize_result_filter_keyword(&self.result_filter_keyword)
    }

    pub fn fingerprint(&self) -> FilterFingerprint {
        FilterFingerprint {
            tab_id: self.tab_id.clone(),
            rules: self.rules.clone(),
            result_filter_keyword: fold_result_filter(
                &self.result_filter_keyword,
                self.case_sensitive,
            ),
            case_sensitive: self.case_sensitive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_queries_should_compare_result_filter_case_insensitively_unless_case_sensitive() {
        let left = SearchQuery::new("tab", "x").with_result_filter("Error");
        let right = SearchQuery::new("tab", "x").with_result_filter("error ");
        assert_eq!(left, right);

        let left = left.with_case_sensitive(true);
        let right = right.with_case_sensitive(true);
        assert_ne!(left, right);
    }

    #[test]
    fn search_queries_should_differ_by_tab_mode_and_keyword() {
        let base = SearchQuery::new("a", "x");
        assert_ne!(base, SearchQuery::new("b", "x"));
        assert_ne!(base, SearchQuery::new("a", "y"));
        assert_ne!(base, SearchQuery::new("a", "x").with_mode(SearchMode::Regex));
    }

    #[test]
    fn build_regex_should_escape_literal_and_expand_wildcard() {
        let literal = SearchQuery::new("t", "a.b").build_regex().expect("literal regex");
        assert!(literal.is_match("xa.by"));
        assert!(!literal.is_match("axb"));

        let wildcard = SearchQuery::new("t", "a?c*")
            .with_mode(SearchMode::Wildcard)
            .build_regex()
            .expect("wildcard regex");
        assert!(wildcard.is_match("ABCdef"));

        let invalid = SearchQuery::new("t", "(").with_mode(SearchMode::Regex);
        assert!(invalid.build_regex().is_err());
    }

    #[test]
    fn filter_match_mode_should_support_aliases_and_reject_unknown_modes() {
        assert_eq!(FilterMatchMode::parse("contains"), Ok(FilterMatchMode::Contains));
        assert_eq!(FilterMatchMode::parse("exists"), Ok(FilterMatchMode::Contains));
        assert_eq!(FilterMatchMode::parse(" Regex "), Ok(FilterMatchMode::Regex));
        assert_eq!(FilterMatchMode::parse("wildcard"), Ok(FilterMatchMode::Wildcard));
        assert!(FilterMatchMode::parse("unknown").is_err());
        assert!(FilterApplyTo::parse("invalid").is_err());
    }

    #[test]
    fn filter_rule_should_round_trip_through_input_with_fresh_id() {
        let rule = FilterRule::new("warn", FilterMatchMode::Wildcard, FilterApplyTo::Match)
            .with_style(FilterRuleStyle {
                background_color: Some("#fff3bf".to_string()),
                text_color: "#111111".to_string(),
                bold: true,
                italic: false,
            });

        let restored = FilterRule::from_input(&rule.to_input()).expect("valid input");
        assert_ne!(restored.id, rule.id);
        assert_eq!(restored.keyword, rule.keyword);
        assert_eq!(restored.match_mode, rule.match_mode);
        assert_eq!(restored.apply_to, rule.apply_to);
        assert_eq!(restored.style, rule.style);
    }

    #[test]
    fn filter_rule_input_should_default_missing_fields_when_deserialized() {
        let input: FilterRuleInput =
            serde_json::from_str(r#"{"keyword":"panic"}"#).expect("minimal rule");
        assert_eq!(input.match_mode, "contains");
        assert_eq!(input.apply_to, "line");
        assert!(!input.bold);
    }

    #[test]
    fn filter_rule_should_only_be_effective_with_non_blank_keyword() {
        assert!(!FilterRule::new("  ", FilterMatchMode::Contains, FilterApplyTo::Line).is_effective());
        assert!(FilterRule::new("x", FilterMatchMode::Contains, FilterApplyTo::Line).is_effective());
    }
}

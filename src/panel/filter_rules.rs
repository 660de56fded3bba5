use uuid::Uuid;

use super::query::{FilterApplyTo, FilterMatchMode, FilterRule, FilterRuleGroup, FilterRuleInput};
use crate::commands::DEFAULT_FILTER_RULE_TEXT;

/// The ordered rule list being edited in the panel. Position is priority:
/// the first rule that matches a line claims it.
#[derive(Debug, Clone, Default)]
pub struct FilterRuleList {
    rules: Vec<FilterRule>,
}

impl FilterRuleList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    fn position(&self, id: Uuid) -> Option<usize> {
        self.rules.iter().position(|rule| rule.id == id)
    }

    pub fn add(&mut self, rule: FilterRule) -> Uuid {
        let id = rule.id;
        self.rules.push(rule);
        id
    }

    /// Replaces the rule carrying `rule.id`. Returns false when no such rule exists.
    pub fn update(&mut self, rule: FilterRule) -> bool {
        match self.position(rule.id) {
            Some(index) => {
                self.rules[index] = rule;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: Uuid) -> Option<FilterRule> {
        let index = self.position(id)?;
        Some(self.rules.remove(index))
    }

    /// Drag-and-drop reorder: `dragged` is taken out of the list and put back
    /// at the slot `target` occupies once `dragged` is gone.
    pub fn move_rule(&mut self, dragged: Uuid, target: Uuid) -> bool {
        if dragged == target {
            return false;
        }

        let Some(from) = self.position(dragged) else {
            return false;
        };
        if self.position(target).is_none() {
            return false;
        }

        let rule = self.rules.remove(from);
        let to = self.position(target).unwrap_or(self.rules.len());
        self.rules.insert(to, rule);
        true
    }

    pub fn clear(&mut self) {
        self.rules.clear();
    }

    /// Rules with a non-blank keyword, in priority order, in the form sent to
    /// the backend. A `FilterMatch::rule_index` indexes into this list.
    pub fn effective_inputs(&self) -> Vec<FilterRuleInput> {
        self.effective_rules().map(FilterRule::to_input).collect()
    }

    pub fn effective_rules(&self) -> impl Iterator<Item = &FilterRule> {
        self.rules.iter().filter(|rule| rule.is_effective())
    }

    /// Compiles every effective regex/wildcard rule; the first failure wins.
    pub fn validate(&self) -> Result<(), regex::Error> {
        self.effective_rules().try_for_each(FilterRule::validate)
    }

    /// Loads a persisted group, minting fresh ids. Rules that no longer parse
    /// are skipped.
    pub fn load_group(&mut self, group: &FilterRuleGroup) {
        self.rules = group
            .rules
            .iter()
            .filter_map(|input| FilterRule::from_input(input).ok())
            .collect();
    }
}

pub(crate) fn normalize_rule_input(rule: FilterRuleInput) -> Option<FilterRuleInput> {
    let keyword = rule.keyword.trim().to_string();
    if keyword.is_empty() {
        return None;
    }

    let match_mode = FilterMatchMode::parse(&rule.match_mode).ok()?.label().to_string();
    let apply_to = FilterApplyTo::parse(&rule.apply_to).ok()?.label().to_string();
    let background_color = rule.background_color.trim().to_string();
    let text_color = if rule.text_color.trim().is_empty() {
        DEFAULT_FILTER_RULE_TEXT.to_string()
    } else {
        rule.text_color
    };

    Some(FilterRuleInput {
        keyword,
        match_mode,
        background_color,
        text_color,
        bold: rule.bold,
        italic: rule.italic,
        apply_to,
    })
}

pub(crate) fn normalize_rule_group(group: FilterRuleGroup) -> Option<FilterRuleGroup> {
    let name = group.name.trim().to_string();
    if name.is_empty() {
        return None;
    }

    let rules: Vec<FilterRuleInput> = group
        .rules
        .into_iter()
        .filter_map(normalize_rule_input)
        .collect();

    if rules.is_empty() {
        return None;
    }

    Some(FilterRuleGroup { name, rules })
}

/// Trims names, drops blank-keyword rules and unparseable modes, then drops
/// groups left nameless or empty. Later duplicates of a name replace earlier
/// ones in place.
pub fn normalize_rule_groups(groups: Vec<FilterRuleGroup>) -> Vec<FilterRuleGroup> {
    let mut normalized: Vec<FilterRuleGroup> = Vec::new();
    for group in groups.into_iter().filter_map(normalize_rule_group) {
        upsert_normalized(&mut normalized, group);
    }
    normalized
}

fn upsert_normalized(groups: &mut Vec<FilterRuleGroup>, group: FilterRuleGroup) {
    match groups.iter_mut().find(|existing| existing.name == group.name) {
        Some(existing) => existing.rules = group.rules,
        None => groups.push(group),
    }
}

/// Inserts or replaces the group with the same (trimmed) name. Returns false
/// when the group does not survive normalization.
pub fn upsert_group(groups: &mut Vec<FilterRuleGroup>, group: FilterRuleGroup) -> bool {
    match normalize_rule_group(group) {
        Some(group) => {
            upsert_normalized(groups, group);
            true
        }
        None => false,
    }
}

pub fn remove_group(groups: &mut Vec<FilterRuleGroup>, name: &str) -> bool {
    let name = name.trim();
    let before = groups.len();
    groups.retain(|group| group.name != name);
    groups.len() != before
}

/// Merges `incoming` into `existing` by name; incoming groups win.
pub fn merge_groups(
    existing: Vec<FilterRuleGroup>,
    incoming: Vec<FilterRuleGroup>,
) -> Vec<FilterRuleGroup> {
    let mut merged = normalize_rule_groups(existing);
    for group in normalize_rule_groups(incoming) {
        upsert_normalized(&mut merged, group);
    }
    merged
}

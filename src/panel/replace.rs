//! Replacement text computation. Nothing here talks to a backend; the panel
//! feeds it matches and sends the resulting edits.

use regex::Regex;
use ropey::Rope;

use super::backend::SearchMatch;
use crate::commands::text_utils::{build_line_starts, find_line_index_by_offset, get_line_text, matches_result_filter};

/// Replacement for one match. A regex query expands `$1`/`${name}` against
/// the match as it sits in its line, so anchors and word boundaries see the
/// surrounding text; other modes insert the template verbatim. `None` when the
/// pattern no longer matches there.
pub fn expand_single_replacement(regex: Option<&Regex>, item: &SearchMatch, template: &str) -> Option<String> {
    let Some(regex) = regex else {
        return Some(template.to_string());
    };

    let mut expanded = String::new();
    let local_start = item
        .line_text
        .char_indices()
        .nth(item.column.saturating_sub(1))
        .map(|(offset, _)| offset);
    let in_line = local_start.and_then(|offset| {
        regex
            .captures_at(&item.line_text, offset)
            .filter(|captures| {
                captures
                    .get(0)
                    .is_some_and(|whole| whole.start() == offset && whole.as_str() == item.text)
            })
    });
    let captures = in_line.or_else(|| {
        regex
            .captures(&item.text)
            .filter(|captures| captures.get(0).is_some_and(|whole| whole.as_str() == item.text))
    })?;

    captures.expand(template, &mut expanded);
    Some(expanded)
}

/// One global substitution over `text`. Matches on lines rejected by the
/// result filter are left untouched. Returns the new text and how many
/// matches were replaced.
pub fn replace_all_with_regex(
    regex: &Regex,
    text: &str,
    template: &str,
    result_filter_keyword: Option<&str>,
    case_sensitive: bool,
) -> (String, usize) {
    let line_starts = result_filter_keyword.map(|_| build_line_starts(text));
    let mut output = String::with_capacity(text.len());
    let mut last_end = 0usize;
    let mut replaced = 0usize;

    for captures in regex.captures_iter(text) {
        let Some(whole) = captures.get(0) else {
            continue;
        };

        if let Some(line_starts) = line_starts.as_deref() {
            let line_index = find_line_index_by_offset(line_starts, whole.start());
            let line_text = get_line_text(text, line_starts, line_index);
            if !matches_result_filter(&line_text, result_filter_keyword, case_sensitive) {
                continue;
            }
        }

        output.push_str(&text[last_end..whole.start()]);
        captures.expand(template, &mut output);
        last_end = whole.end();
        replaced += 1;
    }

    if replaced == 0 {
        return (text.to_string(), 0);
    }

    output.push_str(&text[last_end..]);
    (output, replaced)
}

/// A char-range edit expressed against the document as it will be when the
/// edit is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEdit {
    pub start_char: usize,
    pub end_char: usize,
    pub text: String,
}

/// Turns matches found in one document version into edits that can be sent
/// one after another. Each edit shifts every later match by
/// `replacement_len - matched_len` chars, so offsets carry the running delta.
/// Overlapping matches after the first are dropped.
pub fn plan_sequential_edits(matches: &[SearchMatch], replacement: &str) -> Vec<PlannedEdit> {
    let mut ordered: Vec<&SearchMatch> = matches.iter().collect();
    ordered.sort_by_key(|item| (item.start_char, item.end_char));

    let replacement_chars = replacement.chars().count() as isize;
    let mut char_delta: isize = 0;
    let mut previous_end = 0usize;
    let mut edits = Vec::with_capacity(ordered.len());

    for item in ordered {
        if item.start_char < previous_end {
            continue;
        }
        previous_end = item.end_char;

        let start_char = (item.start_char as isize + char_delta).max(0) as usize;
        let end_char = (item.end_char as isize + char_delta).max(start_char as isize) as usize;
        edits.push(PlannedEdit {
            start_char,
            end_char,
            text: replacement.to_string(),
        });

        char_delta += replacement_chars - item.char_len() as isize;
    }

    edits
}

/// Applies planned edits in order to a rope, clamping to its bounds.
pub fn apply_planned_edits(rope: &mut Rope, edits: &[PlannedEdit]) {
    for edit in edits {
        let len_chars = rope.len_chars();
        let start = edit.start_char.min(len_chars);
        let end = edit.end_char.min(len_chars).max(start);

        if start < end {
            rope.remove(start..end);
        }
        if !edit.text.is_empty() {
            rope.insert(start, &edit.text);
        }
    }
}

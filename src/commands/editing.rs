use super::*;

fn apply_edit(doc: &mut Document, start: usize, end: usize, new_text: &str) {
    if start < end {
        doc.rope.remove(start..end);
    }
    if !new_text.is_empty() {
        doc.rope.insert(start, new_text);
    }

    doc.document_version = doc.document_version.saturating_add(1);
}

pub(super) fn edit_text_impl(
    state: &AppState,
    id: &str,
    start_char: usize,
    end_char: usize,
    new_text: &str,
) -> Result<usize, String> {
    if let Some(mut doc) = state.documents.get_mut(id) {
        let len_chars = doc.rope.len_chars();
        let start = start_char.min(len_chars);
        let end = end_char.min(len_chars).max(start);

        let old_text = doc.rope.slice(start..end).to_string();
        if old_text == new_text {
            return Ok(doc.rope.len_lines());
        }

        apply_edit(&mut doc, start, end, new_text);

        Ok(doc.rope.len_lines())
    } else {
        Err(DOCUMENT_NOT_FOUND.to_string())
    }
}

pub(super) fn replace_line_range_impl(
    state: &AppState,
    id: &str,
    start_line: usize,
    end_line: usize,
    new_text: &str,
) -> Result<usize, String> {
    if let Some(mut doc) = state.documents.get_mut(id) {
        let len_lines = doc.rope.len_lines();
        let start = start_line.min(len_lines);
        let end = end_line.min(len_lines).max(start);

        if start >= end {
            return Ok(doc.rope.len_lines());
        }

        let start_char = doc.rope.line_to_char(start);
        let end_char = doc.rope.line_to_char(end);

        let old_text = doc.rope.slice(start_char..end_char).to_string();
        if old_text == new_text {
            return Ok(doc.rope.len_lines());
        }

        apply_edit(&mut doc, start_char, end_char, new_text);

        Ok(doc.rope.len_lines())
    } else {
        Err(DOCUMENT_NOT_FOUND.to_string())
    }
}

use super::*;

pub(super) fn get_document_version_impl(state: &AppState, id: &str) -> Result<u64, String> {
    if let Some(doc) = state.documents.get(id) {
        Ok(doc.document_version)
    } else {
        Err(DOCUMENT_NOT_FOUND.to_string())
    }
}

/// Full LF-normalized text together with the version it was read at.
pub(super) fn get_document_text_impl(state: &AppState, id: &str) -> Result<DocumentText, String> {
    if let Some(doc) = state.documents.get(id) {
        Ok(DocumentText {
            text: doc.rope.chunks().collect(),
            line_count: doc.rope.len_lines(),
            document_version: doc.document_version,
        })
    } else {
        Err(DOCUMENT_NOT_FOUND.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_text_should_carry_version_and_line_count() {
        let state = AppState::new();
        let mut doc = Document::from_text("a\nb\nc", None);
        doc.document_version = 7;
        state.documents.insert("doc".to_string(), doc);

        let snapshot = get_document_text_impl(&state, "doc").expect("text");
        assert_eq!(snapshot.text, "a\nb\nc");
        assert_eq!(snapshot.line_count, 3);
        assert_eq!(snapshot.document_version, 7);
        assert_eq!(get_document_version_impl(&state, "doc"), Ok(7));
    }

    #[test]
    fn missing_document_should_report_not_found() {
        let state = AppState::new();
        assert_eq!(
            get_document_version_impl(&state, "gone"),
            Err(DOCUMENT_NOT_FOUND.to_string())
        );
        assert!(get_document_text_impl(&state, "gone").is_err());
    }
}

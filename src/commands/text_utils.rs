pub(crate) fn normalize_to_lf(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}

pub(crate) fn escape_regex_literal(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len());

    for ch in keyword.chars() {
        if matches!(
            ch,
            '.' | '*' | '+' | '?' | '^' | '$' | '{' | '}' | '(' | ')' | '|' | '[' | ']' | '\\'
        ) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }

    escaped
}

/// `*` matches any run of characters and `?` exactly one; everything else
/// is taken literally.
pub(crate) fn wildcard_to_regex_source(keyword: &str) -> String {
    let mut source = String::with_capacity(keyword.len() * 2);

    for ch in keyword.chars() {
        match ch {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            _ => {
                let mut buffer = [0u8; 4];
                source.push_str(&escape_regex_literal(ch.encode_utf8(&mut buffer)));
            }
        }
    }

    source
}

pub(crate) fn build_line_starts(text: &str) -> Vec<usize> {
    let mut line_starts = vec![0usize];

    for (index, byte) in text.as_bytes().iter().enumerate() {
        if *byte == b'\n' {
            line_starts.push(index + 1);
        }
    }

    line_starts
}

pub(crate) fn build_byte_to_char_map(text: &str) -> Vec<usize> {
    let mut mapping = vec![0usize; text.len() + 1];
    let mut char_index = 0usize;

    for (byte_index, ch) in text.char_indices() {
        for offset in 0..ch.len_utf8() {
            mapping[byte_index + offset] = char_index;
        }
        char_index += 1;
    }

    mapping[text.len()] = char_index;
    mapping
}

pub(crate) fn find_line_index_by_offset(line_starts: &[usize], target_offset: usize) -> usize {
    match line_starts.binary_search(&target_offset) {
        Ok(index) => index,
        Err(insert_at) => insert_at.saturating_sub(1),
    }
}

pub(crate) fn get_line_text(text: &str, line_starts: &[usize], line_index: usize) -> String {
    let Some(line_start) = line_starts.get(line_index).copied() else {
        return String::new();
    };
    let line_end = line_starts
        .get(line_index + 1)
        .map(|next| next.saturating_sub(1))
        .unwrap_or(text.len())
        .max(line_start);

    text.get(line_start..line_end)
        .unwrap_or_default()
        .trim_end_matches('\r')
        .to_string()
}

pub(crate) fn normalize_rope_line_text(line_text: &str) -> String {
    line_text
        .trim_end_matches('\n')
        .trim_end_matches('\r')
        .to_string()
}

pub(crate) fn matches_result_filter(
    line_text: &str,
    result_filter_keyword: Option<&str>,
    case_sensitive: bool,
) -> bool {
    let Some(keyword) = result_filter_keyword else {
        return true;
    };

    if case_sensitive {
        return line_text.contains(keyword);
    }

    line_text.to_lowercase().contains(&keyword.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_to_lf_should_convert_all_line_endings_to_lf() {
        let original = "line1\r\nline2\rline3\nline4";
        assert_eq!(normalize_to_lf(original), "line1\nline2\nline3\nline4");
    }

    #[test]
    fn escape_regex_literal_should_escape_regex_metacharacters() {
        let escaped = escape_regex_literal(r".*+?^${}()|[]\");
        assert_eq!(escaped, r"\.\*\+\?\^\$\{\}\(\)\|\[\]\\");
    }

    #[test]
    fn wildcard_to_regex_source_should_translate_wildcards_and_escape_other_chars() {
        assert_eq!(wildcard_to_regex_source("a*b?.txt"), r"a.*b.\.txt");
        assert_eq!(wildcard_to_regex_source("(x)"), r"\(x\)");
    }

    #[test]
    fn find_line_index_by_offset_should_return_last_line_start_not_greater_than_offset() {
        let starts = vec![0usize, 3, 8];
        assert_eq!(find_line_index_by_offset(&starts, 0), 0);
        assert_eq!(find_line_index_by_offset(&starts, 2), 0);
        assert_eq!(find_line_index_by_offset(&starts, 3), 1);
        assert_eq!(find_line_index_by_offset(&starts, 7), 1);
        assert_eq!(find_line_index_by_offset(&starts, 99), 2);
    }

    #[test]
    fn build_line_starts_should_record_start_offset_for_each_line() {
        assert_eq!(build_line_starts(""), vec![0]);
        assert_eq!(build_line_starts("a\nb\n"), vec![0, 2, 4]);
        assert_eq!(build_line_starts("abc"), vec![0]);
    }

    #[test]
    fn build_byte_to_char_map_should_map_multibyte_utf8_bytes_to_char_indices() {
        let mapping = build_byte_to_char_map("a你b");
        assert_eq!(mapping, vec![0, 1, 1, 1, 2, 3]);
    }

    #[test]
    fn matches_result_filter_should_respect_case_flag() {
        assert!(matches_result_filter("Error: disk", Some("error"), false));
        assert!(!matches_result_filter("Error: disk", Some("error"), true));
        assert!(matches_result_filter("anything", None, true));
    }

    #[test]
    fn get_line_text_should_strip_line_break_and_trailing_carriage_return() {
        let text = "a\r\nb\n";
        let starts = build_line_starts(text);
        assert_eq!(get_line_text(text, &starts, 0), "a");
        assert_eq!(get_line_text(text, &starts, 1), "b");
        assert_eq!(get_line_text(text, &starts, 2), "");
        assert_eq!(get_line_text(text, &starts, 9), "");
    }
}

use super::*;
use std::io::Write;
use std::path::Path;

fn detect_line_ending(text: &str) -> LineEnding {
    let bytes = text.as_bytes();
    let mut crlf_count = 0usize;
    let mut lf_count = 0usize;
    let mut cr_count = 0usize;

    let mut index = 0usize;
    while index < bytes.len() {
        match bytes[index] {
            b'\r' => {
                if index + 1 < bytes.len() && bytes[index + 1] == b'\n' {
                    crlf_count += 1;
                    index += 2;
                } else {
                    cr_count += 1;
                    index += 1;
                }
            }
            b'\n' => {
                lf_count += 1;
                index += 1;
            }
            _ => {
                index += 1;
            }
        }
    }

    if crlf_count >= lf_count && crlf_count >= cr_count && crlf_count > 0 {
        LineEnding::CrLf
    } else if lf_count >= cr_count && lf_count > 0 {
        LineEnding::Lf
    } else if cr_count > 0 {
        LineEnding::Cr
    } else {
        default_line_ending()
    }
}

fn build_persist_content(doc: &Document) -> String {
    let utf8_content: String = doc.rope.chunks().collect();
    let normalized = text_utils::normalize_to_lf(&utf8_content);

    match doc.line_ending {
        LineEnding::CrLf => normalized.replace('\n', "\r\n"),
        LineEnding::Lf => normalized,
        LineEnding::Cr => normalized.replace('\n', "\r"),
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

pub(super) fn open_file_impl(state: &AppState, path: &Path) -> Result<FileInfo, String> {
    let file = File::open(path).map_err(|e| e.to_string())?;

    let metadata = file.metadata().map_err(|e| e.to_string())?;
    let size = metadata.len();
    let large_file_mode = size > LARGE_FILE_THRESHOLD_BYTES as u64;

    // Empty files cannot be mapped on every platform.
    let mmap = if size == 0 {
        None
    } else {
        Some(unsafe { Mmap::map(&file).map_err(|e| e.to_string())? })
    };
    let bytes: &[u8] = mmap.as_deref().unwrap_or_default();

    let encoding = if let Some((enc, _size)) = Encoding::for_bom(bytes) {
        enc
    } else {
        let mut detector = EncodingDetector::new();
        if bytes.len() > ENCODING_DETECT_SAMPLE_BYTES {
            detector.feed(&bytes[..ENCODING_DETECT_SAMPLE_BYTES], true);
        } else {
            detector.feed(bytes, true);
        }
        detector.guess(None, true)
    };

    let (cow, _, malformed) = encoding.decode(bytes);
    if malformed {
        tracing::warn!(path = %path.display(), encoding = encoding.name(), "file contains malformed sequences");
    }
    let line_ending = detect_line_ending(&cow);
    let normalized_content = text_utils::normalize_to_lf(&cow);
    let rope = Rope::from_str(&normalized_content);
    let line_count = rope.len_lines();

    let id = Uuid::new_v4().to_string();

    state.documents.insert(
        id.clone(),
        Document {
            rope,
            encoding,
            line_ending,
            path: Some(path.to_path_buf()),
            document_version: 0,
            saved_document_version: 0,
        },
    );

    tracing::debug!(tab_id = %id, path = %path.display(), line_count, "document opened");

    Ok(FileInfo {
        id,
        path: path.to_string_lossy().to_string(),
        name: file_name_of(path),
        encoding: encoding.name().to_string(),
        line_ending: line_ending.label().to_string(),
        line_count,
        large_file_mode,
    })
}

/// Registers an unsaved in-memory document.
pub(super) fn open_text_impl(state: &AppState, name: &str, text: &str) -> FileInfo {
    let line_ending = detect_line_ending(text);
    let mut doc = Document::from_text(&text_utils::normalize_to_lf(text), None);
    doc.line_ending = line_ending;
    let line_count = doc.rope.len_lines();

    let id = Uuid::new_v4().to_string();
    state.documents.insert(id.clone(), doc);

    FileInfo {
        id,
        path: String::new(),
        name: name.to_string(),
        encoding: encoding_rs::UTF_8.name().to_string(),
        line_ending: line_ending.label().to_string(),
        line_count,
        large_file_mode: text.len() > LARGE_FILE_THRESHOLD_BYTES,
    }
}

pub(super) fn close_file_impl(state: &AppState, id: &str) -> bool {
    state.documents.remove(id).is_some()
}

pub(super) fn save_file_impl(state: &AppState, id: &str) -> Result<(), String> {
    if let Some(mut doc) = state.documents.get_mut(id) {
        if let Some(path) = &doc.path {
            let mut file = File::create(path).map_err(|e| e.to_string())?;
            let persist_content = build_persist_content(&doc);
            let (bytes, _, _malformed) = doc.encoding.encode(&persist_content);

            file.write_all(&bytes).map_err(|e| e.to_string())?;
            doc.saved_document_version = doc.document_version;

            Ok(())
        } else {
            Err("No path associated with this file. Use Save As.".to_string())
        }
    } else {
        Err(DOCUMENT_NOT_FOUND.to_string())
    }
}

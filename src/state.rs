use dashmap::DashMap;
use encoding_rs::Encoding;
use ropey::Rope;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineEnding {
    CrLf,
    Lf,
    Cr,
}

impl LineEnding {
    pub fn label(self) -> &'static str {
        match self {
            LineEnding::CrLf => "CRLF",
            LineEnding::Lf => "LF",
            LineEnding::Cr => "CR",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "CRLF" => Some(LineEnding::CrLf),
            "LF" => Some(LineEnding::Lf),
            "CR" => Some(LineEnding::Cr),
            _ => None,
        }
    }
}

pub fn default_line_ending() -> LineEnding {
    if cfg!(windows) {
        LineEnding::CrLf
    } else {
        LineEnding::Lf
    }
}

/// One open tab. The rope always holds LF-normalized text; `line_ending`
/// is re-applied when the document is written back to disk.
pub struct Document {
    pub rope: Rope,
    pub encoding: &'static Encoding,
    pub line_ending: LineEnding,
    pub path: Option<PathBuf>,
    pub document_version: u64,
    pub saved_document_version: u64,
}

impl Document {
    pub fn from_text(text: &str, path: Option<PathBuf>) -> Self {
        Self {
            rope: Rope::from_str(text),
            encoding: encoding_rs::UTF_8,
            line_ending: default_line_ending(),
            path,
            document_version: 0,
            saved_document_version: 0,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.document_version != self.saved_document_version
    }
}

pub struct AppState {
    pub documents: DashMap<String, Document>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub id: String,
    pub path: String,
    pub name: String,
    pub encoding: String,
    pub line_ending: String,
    pub line_count: usize,
    pub large_file_mode: bool,
}

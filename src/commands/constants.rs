pub(crate) const LARGE_FILE_THRESHOLD_BYTES: usize = 50 * 1024 * 1024;
pub(crate) const ENCODING_DETECT_SAMPLE_BYTES: usize = 1024 * 1024;
pub(crate) const DEFAULT_FILTER_RULE_TEXT: &str = "#1f2937";
pub(crate) const FILTER_MAX_RANGES_PER_LINE: usize = 256;
pub(crate) const DEFAULT_SEARCH_CHUNK_SIZE: usize = 300;
pub(crate) const DEFAULT_FILTER_CHUNK_SIZE: usize = 300;
pub(crate) const DEFAULT_LOAD_MORE_DEBOUNCE_MS: u64 = 40;
pub(crate) const MAX_LOAD_MORE_DEBOUNCE_MS: u64 = 1000;
pub(crate) const DEFAULT_VIEWPORT_FILL_MAX_ROUNDS: usize = 4;
pub(crate) const MAX_CHUNK_SIZE: usize = 5000;
pub(crate) const MAX_VIEWPORT_FILL_ROUNDS: usize = 32;
pub(crate) const CONFIG_DIR_ENV: &str = "RUTAR_CONFIG_DIR";
pub(crate) const DOCUMENT_NOT_FOUND: &str = "Document not found";

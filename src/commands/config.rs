use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::*;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to locate config directory")]
    NoConfigDir,
    #[error("Failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("Failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("Failed to parse config file: {0}")]
    Parse(serde_json::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(serde_json::Error),
    #[error("Import file is empty")]
    EmptyImport,
    #[error("Failed to parse filter groups file: {0}")]
    ImportParse(serde_json::Error),
}

impl From<ConfigError> for BackendError {
    fn from(err: ConfigError) -> Self {
        BackendError(err.to_string())
    }
}

/// Paging knobs for the search panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSettings {
    pub search_chunk_size: usize,
    pub filter_chunk_size: usize,
    pub load_more_debounce_ms: u64,
    pub viewport_fill_max_rounds: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            search_chunk_size: DEFAULT_SEARCH_CHUNK_SIZE,
            filter_chunk_size: DEFAULT_FILTER_CHUNK_SIZE,
            load_more_debounce_ms: DEFAULT_LOAD_MORE_DEBOUNCE_MS,
            viewport_fill_max_rounds: DEFAULT_VIEWPORT_FILL_MAX_ROUNDS,
        }
    }
}

impl SearchSettings {
    pub fn normalized(self) -> Self {
        Self {
            search_chunk_size: self.search_chunk_size.clamp(1, MAX_CHUNK_SIZE),
            filter_chunk_size: self.filter_chunk_size.clamp(1, MAX_CHUNK_SIZE),
            load_more_debounce_ms: self.load_more_debounce_ms.min(MAX_LOAD_MORE_DEBOUNCE_MS),
            viewport_fill_max_rounds: self.viewport_fill_max_rounds.min(MAX_VIEWPORT_FILL_ROUNDS),
        }
    }

    pub fn load_more_debounce(&self) -> Duration {
        Duration::from_millis(self.load_more_debounce_ms)
    }
}

/// Every key is optional so a config written by another Rutar component
/// still loads; keys this crate does not own are carried in `extra`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartialAppConfig {
    search_chunk_size: Option<usize>,
    filter_chunk_size: Option<usize>,
    load_more_debounce_ms: Option<u64>,
    viewport_fill_max_rounds: Option<usize>,
    filter_rule_groups: Option<Vec<FilterRuleGroup>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(flatten)]
    pub search: SearchSettings,
    pub filter_rule_groups: Vec<FilterRuleGroup>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilterRuleGroupsFilePayload {
    filter_rule_groups: Vec<FilterRuleGroup>,
}

fn resolve_config_file_path(
    override_dir: Option<OsString>,
    config_dir: Option<PathBuf>,
) -> Result<PathBuf, ConfigError> {
    if let Some(dir) = override_dir.filter(|dir| !dir.is_empty()) {
        return Ok(PathBuf::from(dir).join("config.json"));
    }

    config_dir
        .map(|dir| dir.join("Rutar").join("config.json"))
        .ok_or(ConfigError::NoConfigDir)
}

pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    resolve_config_file_path(std::env::var_os(CONFIG_DIR_ENV), dirs::config_dir())
}

pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if raw.trim().is_empty() {
        return Ok(AppConfig::default());
    }

    let partial: PartialAppConfig = serde_json::from_str(&raw).map_err(ConfigError::Parse)?;

    let mut config = AppConfig::default();

    if let Some(search_chunk_size) = partial.search_chunk_size {
        config.search.search_chunk_size = search_chunk_size;
    }

    if let Some(filter_chunk_size) = partial.filter_chunk_size {
        config.search.filter_chunk_size = filter_chunk_size;
    }

    if let Some(load_more_debounce_ms) = partial.load_more_debounce_ms {
        config.search.load_more_debounce_ms = load_more_debounce_ms;
    }

    if let Some(viewport_fill_max_rounds) = partial.viewport_fill_max_rounds {
        config.search.viewport_fill_max_rounds = viewport_fill_max_rounds;
    }

    config.search = config.search.normalized();
    config.filter_rule_groups = normalize_rule_groups(partial.filter_rule_groups.unwrap_or_default());
    config.extra = partial.extra;

    Ok(config)
}

pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    let normalized = AppConfig {
        search: config.search.normalized(),
        filter_rule_groups: normalize_rule_groups(config.filter_rule_groups.clone()),
        extra: config.extra.clone(),
    };

    write_pretty_json(path, &normalized)
}

fn write_pretty_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let content = serde_json::to_string_pretty(value).map_err(ConfigError::Serialize)?;
    fs::write(path, format!("{}\n", content)).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Accepts `{ "filterRuleGroups": [...] }` or a bare array of groups.
fn parse_rule_groups_file(raw: &str) -> Result<Vec<FilterRuleGroup>, ConfigError> {
    if raw.trim().is_empty() {
        return Err(ConfigError::EmptyImport);
    }

    let parsed_groups = match serde_json::from_str::<FilterRuleGroupsFilePayload>(raw) {
        Ok(payload) => payload.filter_rule_groups,
        Err(_) => {
            serde_json::from_str::<Vec<FilterRuleGroup>>(raw).map_err(ConfigError::ImportParse)?
        }
    };

    Ok(normalize_rule_groups(parsed_groups))
}

/// Rule groups persisted under `filterRuleGroups` in the app config file.
#[derive(Debug, Clone)]
pub struct FileRuleGroupStore {
    path: PathBuf,
}

impl FileRuleGroupStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_default_location() -> Result<Self, ConfigError> {
        config_file_path().map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RuleGroupStore for FileRuleGroupStore {
    async fn load_rule_groups(&self) -> Result<Vec<FilterRuleGroup>, BackendError> {
        Ok(load_config(&self.path)?.filter_rule_groups)
    }

    async fn save_rule_groups(&self, groups: &[FilterRuleGroup]) -> Result<(), BackendError> {
        let mut config = load_config(&self.path)?;
        config.filter_rule_groups = groups.to_vec();
        save_config(&self.path, &config)?;
        Ok(())
    }

    async fn import_rule_groups(&self, path: &Path) -> Result<Vec<FilterRuleGroup>, BackendError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(parse_rule_groups_file(&raw)?)
    }

    async fn export_rule_groups(
        &self,
        path: &Path,
        groups: &[FilterRuleGroup],
    ) -> Result<(), BackendError> {
        let payload = FilterRuleGroupsFilePayload {
            filter_rule_groups: normalize_rule_groups(groups.to_vec()),
        };
        write_pretty_json(path, &payload)?;
        Ok(())
    }
}

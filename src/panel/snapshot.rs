use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::query::SearchMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelMode {
    #[default]
    Find,
    Replace,
    Filter,
}

/// Everything the user typed or toggled in the panel for one tab.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabSnapshot {
    pub is_open: bool,
    pub mode: PanelMode,
    pub keyword: String,
    pub replace_value: String,
    pub search_mode: SearchMode,
    pub case_sensitive: bool,
    pub reverse_search: bool,
    pub result_filter_keyword: String,
}

#[derive(Debug, Default)]
pub struct SnapshotStore {
    snapshots: HashMap<String, TabSnapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tab_id: &str) -> Option<&TabSnapshot> {
        self.snapshots.get(tab_id)
    }

    pub fn set(&mut self, tab_id: &str, snapshot: TabSnapshot) {
        self.snapshots.insert(tab_id.to_string(), snapshot);
    }

    pub fn remove(&mut self, tab_id: &str) -> Option<TabSnapshot> {
        self.snapshots.remove(tab_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_store_should_keep_tabs_apart_and_forget_closed_ones() {
        let mut store = SnapshotStore::new();
        store.set(
            "a",
            TabSnapshot {
                is_open: true,
                keyword: "needle".to_string(),
                ..TabSnapshot::default()
            },
        );

        assert_eq!(store.get("a").map(|s| s.keyword.as_str()), Some("needle"));
        assert!(store.get("b").is_none());

        store.set("a", TabSnapshot::default());
        assert_eq!(store.get("a"), Some(&TabSnapshot::default()));

        assert!(store.remove("a").is_some());
        assert!(store.get("a").is_none());
    }
}

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Fire-and-forget notifications for the UI shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum PanelEvent {
    #[serde(rename_all = "camelCase")]
    DocumentEdited { tab_id: String, line_count: usize },
    #[serde(rename_all = "camelCase")]
    NavigateToMatch {
        tab_id: String,
        line: usize,
        column: usize,
        length: usize,
    },
    #[serde(rename_all = "camelCase")]
    PanelClosed { tab_id: String },
}

impl PanelEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            PanelEvent::DocumentEdited { .. } => "rutar:document-updated",
            PanelEvent::NavigateToMatch { .. } => "rutar:navigate-to-line",
            PanelEvent::PanelClosed { .. } => "rutar:search-close",
        }
    }

    pub fn tab_id(&self) -> &str {
        match self {
            PanelEvent::DocumentEdited { tab_id, .. }
            | PanelEvent::NavigateToMatch { tab_id, .. }
            | PanelEvent::PanelClosed { tab_id } => tab_id,
        }
    }
}

pub struct EventBus {
    sender: broadcast::Sender<PanelEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PanelEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of receivers reached; zero when nobody listens.
    pub fn publish(&self, event: PanelEvent) -> usize {
        tracing::trace!(event = event.event_name(), tab_id = event.tab_id(), "panel event");
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

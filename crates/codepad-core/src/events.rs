use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::buffers::BufferSummary;
use crate::confirm::ConfirmationRequest;
use crate::workspace::EditorView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Events the workspace reports to its user interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkspaceEvent {
    /// Transient notification (toast)
    Notice { level: NoticeLevel, message: String },
    /// A prompt became the one shown to the user
    Confirm(ConfirmationRequest),
    /// No prompt is shown anymore
    ConfirmCleared,
    /// A buffer became the one shown in the editor
    Active(EditorView),
    /// The open buffer list or a dirty flag changed
    Buffers { buffers: Vec<BufferSummary> },
    /// The project tree was replaced
    TreeChanged,
}

/// Sending half of the event stream; a sink without a receiver drops events
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<WorkspaceEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<WorkspaceEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn emit(&self, event: WorkspaceEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                debug!("event receiver dropped");
            }
        }
    }

    pub fn success(&self, message: impl Into<String>) {
        self.emit(WorkspaceEvent::Notice {
            level: NoticeLevel::Success,
            message: message.into(),
        });
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(WorkspaceEvent::Notice {
            level: NoticeLevel::Error,
            message: message.into(),
        });
    }
}

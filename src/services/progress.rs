use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

/// Counters attached to a progress message. Absent fields are not serialised.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_files: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_files: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strings_translated: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<bool>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProgressEvent {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<ProgressDelta>,
}

/// Where a run reports progress. Every event is logged; a channel is optional.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<UnboundedSender<ProgressEvent>>,
}

impl ProgressSink {
    pub fn new(tx: UnboundedSender<ProgressEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Log-only sink.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn emit(&self, message: impl Into<String>, delta: Option<ProgressDelta>) {
        let message = message.into();
        info!("{message}");

        if let Some(tx) = &self.tx {
            // receiver gone means nobody is listening any more
            let _ = tx.send(ProgressEvent { message, delta });
        }
    }

    pub fn message(&self, message: impl Into<String>) {
        self.emit(message, None);
    }
}

mod event;
mod sink;

use std::{fmt::Display, sync::Arc};

pub use event::*;
pub use sink::*;

/// Shared handle to an event sink.
pub type EventSinkHandle = Arc<dyn EventSink>;

/// Emits the events of one repository sync into a sink.
#[derive(Clone)]
pub struct SyncReporter {
    sink: EventSinkHandle,
    repo_id: i64,
    repo_name: String,
}

impl SyncReporter {
    pub fn new(sink: EventSinkHandle, repo_id: i64, repo_name: impl Into<String>) -> Self {
        Self {
            sink,
            repo_id,
            repo_name: repo_name.into(),
        }
    }

    pub fn started(&self) {
        self.sink.emit(SyncEvent::SyncStarted {
            repo_id: self.repo_id,
            repo_name: self.repo_name.clone(),
        });
    }

    pub fn progress(&self, stage: SyncStage, current: u64, total: Option<u64>) {
        self.sink.emit(SyncEvent::SyncProgress {
            repo_id: self.repo_id,
            repo_name: self.repo_name.clone(),
            stage,
            current,
            total,
        });
    }

    pub fn finished(&self, changed: bool) {
        self.sink.emit(SyncEvent::SyncFinished {
            repo_id: self.repo_id,
            repo_name: self.repo_name.clone(),
            changed,
        });
    }

    pub fn failed(&self, error: &dyn Display) {
        self.sink.emit(SyncEvent::SyncFailed {
            repo_id: self.repo_id,
            repo_name: self.repo_name.clone(),
            error: error.to_string(),
        });
    }
}

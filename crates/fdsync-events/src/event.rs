use std::fmt;

/// Events emitted while repositories are synced.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A repository sync started.
    SyncStarted { repo_id: i64, repo_name: String },

    /// Progress within one stage. `total` is unknown when `None`.
    SyncProgress {
        repo_id: i64,
        repo_name: String,
        stage: SyncStage,
        current: u64,
        total: Option<u64>,
    },

    /// The sync ended. `changed` is false when the index was not modified.
    SyncFinished {
        repo_id: i64,
        repo_name: String,
        changed: bool,
    },

    SyncFailed {
        repo_id: i64,
        repo_name: String,
        error: String,
    },

    Log { level: LogLevel, message: String },
}

impl SyncEvent {
    pub fn repo_id(&self) -> Option<i64> {
        match self {
            SyncEvent::SyncStarted { repo_id, .. }
            | SyncEvent::SyncProgress { repo_id, .. }
            | SyncEvent::SyncFinished { repo_id, .. }
            | SyncEvent::SyncFailed { repo_id, .. } => Some(*repo_id),
            SyncEvent::Log { .. } => None,
        }
    }
}

/// Stages of a single repository sync, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStage {
    /// Fetching the signed index archive.
    Download,
    /// Reading and parsing the index entry.
    Process,
    /// Replaying merged products into storage.
    Merge,
    /// Swapping the new catalog in.
    Commit,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStage::Download => "Downloading",
            SyncStage::Process => "Processing",
            SyncStage::Merge => "Merging",
            SyncStage::Commit => "Committing",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

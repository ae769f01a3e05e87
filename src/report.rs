use crate::path_key::PathKey;
use std::fmt;

/// Outcome of a run that did not abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Complete,
    /// Some files were skipped. The report lists them.
    CompletedWithWarnings,
}

impl RunStatus {
    pub fn from_warnings(has_warnings: bool) -> Self {
        if has_warnings {
            RunStatus::CompletedWithWarnings
        } else {
            RunStatus::Complete
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Complete => "complete",
            RunStatus::CompletedWithWarnings => "completed-with-warnings",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single item that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathKey,
    pub reason: String,
}

impl FileFailure {
    pub fn new(path: &PathKey, reason: impl fmt::Display) -> Self {
        FileFailure {
            path: path.clone(),
            reason: reason.to_string(),
        }
    }
}

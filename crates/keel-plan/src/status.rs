//! Status of steps, phases and plans.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Error,
    /// Paused by an operator; no new work is handed out.
    Waiting,
    Pending,
    Prepared,
    Starting,
    InProgress,
    Complete,
}

impl Status {
    pub fn is_complete(self) -> bool {
        self == Status::Complete
    }

    pub fn is_error(self) -> bool {
        self == Status::Error
    }

    /// Work has begun but not finished.
    pub fn is_running(self) -> bool {
        matches!(self, Status::Prepared | Status::Starting | Status::InProgress)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Error => "ERROR",
            Status::Waiting => "WAITING",
            Status::Pending => "PENDING",
            Status::Prepared => "PREPARED",
            Status::Starting => "STARTING",
            Status::InProgress => "IN_PROGRESS",
            Status::Complete => "COMPLETE",
        };
        f.write_str(s)
    }
}

/// Fold child statuses into a parent status.
///
/// No children, or all complete, is `Complete`. Any error is `Error`. All
/// pending is `Pending`. Anything else is `InProgress`.
pub fn aggregate(statuses: impl IntoIterator<Item = Status>) -> Status {
    let mut all_complete = true;
    let mut all_pending = true;
    for status in statuses {
        if status.is_error() {
            return Status::Error;
        }
        all_complete &= status.is_complete();
        all_pending &= status == Status::Pending;
    }
    if all_complete {
        Status::Complete
    } else if all_pending {
        Status::Pending
    } else {
        Status::InProgress
    }
}

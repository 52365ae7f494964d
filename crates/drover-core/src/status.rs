/// Lifecycle state of a job, derived on every read from the record's
/// markers and the process table. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Record exists but no process has been bound to it yet.
    Unbound,
    Running,
    Paused,
    /// Exited with code 0.
    Success,
    /// Exited with a non-zero code, or was taken down by a signal.
    Failed,
}

impl JobStatus {
    /// Active jobs hold a live OS process and refuse to be cleaned.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    /// Terminal states never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unbound => "unbound",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Success => "success",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_and_terminal_are_disjoint() {
        let all = [
            JobStatus::Unbound,
            JobStatus::Running,
            JobStatus::Paused,
            JobStatus::Success,
            JobStatus::Failed,
        ];
        for status in all {
            assert!(!(status.is_active() && status.is_terminal()));
        }
        assert!(JobStatus::Running.is_active());
        assert!(JobStatus::Paused.is_active());
        assert!(!JobStatus::Unbound.is_active());
        assert!(JobStatus::Success.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn display_matches_wire_casing() {
        assert_eq!(JobStatus::Paused.to_string(), "paused");
        assert_eq!(JobStatus::Unbound.to_string(), "unbound");
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// Overall state of a submitted run.
///
/// `Success` and `Failure` are terminal; `Deleting` is the transient state
/// entered from either of them while resources are being torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunPhase {
    Creating,
    Submitting,
    Running,
    Success,
    Failure,
    Deleting,
    Unknown,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Success | RunPhase::Failure)
    }

    /// Process exit code for the status and reconciliation tools.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunPhase::Success => 0,
            RunPhase::Failure => 1,
            RunPhase::Creating => 2,
            RunPhase::Submitting => 3,
            RunPhase::Running => 4,
            RunPhase::Deleting => 5,
            RunPhase::Unknown => 6,
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Creating => "CREATING",
            RunPhase::Submitting => "SUBMITTING",
            RunPhase::Running => "RUNNING",
            RunPhase::Success => "SUCCESS",
            RunPhase::Failure => "FAILURE",
            RunPhase::Deleting => "DELETING",
            RunPhase::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_phases() {
        assert!(RunPhase::Success.is_terminal());
        assert!(RunPhase::Failure.is_terminal());
        assert!(!RunPhase::Running.is_terminal());
        assert!(!RunPhase::Deleting.is_terminal());
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        let phases = [
            RunPhase::Success,
            RunPhase::Failure,
            RunPhase::Creating,
            RunPhase::Submitting,
            RunPhase::Running,
            RunPhase::Deleting,
            RunPhase::Unknown,
        ];
        let mut codes: Vec<i32> = phases.iter().map(|p| p.exit_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), phases.len());
    }
}

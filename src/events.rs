//! Status feed from the pipeline back to whoever drives it.

use crate::jobs::JobStatus;
use std::fmt;
use uuid::Uuid;

/// Events emitted while requests move through the pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineEvent {
    /// A request changed state.
    JobUpdated { job_id: Uuid, status: JobStatus },
    /// Informational status line.
    Log(String),
    /// User-visible failure line.
    Error(String),
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineEvent::JobUpdated { job_id, status } => {
                let short = &job_id.simple().to_string()[..8];
                match status {
                    JobStatus::Failed(reason) => write!(f, "[{short}] failed: {reason}"),
                    other => write!(f, "[{short}] {other:?}"),
                }
            }
            PipelineEvent::Log(msg) => write!(f, "✓ {msg}"),
            PipelineEvent::Error(msg) => write!(f, "✗ {msg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lines() {
        let id = Uuid::nil();
        let done = PipelineEvent::JobUpdated {
            job_id: id,
            status: JobStatus::Done,
        };
        assert_eq!(done.to_string(), "[00000000] Done");
        let failed = PipelineEvent::JobUpdated {
            job_id: id,
            status: JobStatus::Failed("boom".into()),
        };
        assert_eq!(failed.to_string(), "[00000000] failed: boom");
        assert_eq!(PipelineEvent::Log("ok".into()).to_string(), "✓ ok");
    }
}

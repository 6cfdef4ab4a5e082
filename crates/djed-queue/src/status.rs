use crate::job::JobStatus;

/// An event driving a job's state machine forward (spec.md §4.5's diagram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobTransition {
    DelayElapsed,
    Acquire,
    Succeed,
    FailRetry,
    FailExhausted,
}

/// Applies one state-machine transition (spec.md §4.5's diagram, folded the
/// way `invariant-journal::status::derive_next_status` folds journal
/// events into an `ExecutionStatus`): transitions that don't apply to the
/// current status leave it unchanged.
pub fn derive_next_job_status(current: JobStatus, transition: JobTransition) -> JobStatus {
    match (current, transition) {
        (JobStatus::Delayed, JobTransition::DelayElapsed) => JobStatus::Waiting,
        (JobStatus::Waiting, JobTransition::Acquire) => JobStatus::Active,
        (JobStatus::Active, JobTransition::Succeed) => JobStatus::Completed,
        (JobStatus::Active, JobTransition::FailRetry) => JobStatus::Waiting,
        (JobStatus::Active, JobTransition::FailExhausted) => JobStatus::Failed,
        (current, _) => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_success_lifecycle_matches_diagram() {
        let mut status = JobStatus::Delayed;
        status = derive_next_job_status(status, JobTransition::DelayElapsed);
        assert_eq!(status, JobStatus::Waiting);
        status = derive_next_job_status(status, JobTransition::Acquire);
        assert_eq!(status, JobStatus::Active);
        status = derive_next_job_status(status, JobTransition::Succeed);
        assert_eq!(status, JobStatus::Completed);
    }

    #[test]
    fn failure_with_attempts_remaining_returns_to_waiting() {
        let status = derive_next_job_status(JobStatus::Active, JobTransition::FailRetry);
        assert_eq!(status, JobStatus::Waiting);
    }

    #[test]
    fn exhausted_failure_is_terminal() {
        let status = derive_next_job_status(JobStatus::Active, JobTransition::FailExhausted);
        assert_eq!(status, JobStatus::Failed);
    }

    #[test]
    fn irrelevant_transition_is_a_no_op() {
        let status = derive_next_job_status(JobStatus::Completed, JobTransition::Acquire);
        assert_eq!(status, JobStatus::Completed);
    }
}

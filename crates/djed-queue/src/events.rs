/// Queue lifecycle events (spec.md §4.5, §6). Consumers treat the set as
/// open — unknown variants from future backends are ignored, not an error.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    JobAdded { id: String },
    JobActive { id: String },
    JobCompleted { id: String, result: serde_json::Value },
    JobFailed { id: String, error: String },
    QueuePaused,
    QueueResumed,
    QueueDrained,
    QueueError { message: String },
}

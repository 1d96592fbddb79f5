//! The shared message log one workflow run collaborates through.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a task inside a workflow.
///
/// `Pending → Working → Completed | Rejected`. The channel stores the status
/// but does not enforce transitions; workflows own that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Pending,
    Working,
    Completed,
    Rejected,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Rejected)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Working => "WORKING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Rejected => "REJECTED",
        };
        f.write_str(label)
    }
}

/// Append-only message log plus status flag for one task.
///
/// # Invariants
/// - `put` never drops or reorders messages
/// - `clear` empties messages and leaves the status alone
#[derive(Debug, Clone, Default)]
pub struct CollaborationChannel {
    task: String,
    messages: Vec<String>,
    status: TaskStatus,
}

impl CollaborationChannel {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            messages: Vec::new(),
            status: TaskStatus::Pending,
        }
    }

    pub fn put(&mut self, message: impl Into<String>) {
        let message = message.into();
        if message.trim().is_empty() {
            tracing::warn!("Empty message appended to collaboration channel");
        }
        self.messages.push(message);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn set_task(&mut self, task: impl Into<String>) {
        self.task = task.into();
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn last(&self) -> Option<&str> {
        self.messages.last().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn set_status(&mut self, status: TaskStatus) {
        if self.status != status {
            tracing::debug!("Channel status {} -> {}", self.status, status);
        }
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_preserves_order_and_never_drops() {
        let mut channel = CollaborationChannel::new("task");
        for i in 0..100 {
            channel.put(format!("worker: {}", i));
        }
        channel.put("");

        assert_eq!(channel.len(), 101);
        assert_eq!(channel.messages()[0], "worker: 0");
        assert_eq!(channel.messages()[99], "worker: 99");
        assert_eq!(channel.last(), Some(""));
    }

    #[test]
    fn test_clear_keeps_status() {
        let mut channel = CollaborationChannel::new("task");
        channel.put("plan: x");
        channel.set_status(TaskStatus::Working);

        channel.clear();

        assert!(channel.is_empty());
        assert_eq!(channel.status(), TaskStatus::Working);
        assert_eq!(channel.task(), "task");
    }

    #[test]
    fn test_status_terminality() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Working.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Rejected.is_terminal());
        assert_eq!(TaskStatus::Rejected.to_string(), "REJECTED");
    }
}

//! Agents: a workflow plus the memory it accumulates across tasks.
//!
//! [`Agent`] is the usual way to run a task. [`TaskAgent`] is the seam the
//! agency's manager uses, so anything that can take a task and return a
//! result can be managed.

mod agent;

pub use agent::{strip_worker_prefix, Agent};

use async_trait::async_trait;

/// Something the agency's manager can hand a task to.
#[async_trait]
pub trait TaskAgent: Send + Sync {
    /// Run `task` to completion and return the result text.
    async fn invoke(&mut self, task: &str) -> anyhow::Result<String>;
}

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use super::{
    complete, reject_on_error, run_component, start, Component, Workflow, WorkflowError,
    WorkflowKind, WorkflowOptions, WorkflowOutcome,
};
use crate::channel::{CollaborationChannel, TaskStatus};
use crate::llm::Model;
use crate::memory::WorkingMemory;
use crate::workers::PromptRole;

/// One item of a broken-down task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubTask {
    pub task: String,
    pub status: TaskStatus,
}

fn sub_task_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<sub-task>(.*?)</sub-task>").expect("static regex"))
}

/// Every `<sub-task>…</sub-task>` in `text`, in order, as pending sub-tasks.
pub fn extract_sub_tasks(text: &str) -> Vec<SubTask> {
    sub_task_regex()
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|t| !t.is_empty())
        .map(|t| SubTask {
            task: t.to_string(),
            status: TaskStatus::Pending,
        })
        .collect()
}

/// Asks the task-planning worker to split the task into sub-tasks.
pub struct TaskBreakdownWorkflow {
    channel: CollaborationChannel,
    planner: Component,
    sub_tasks: Vec<SubTask>,
}

impl TaskBreakdownWorkflow {
    pub fn new(task: &str, model: &Model, options: &WorkflowOptions) -> Self {
        Self {
            channel: CollaborationChannel::new(task),
            planner: options.prompt_component(PromptRole::TaskPlanning, model),
            sub_tasks: Vec::new(),
        }
    }

    /// Sub-tasks found by the last run.
    pub fn sub_tasks(&self) -> &[SubTask] {
        &self.sub_tasks
    }

    async fn drive(&mut self, memory: &mut WorkingMemory) -> Result<WorkflowOutcome, WorkflowError> {
        start(&mut self.channel)?;
        run_component(&self.planner, &mut self.channel, memory).await?;

        self.sub_tasks = extract_sub_tasks(self.channel.last().unwrap_or_default());
        if self.sub_tasks.is_empty() {
            tracing::warn!("Task planning produced no <sub-task> items");
        } else {
            tracing::info!("Task broken into {} sub-tasks", self.sub_tasks.len());
        }
        complete(&mut self.channel, memory, 1)
    }
}

#[async_trait]
impl Workflow for TaskBreakdownWorkflow {
    fn kind(&self) -> WorkflowKind {
        WorkflowKind::TaskBreakdown
    }

    fn channel(&self) -> &CollaborationChannel {
        &self.channel
    }

    fn channel_mut(&mut self) -> &mut CollaborationChannel {
        &mut self.channel
    }

    async fn run(&mut self, memory: &mut WorkingMemory) -> Result<WorkflowOutcome, WorkflowError> {
        let result = self.drive(memory).await;
        reject_on_error(&mut self.channel, result)
    }
}

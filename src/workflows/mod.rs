//! Workflows: ordered runs of components over one collaboration channel.
//!
//! Every workflow drives its channel through `Pending → Working →
//! {Completed | Rejected}` and returns a `Result`; a failing component marks
//! the channel `Rejected` and its error is returned as-is.

mod breakdown;
mod component;
mod reflect;
mod staged;

pub use breakdown::{extract_sub_tasks, SubTask, TaskBreakdownWorkflow};
pub use component::Component;
pub use reflect::{ReflectWorkflow, DEFAULT_MAX_ITERATIONS};
pub use staged::StagedWorkflow;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::channel::{CollaborationChannel, TaskStatus};
use crate::llm::Model;
use crate::memory::{PlanStore, WorkingMemory};
use crate::sandbox::{SandboxConfig, TestSuite};
use crate::structure::DEFAULT_MAX_ATTEMPTS;
use crate::workers::{PromptRole, PromptWorker, WorkerError, DEFAULT_RETRY_DELAY};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("task is empty")]
    EmptyTask,

    #[error("component '{component}' failed: {source}")]
    Component {
        component: String,
        #[source]
        source: WorkerError,
    },

    #[error("task not approved after {limit} iterations")]
    IterationLimit { limit: u32 },

    #[error("workflow produced no messages")]
    NoResult,
}

/// How a workflow run ended.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowOutcome {
    /// `Completed` or `Rejected`.
    pub status: TaskStatus,
    /// The last channel message.
    pub result: String,
    /// Work/review rounds; 1 for single-pass workflows.
    pub iterations: u32,
}

/// Settings shared by every workflow constructor.
#[derive(Clone)]
pub struct WorkflowOptions {
    /// Structured-output attempts per model call.
    pub max_attempts: u32,
    /// Cap on reflect-loop rounds.
    pub max_iterations: u32,
    pub plan_store: Option<Arc<dyn PlanStore>>,
    pub sandbox: SandboxConfig,
    /// Required by the TDD workflow.
    pub test_suite: Option<TestSuite>,
    /// Pause between generate-and-run retries.
    pub retry_delay: Duration,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            plan_store: None,
            sandbox: SandboxConfig::default(),
            test_suite: None,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl WorkflowOptions {
    pub(crate) fn prompt_worker(&self, role: PromptRole, model: &Model) -> PromptWorker {
        let worker = PromptWorker::new(role, model.clone()).with_max_attempts(self.max_attempts);
        match &self.plan_store {
            Some(store) if role == PromptRole::Plan => worker.with_plan_store(store.clone()),
            _ => worker,
        }
    }

    pub(crate) fn prompt_component(&self, role: PromptRole, model: &Model) -> Component {
        Component::new(role.name(), self.prompt_worker(role, model))
    }
}

#[async_trait]
pub trait Workflow: Send + Sync {
    fn kind(&self) -> WorkflowKind;

    fn channel(&self) -> &CollaborationChannel;

    fn channel_mut(&mut self) -> &mut CollaborationChannel;

    /// Run every component over the channel.
    ///
    /// # Postconditions
    /// - The channel status is `Completed` or `Rejected`
    /// - On `Completed`, the last message was pushed into `memory`
    async fn run(&mut self, memory: &mut WorkingMemory) -> Result<WorkflowOutcome, WorkflowError>;

    /// Point the workflow at a new task.
    fn set_task(&mut self, task: &str) {
        let channel = self.channel_mut();
        channel.set_task(task);
        channel.set_status(TaskStatus::Pending);
    }
}

/// The workflows a task can be run through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowKind {
    Simple,
    SimpleTool,
    Collaboration,
    Code,
    CodeTool,
    Tdd,
    Reflect,
    TaskBreakdown,
}

impl WorkflowKind {
    pub const ALL: [WorkflowKind; 8] = [
        Self::Simple,
        Self::SimpleTool,
        Self::Collaboration,
        Self::Code,
        Self::CodeTool,
        Self::Tdd,
        Self::Reflect,
        Self::TaskBreakdown,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::SimpleTool => "simple_tool",
            Self::Collaboration => "collaboration",
            Self::Code => "code",
            Self::CodeTool => "code_tool",
            Self::Tdd => "tdd",
            Self::Reflect => "reflect",
            Self::TaskBreakdown => "task_breakdown",
        }
    }

    /// Build a fresh workflow of this kind for `task`.
    pub fn build(
        &self,
        task: &str,
        model: &Model,
        options: &WorkflowOptions,
    ) -> Box<dyn Workflow> {
        match self {
            Self::Simple => Box::new(StagedWorkflow::simple(task, model, options)),
            Self::SimpleTool => Box::new(StagedWorkflow::simple_tool(task, model, options)),
            Self::Collaboration => Box::new(StagedWorkflow::collaboration(task, model, options)),
            Self::Code => Box::new(StagedWorkflow::code(task, model, options)),
            Self::CodeTool => Box::new(StagedWorkflow::code_tool(task, model, options)),
            Self::Tdd => Box::new(StagedWorkflow::tdd(task, model, options)),
            Self::Reflect => Box::new(ReflectWorkflow::new(task, model, options)),
            Self::TaskBreakdown => Box::new(TaskBreakdownWorkflow::new(task, model, options)),
        }
    }
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run one component, naming it in the error.
pub(crate) async fn run_component(
    component: &Component,
    channel: &mut CollaborationChannel,
    memory: &WorkingMemory,
) -> Result<Option<crate::structure::ApprovalStatus>, WorkflowError> {
    component
        .run(channel, memory)
        .await
        .map_err(|source| WorkflowError::Component {
            component: component.name().to_string(),
            source,
        })
}

/// Clear the chat from any earlier run and mark the channel working.
pub(crate) fn start(channel: &mut CollaborationChannel) -> Result<(), WorkflowError> {
    if channel.task().trim().is_empty() {
        return Err(WorkflowError::EmptyTask);
    }
    tracing::info!("Working on the task: {}", channel.task());
    channel.clear();
    channel.set_status(TaskStatus::Working);
    Ok(())
}

/// Mark the channel completed and remember the result.
pub(crate) fn complete(
    channel: &mut CollaborationChannel,
    memory: &mut WorkingMemory,
    iterations: u32,
) -> Result<WorkflowOutcome, WorkflowError> {
    let result = channel.last().ok_or(WorkflowError::NoResult)?.to_string();
    memory.add_message(result.clone());
    channel.set_status(TaskStatus::Completed);
    tracing::info!("Completed the task: {}", channel.task());
    Ok(WorkflowOutcome {
        status: TaskStatus::Completed,
        result,
        iterations,
    })
}

/// Mark the channel rejected when `result` is an error.
pub(crate) fn reject_on_error<T>(
    channel: &mut CollaborationChannel,
    result: Result<T, WorkflowError>,
) -> Result<T, WorkflowError> {
    if let Err(e) = &result {
        tracing::warn!("Workflow failed on '{}': {}", channel.task(), e);
        channel.set_status(TaskStatus::Rejected);
    }
    result
}

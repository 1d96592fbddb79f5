use async_trait::async_trait;

use super::{
    complete, reject_on_error, run_component, start, Component, Workflow, WorkflowError,
    WorkflowKind, WorkflowOptions, WorkflowOutcome,
};
use crate::channel::CollaborationChannel;
use crate::llm::Model;
use crate::memory::WorkingMemory;
use crate::sandbox::{CodeTester, ToolRunner};
use crate::workers::{CodeToolWorker, PromptRole, TddWorker, ToolWorker};

/// A single pass over a fixed list of components.
///
/// The tool stage is included only when the model has tools registered.
pub struct StagedWorkflow {
    kind: WorkflowKind,
    channel: CollaborationChannel,
    components: Vec<Component>,
}

fn tool_stage(model: &Model, options: &WorkflowOptions) -> Option<Component> {
    model.has_tools().then(|| {
        Component::new(
            "tool",
            ToolWorker::new(model.clone()).with_max_attempts(options.max_attempts),
        )
    })
}

impl StagedWorkflow {
    pub fn new(kind: WorkflowKind, task: &str, components: Vec<Component>) -> Self {
        Self {
            kind,
            channel: CollaborationChannel::new(task),
            components,
        }
    }

    /// plan → [tool] → work → finalise
    pub fn simple(task: &str, model: &Model, options: &WorkflowOptions) -> Self {
        let mut components = vec![options.prompt_component(PromptRole::Plan, model)];
        components.extend(tool_stage(model, options));
        components.push(options.prompt_component(PromptRole::Work, model));
        components.push(options.prompt_component(PromptRole::Finalise, model));
        Self::new(WorkflowKind::Simple, task, components)
    }

    /// [tool] → work
    pub fn simple_tool(task: &str, model: &Model, options: &WorkflowOptions) -> Self {
        let mut components: Vec<Component> = tool_stage(model, options).into_iter().collect();
        components.push(options.prompt_component(PromptRole::Work, model));
        Self::new(WorkflowKind::SimpleTool, task, components)
    }

    /// [tool] → team
    pub fn collaboration(task: &str, model: &Model, options: &WorkflowOptions) -> Self {
        let mut components: Vec<Component> = tool_stage(model, options).into_iter().collect();
        components.push(options.prompt_component(PromptRole::Team, model));
        Self::new(WorkflowKind::Collaboration, task, components)
    }

    /// [tool] → code
    pub fn code(task: &str, model: &Model, options: &WorkflowOptions) -> Self {
        let mut components: Vec<Component> = tool_stage(model, options).into_iter().collect();
        components.push(options.prompt_component(PromptRole::Code, model));
        Self::new(WorkflowKind::Code, task, components)
    }

    /// code-tool → work
    pub fn code_tool(task: &str, model: &Model, options: &WorkflowOptions) -> Self {
        let code_tool = CodeToolWorker::new(model.clone(), ToolRunner::new(options.sandbox.clone()))
            .with_structured_attempts(options.max_attempts)
            .with_retry_delay(options.retry_delay);
        let components = vec![
            Component::new("code_tool", code_tool),
            options.prompt_component(PromptRole::Work, model),
        ];
        Self::new(WorkflowKind::CodeTool, task, components)
    }

    /// tdd; without a test suite the run fails with `MissingTestSuite`.
    pub fn tdd(task: &str, model: &Model, options: &WorkflowOptions) -> Self {
        let mut tdd = TddWorker::new(model.clone(), CodeTester::new(options.sandbox.clone()))
            .with_structured_attempts(options.max_attempts)
            .with_retry_delay(options.retry_delay);
        if let Some(suite) = &options.test_suite {
            tdd.set_test_suite(suite.clone());
        }
        Self::new(WorkflowKind::Tdd, task, vec![Component::new("tdd", tdd)])
    }

    pub fn component_names(&self) -> Vec<&str> {
        self.components.iter().map(Component::name).collect()
    }

    async fn drive(&mut self, memory: &mut WorkingMemory) -> Result<WorkflowOutcome, WorkflowError> {
        start(&mut self.channel)?;
        for component in &self.components {
            run_component(component, &mut self.channel, memory).await?;
        }
        complete(&mut self.channel, memory, 1)
    }
}

#[async_trait]
impl Workflow for StagedWorkflow {
    fn kind(&self) -> WorkflowKind {
        self.kind
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

use async_trait::async_trait;

use super::{
    complete, reject_on_error, run_component, start, Component, Workflow, WorkflowError,
    WorkflowKind, WorkflowOptions, WorkflowOutcome,
};
use crate::channel::{CollaborationChannel, TaskStatus};
use crate::llm::Model;
use crate::memory::WorkingMemory;
use crate::structure::ApprovalStatus;
use crate::workers::{PromptRole, ToolWorker};

pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// plan → [tool] → { work → reflect → approve }* → finalise
///
/// The loop repeats while the approval step answers `WORKING`.
///
/// # Invariants
/// - At most `max_iterations` rounds; one more would end the run with
///   `WorkflowError::IterationLimit` and a `Rejected` channel
/// - `REJECTED` from the approval step ends the run with `Ok` and a
///   `Rejected` outcome
pub struct ReflectWorkflow {
    channel: CollaborationChannel,
    plan: Component,
    tool: Option<Component>,
    work: Component,
    reflect: Component,
    approve: Component,
    finalise: Component,
    max_iterations: u32,
}

impl ReflectWorkflow {
    pub fn new(task: &str, model: &Model, options: &WorkflowOptions) -> Self {
        let tool = model.has_tools().then(|| {
            Component::new(
                "tool",
                ToolWorker::new(model.clone()).with_max_attempts(options.max_attempts),
            )
        });
        Self {
            channel: CollaborationChannel::new(task),
            plan: options.prompt_component(PromptRole::Plan, model),
            tool,
            work: options.prompt_component(PromptRole::Work, model),
            reflect: options.prompt_component(PromptRole::Reflect, model),
            approve: options.prompt_component(PromptRole::Approve, model),
            finalise: options.prompt_component(PromptRole::Finalise, model),
            max_iterations: options.max_iterations.max(1),
        }
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    async fn drive(&mut self, memory: &mut WorkingMemory) -> Result<WorkflowOutcome, WorkflowError> {
        start(&mut self.channel)?;
        run_component(&self.plan, &mut self.channel, memory).await?;
        if let Some(tool) = &self.tool {
            run_component(tool, &mut self.channel, memory).await?;
        }

        for iteration in 1..=self.max_iterations {
            run_component(&self.work, &mut self.channel, memory).await?;
            run_component(&self.reflect, &mut self.channel, memory).await?;
            let verdict = run_component(&self.approve, &mut self.channel, memory).await?;

            match verdict {
                Some(ApprovalStatus::Completed) => {
                    tracing::info!("Task approved after {} iteration(s)", iteration);
                    run_component(&self.finalise, &mut self.channel, memory).await?;
                    return complete(&mut self.channel, memory, iteration);
                }
                Some(ApprovalStatus::Rejected) => {
                    tracing::info!("Task rejected after {} iteration(s)", iteration);
                    self.channel.set_status(TaskStatus::Rejected);
                    let result = self.channel.last().unwrap_or_default().to_string();
                    return Ok(WorkflowOutcome {
                        status: TaskStatus::Rejected,
                        result,
                        iterations: iteration,
                    });
                }
                Some(ApprovalStatus::Working) | None => {
                    tracing::info!("Task not yet approved (iteration {}), continuing", iteration);
                }
            }
        }

        Err(WorkflowError::IterationLimit {
            limit: self.max_iterations,
        })
    }
}

#[async_trait]
impl Workflow for ReflectWorkflow {
    fn kind(&self) -> WorkflowKind {
        WorkflowKind::Reflect
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::{scripted_model, ScriptedClient};

    const PLAN: &str = r#"{"plan": ["draft", "check"], "answer": "draft then check", "confidence_score": 80}"#;
    const WORK: &str = r#"{"answer": "Paris", "confidence_score": 80}"#;
    const REFLECT: &str = r#"{"answer": "Paris, on the Seine", "confidence_score": 85}"#;
    const WORKING: &str = r#"{"status": "WORKING", "feedback": "add detail"}"#;
    const COMPLETED: &str = r#"{"status": "COMPLETED", "accepted_answer": "Paris"}"#;
    const FINAL: &str = r#"{"answer": "Paris", "confidence_score": 95}"#;

    #[tokio::test]
    async fn test_loops_until_approved() {
        let (model, client) = scripted_model([
            PLAN, WORK, REFLECT, WORKING, WORK, REFLECT, COMPLETED, FINAL,
        ]);
        let mut workflow = ReflectWorkflow::new("capital of France", &model, &WorkflowOptions::default());
        let mut memory = WorkingMemory::default();

        let outcome = workflow.run(&mut memory).await.unwrap();

        assert_eq!(outcome.status, TaskStatus::Completed);
        assert_eq!(outcome.iterations, 2);
        assert!(outcome.result.starts_with("finalise: "));
        assert_eq!(client.calls(), 8);
        assert_eq!(memory.len(), 1);
    }

    #[tokio::test]
    async fn test_approval_rejection_ends_run() {
        let (model, client) = scripted_model([
            PLAN,
            WORK,
            REFLECT,
            r#"{"status": "REJECTED", "feedback": "impossible"}"#,
        ]);
        let mut workflow = ReflectWorkflow::new("t", &model, &WorkflowOptions::default());
        let mut memory = WorkingMemory::default();

        let outcome = workflow.run(&mut memory).await.unwrap();
        assert_eq!(outcome.status, TaskStatus::Rejected);
        assert_eq!(workflow.channel().status(), TaskStatus::Rejected);
        assert_eq!(client.calls(), 4);
        assert!(memory.is_empty());
    }

    #[tokio::test]
    async fn test_iteration_cap() {
        let client = ScriptedClient::with_fallback([PLAN], WORKING);
        let model = Model::new(client.clone(), "scripted");
        let options = WorkflowOptions {
            max_iterations: 2,
            ..WorkflowOptions::default()
        };
        let mut workflow = ReflectWorkflow::new("t", &model, &options);
        let mut memory = WorkingMemory::default();

        let err = workflow.run(&mut memory).await.unwrap_err();
        assert!(matches!(err, WorkflowError::IterationLimit { limit: 2 }));
        assert_eq!(workflow.channel().status(), TaskStatus::Rejected);
        // plan + 2 × (work, reflect, approve)
        assert_eq!(client.calls(), 7);
    }
}

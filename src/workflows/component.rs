use crate::channel::CollaborationChannel;
use crate::memory::WorkingMemory;
use crate::structure::ApprovalStatus;
use crate::workers::{Worker, WorkerContext, WorkerError};

/// A named worker bound into a workflow.
///
/// Running it reads the task and chat from the channel, asks the worker for
/// a prompt and a message, and appends the message to the channel.
pub struct Component {
    name: String,
    worker: Box<dyn Worker>,
}

impl Component {
    pub fn new(name: impl Into<String>, worker: impl Worker + 'static) -> Self {
        Self {
            name: name.into(),
            worker: Box::new(worker),
        }
    }

    /// Named after the worker's default name.
    pub fn from_worker(worker: impl Worker + 'static) -> Self {
        let name = worker.default_name().to_string();
        Self::new(name, worker)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// # Postconditions
    /// - On `Ok`, exactly one message was appended to `channel`
    /// - On `Err`, the channel is untouched
    pub async fn run(
        &self,
        channel: &mut CollaborationChannel,
        memory: &WorkingMemory,
    ) -> Result<Option<ApprovalStatus>, WorkerError> {
        let output = {
            let ctx = WorkerContext {
                task: channel.task(),
                messages: channel.messages(),
                memory,
            };
            let prompt = self.worker.create_prompt(&ctx).await?;
            tracing::debug!(component = %self.name, "Prompt:\n{}", prompt);
            self.worker.act(&ctx, &prompt, &self.name).await?
        };
        tracing::debug!(component = %self.name, "Message: {}", output.message);
        channel.put(output.message);
        Ok(output.approval)
    }
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component").field("name", &self.name).finish()
    }
}

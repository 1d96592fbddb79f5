use std::fmt;
use std::sync::Arc;

use super::{ChatMessage, ChatOptions, LlmClient, Role};
use crate::tools::ToolRegistry;

/// A named model on a client, with its sampling options and the tools workers
/// may call on its behalf.
///
/// Cloning is cheap; the client and registry are shared.
#[derive(Clone)]
pub struct Model {
    client: Arc<dyn LlmClient>,
    name: String,
    options: ChatOptions,
    tools: Arc<ToolRegistry>,
    verbose: bool,
}

impl Model {
    pub fn new(client: Arc<dyn LlmClient>, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
            options: ChatOptions::default(),
            tools: Arc::new(ToolRegistry::empty()),
            verbose: false,
        }
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    /// Log every prompt and response at info instead of debug.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn has_tools(&self) -> bool {
        !self.tools.is_empty()
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Send a single user prompt and return the completion text.
    ///
    /// An empty completion is returned as an empty string; callers that need
    /// structure validate it themselves.
    pub async fn invoke(&self, prompt: &str) -> anyhow::Result<String> {
        if self.verbose {
            tracing::info!(model = %self.name, "Prompt:\n{}", prompt);
        } else {
            tracing::debug!(model = %self.name, prompt_len = prompt.len(), "Invoking model");
        }

        let messages = [ChatMessage::new(Role::User, prompt)];
        let response = self
            .client
            .chat_completion(&self.name, &messages, &self.options)
            .await?;
        let content = response.content.unwrap_or_default();

        if self.verbose {
            tracing::info!(model = %self.name, "Response:\n{}", content);
        }
        Ok(content)
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("tools", &self.tools.names())
            .finish()
    }
}

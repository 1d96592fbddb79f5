//! Scripted client for tests: replies are popped in order and every prompt is
//! recorded.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{ChatMessage, ChatOptions, ChatResponse, LlmClient, Model};

pub struct ScriptedClient {
    replies: Mutex<VecDeque<String>>,
    fallback: Option<String>,
    failure: Option<String>,
    prompts: Mutex<Vec<String>>,
    models: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new<I, S>(replies: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            fallback: None,
            failure: None,
            prompts: Mutex::new(Vec::new()),
            models: Mutex::new(Vec::new()),
        })
    }

    /// Replies from the script, then `fallback` forever.
    pub fn with_fallback<I, S>(replies: I, fallback: &str) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            fallback: Some(fallback.to_string()),
            failure: None,
            prompts: Mutex::new(Vec::new()),
            models: Mutex::new(Vec::new()),
        })
    }

    /// Every call fails with `message`.
    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: None,
            failure: Some(message.to_string()),
            prompts: Mutex::new(Vec::new()),
            models: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn models(&self) -> Vec<String> {
        self.models.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        _options: &ChatOptions,
    ) -> anyhow::Result<ChatResponse> {
        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push(prompt);
        self.models.lock().unwrap().push(model.to_string());

        if let Some(failure) = &self.failure {
            anyhow::bail!("{}", failure);
        }

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| anyhow::anyhow!("scripted client ran out of replies"))?;

        Ok(ChatResponse {
            content: Some(reply),
            finish_reason: Some("stop".to_string()),
            usage: None,
            model: Some(model.to_string()),
        })
    }
}

/// A model backed by a fresh scripted client.
pub fn scripted_model<I, S>(replies: I) -> (Model, Arc<ScriptedClient>)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let client = ScriptedClient::new(replies);
    (Model::new(client.clone(), "scripted"), client)
}

//! Task complexity routing: score a task with a router model and pick the
//! base or complex model for it.

use serde::Serialize;
use serde_json::Value;

use crate::llm::Model;
use crate::structure::{invoke_structured, ParseError, StructuredOutput};

pub const DEFAULT_COMPLEXITY_THRESHOLD: u8 = 50;

/// The first reply plus one repair.
const ROUTER_ATTEMPTS: u32 = 2;

const ROUTER_PROMPT: &str = r#"You are a task complexity analyzer. Assess the task below and assign it a
complexity score between 1 and 100. Consider:
1. Input length: how long is the input text?
2. Expected output length: how long should the response be?
3. Task type: classification, generation, summarization, and so on.
4. Domain specificity: a general topic or a specialised field?
5. Reasoning depth: how much logical reasoning is required?
6. Contextual understanding: how much background knowledge is needed?
7. Creativity level: does it need original thinking?
8. Factual knowledge: how much factual information is necessary?

Respond with a single JSON object in this format:
{
  "complexity_score": <integer between 1 and 100>,
  "explanation": "<brief explanation of the score>"
}

Example 1
Task: Classify this movie review as positive or negative: "I loved this film! The acting was superb and the plot kept me engaged throughout."
{
  "complexity_score": 15,
  "explanation": "Simple sentiment classification with short input, minimal reasoning required."
}

Example 2
Task: Summarize the key points of this 1000-word article on quantum computing.
{
  "complexity_score": 70,
  "explanation": "Long input on a specialised topic, needs good summarization and technical understanding."
}

Now analyze the following task."#;

/// The router model's verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouterScore {
    pub complexity_score: u8,
    pub explanation: String,
}

impl StructuredOutput for RouterScore {
    fn from_value(value: Value) -> Result<Self, ParseError> {
        let Value::Object(mut object) = value else {
            return Err(ParseError::Schema("expected a JSON object".to_string()));
        };
        let raw = object
            .remove("complexity_score")
            .ok_or_else(|| ParseError::Schema("missing \"complexity_score\"".to_string()))?;
        let Value::Number(number) = &raw else {
            return Err(ParseError::Schema(format!(
                "complexity_score must be a number, got {}",
                raw
            )));
        };
        let score = number
            .as_f64()
            .ok_or_else(|| ParseError::Schema(format!("complexity_score {} is not finite", raw)))?;
        if !(1.0..=100.0).contains(&score) {
            return Err(ParseError::Schema(format!(
                "complexity_score must be between 1 and 100, got {}",
                score
            )));
        }
        let score = score.trunc();
        let explanation = match object.remove("explanation") {
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => String::new(),
        };
        Ok(Self {
            complexity_score: score as u8,
            explanation,
        })
    }

    fn format_hint() -> &'static str {
        r#"{"complexity_score": <integer between 1 and 100>, "explanation": "string"}"#
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Base,
    Complex,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Complex => "complex",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingDecision {
    pub score: u8,
    pub tier: ModelTier,
}

/// Chooses between a base and a complex model by asking a router model how
/// complex a task is.
///
/// # Postconditions
/// - `route` always returns a score in `1..=100`
/// - Any failure to get a valid score, transport errors included, yields the
///   threshold itself, which selects the base model
pub struct TaskComplexityRouter {
    base: Model,
    complex: Model,
    router: Model,
    threshold: u8,
}

impl TaskComplexityRouter {
    pub fn new(base: Model, complex: Model, router: Model) -> Self {
        Self {
            base,
            complex,
            router,
            threshold: DEFAULT_COMPLEXITY_THRESHOLD,
        }
    }

    /// Clamped to `1..=100`.
    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold.clamp(1, 100);
        self
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Complexity score for `task`.
    pub async fn route(&self, task: &str) -> u8 {
        let prompt = format!("{}\n\nTask: {}", ROUTER_PROMPT, task);
        match invoke_structured::<RouterScore>(&self.router, &prompt, ROUTER_ATTEMPTS).await {
            Ok(score) => {
                tracing::debug!("Router explanation: {}", score.explanation);
                score.complexity_score
            }
            Err(e) => {
                tracing::warn!(
                    "Could not score task complexity, using threshold {}: {}",
                    self.threshold,
                    e
                );
                self.threshold
            }
        }
    }

    pub fn tier_for(&self, score: u8) -> ModelTier {
        if score > self.threshold {
            ModelTier::Complex
        } else {
            ModelTier::Base
        }
    }

    pub async fn select(&self, task: &str) -> RoutingDecision {
        let score = self.route(task).await;
        let tier = self.tier_for(score);
        tracing::info!(
            "Task complexity: {}. Use {} model.",
            score,
            tier.as_str()
        );
        RoutingDecision { score, tier }
    }

    pub fn model(&self, tier: ModelTier) -> &Model {
        match tier {
            ModelTier::Base => &self.base,
            ModelTier::Complex => &self.complex,
        }
    }

    /// The model `task` should run on.
    pub async fn model_for(&self, task: &str) -> &Model {
        let decision = self.select(task).await;
        self.model(decision.tier)
    }
}

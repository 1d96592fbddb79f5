//! Structured model output: cleaning, tolerant JSON parsing, validation and
//! the parse/repair invocation loop.

mod clean;
mod invoke;
mod response;

pub use clean::{
    clean_response, extract_json_string, parse_json_lenient, remove_system_tokens, repair_json,
    strip_tags,
};
pub use invoke::{invoke_structured, parse_structured, StructuredError, DEFAULT_MAX_ATTEMPTS};
pub use response::{
    Answer, ApprovalResponse, ApprovalStatus, StructuredResponse, ToolCallPlan, ToolCallRecord,
};

use serde_json::Value;
use thiserror::Error;

/// Why a piece of model text could not be turned into a typed response.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("no JSON object found in model output")]
    NoJson,

    #[error("invalid JSON: {0}")]
    Syntax(String),

    #[error("response does not match the expected structure: {0}")]
    Schema(String),

    #[error("confidence_score must be between 0 and 100, got {0}")]
    ConfidenceOutOfRange(f64),
}

/// A response type the model can be asked to produce as JSON.
pub trait StructuredOutput: Sized {
    /// Validate and convert a parsed JSON value.
    fn from_value(value: Value) -> Result<Self, ParseError>;

    /// JSON skeleton shown to the model, in prompts and repair prompts.
    fn format_hint() -> &'static str;
}

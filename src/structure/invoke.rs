use thiserror::Error;

use super::clean::{clean_response, parse_json_lenient};
use super::{ParseError, StructuredOutput};
use crate::llm::Model;

/// Model calls allowed per structured request, repairs included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum StructuredError {
    #[error("model invocation failed: {0:#}")]
    Model(anyhow::Error),

    #[error("failed to get a valid structured response after {attempts} attempts: {last_error}")]
    MaxAttempts { attempts: u32, last_error: ParseError },
}

/// Parse model text into `T`: clean, extract, repair, validate.
pub fn parse_structured<T: StructuredOutput>(text: &str) -> Result<T, ParseError> {
    T::from_value(parse_json_lenient(text)?)
}

/// Invoke `model` and parse its reply as `T`, asking it to repair its own
/// output when parsing or validation fails.
///
/// # Postconditions
/// - At most `max_attempts` model calls are made (at least one)
/// - A transport error ends the loop immediately with `StructuredError::Model`
pub async fn invoke_structured<T: StructuredOutput>(
    model: &Model,
    prompt: &str,
    max_attempts: u32,
) -> Result<T, StructuredError> {
    let max_attempts = max_attempts.max(1);
    let mut current_prompt = prompt.to_string();
    let mut attempt = 1;

    loop {
        let raw = model
            .invoke(&current_prompt)
            .await
            .map_err(StructuredError::Model)?;

        if model.is_verbose() {
            tracing::info!("Cleaned response: {}", clean_response(&raw));
        }

        let error = match parse_structured::<T>(&raw) {
            Ok(parsed) => return Ok(parsed),
            Err(error) => error,
        };

        if attempt >= max_attempts {
            tracing::warn!(
                model = model.name(),
                "Giving up on structured output after {} attempts: {}",
                attempt,
                error
            );
            return Err(StructuredError::MaxAttempts {
                attempts: attempt,
                last_error: error,
            });
        }

        tracing::debug!(
            model = model.name(),
            "Structured output attempt {} failed: {}",
            attempt,
            error
        );
        current_prompt = repair_prompt::<T>(prompt, &raw, &error);
        attempt += 1;
    }
}

fn repair_prompt<T: StructuredOutput>(original: &str, broken: &str, error: &ParseError) -> String {
    format!(
        "{original}\n\n\
         Your previous response could not be used.\n\
         Error: {error}\n\
         Previous response:\n{broken}\n\n\
         Reply again with only a single valid JSON object in exactly this format:\n{hint}",
        original = original,
        error = error,
        broken = broken,
        hint = T::format_hint(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::{scripted_model, ScriptedClient};
    use crate::structure::StructuredResponse;

    #[tokio::test]
    async fn test_valid_first_reply() {
        let (model, client) = scripted_model([r#"{"answer": "Paris", "confidence_score": 90}"#]);
        let response: StructuredResponse = invoke_structured(&model, "capital?", 3).await.unwrap();
        assert_eq!(response.answer.as_text(), "Paris");
        assert_eq!(client.calls(), 1);
    }

    #[test]
    fn test_markup_in_answer_round_trips() {
        let response: StructuredResponse = parse_structured(
            r#"{"question": "How do I show code?", "answer": "Wrap it in <code> tags", "confidence_score": 50}"#,
        )
        .unwrap();
        assert_eq!(response.answer.as_text(), "Wrap it in <code> tags");
        assert_eq!(response.question, "How do I show code?");
    }

    #[tokio::test]
    async fn test_out_of_range_confidence_triggers_repair() {
        let (model, client) = scripted_model([
            r#"{"answer": "Paris", "confidence_score": 101}"#,
            r#"{"answer": "Paris", "confidence_score": 99}"#,
        ]);
        let response: StructuredResponse = invoke_structured(&model, "capital?", 3).await.unwrap();

        assert_eq!(response.confidence_score, 99);
        assert_eq!(client.calls(), 2);
        let repair = &client.prompts()[1];
        assert!(repair.starts_with("capital?"));
        assert!(repair.contains("confidence_score must be between 0 and 100, got 101"));
        assert!(repair.contains(r#""confidence_score": 101"#));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let (model, client) = scripted_model(["nope", "still nope", "{broken", "unused"]);
        let err = invoke_structured::<StructuredResponse>(&model, "q", 3)
            .await
            .unwrap_err();

        assert!(matches!(err, StructuredError::MaxAttempts { attempts: 3, .. }));
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn test_model_error_is_not_retried() {
        let client = ScriptedClient::failing("connection refused");
        let model = crate::llm::Model::new(client.clone(), "m");
        let err = invoke_structured::<StructuredResponse>(&model, "q", 3)
            .await
            .unwrap_err();

        assert!(matches!(err, StructuredError::Model(_)));
        assert_eq!(client.calls(), 1);
    }
}

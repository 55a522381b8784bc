//! Model invocation: context trimming, the retry contract, and response
//! parsing.
//!
//! Two retry families share one doubling-backoff loop. Response generation
//! is bounded by cumulative backoff: once the accumulated delay plus the
//! next interval would exceed the cap, the invocation fails with
//! [`ModelError::MaxRetriesExceeded`]. Classification calls (should-respond,
//! true/false, list selection) default to retrying indefinitely — for
//! low-stakes calls the original behavior favored availability — but an
//! attempt cap can be configured.
//!
//! Empty context is rejected before any model call: an empty prompt means an
//! upstream composition bug, and the model would happily hallucinate an
//! answer to it.

use loreweave_config::{RetrySettings, TokenBudgets};
use loreweave_core::memory::Content;
use loreweave_core::model::{CompletionRequest, ModelClass, ModelClient};
use loreweave_core::ModelError;
use std::time::Duration;
use tracing::{debug, warn};

/// Rough chars-per-token ratio used for context budgeting.
const CHARS_PER_TOKEN: usize = 4;

/// How one invocation retries on transient failure.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub initial_delay_ms: u64,
    /// Cumulative backoff cap. `None` retries indefinitely.
    pub max_total_delay_ms: Option<u64>,
    /// Attempt cap. `None` leaves attempts unbounded.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Policy for user-facing response generation: bounded cumulative
    /// backoff, no attempt cap.
    pub fn generation(settings: &RetrySettings) -> Self {
        Self {
            initial_delay_ms: settings.initial_delay_ms,
            max_total_delay_ms: Some(settings.generation_backoff_cap_ms),
            max_attempts: None,
        }
    }

    /// Policy for classification calls: unbounded unless an attempt cap is
    /// configured.
    pub fn classification(settings: &RetrySettings) -> Self {
        Self {
            initial_delay_ms: settings.initial_delay_ms,
            max_total_delay_ms: None,
            max_attempts: settings.classification_max_attempts,
        }
    }
}

/// Truncate context to the token budget for its class, keeping the prefix.
///
/// Uses the chars/4 heuristic; the cut lands on a char boundary.
pub fn trim_to_token_budget(context: &str, max_tokens: usize) -> &str {
    let max_chars = max_tokens.saturating_mul(CHARS_PER_TOKEN);
    if context.len() <= max_chars {
        return context;
    }
    let mut cut = max_chars;
    while !context.is_char_boundary(cut) {
        cut -= 1;
    }
    &context[..cut]
}

/// Invoke the model under the retry policy, parsing each raw response with
/// `parse`. A parse failure counts as a retryable attempt; unsupported
/// capabilities never retry.
async fn invoke_with_retry<T>(
    model: &dyn ModelClient,
    request: CompletionRequest,
    policy: &RetryPolicy,
    parse: impl Fn(&str) -> Result<T, ModelError>,
) -> Result<T, ModelError> {
    let mut delay_ms = policy.initial_delay_ms;
    let mut waited_ms: u64 = 0;
    let mut attempts: u32 = 0;

    loop {
        let outcome = match model.complete(request.clone()).await {
            Ok(raw) => parse(&raw),
            Err(e) => Err(e),
        };

        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(e @ ModelError::NotSupported(_)) => return Err(e),
            Err(e @ ModelError::EmptyContext) => return Err(e),
            Err(e) => e,
        };

        attempts += 1;
        if let Some(max) = policy.max_attempts {
            if attempts >= max {
                warn!(attempts, error = %err, "giving up after attempt cap");
                return Err(err);
            }
        }
        if let Some(cap) = policy.max_total_delay_ms {
            if waited_ms + delay_ms > cap {
                warn!(waited_ms, error = %err, "cumulative backoff cap reached");
                return Err(ModelError::MaxRetriesExceeded { waited_ms });
            }
        }

        warn!(attempt = attempts, delay_ms, error = %err, "model invocation failed, retrying");
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        waited_ms += delay_ms;
        delay_ms *= 2;
    }
}

fn build_request(
    context: &str,
    class: ModelClass,
    budgets: &TokenBudgets,
) -> Result<CompletionRequest, ModelError> {
    if context.trim().is_empty() {
        return Err(ModelError::EmptyContext);
    }
    let trimmed = trim_to_token_budget(context, budgets.for_class(class));
    if trimmed.len() < context.len() {
        debug!(
            original = context.len(),
            kept = trimmed.len(),
            "context trimmed to token budget"
        );
    }
    Ok(CompletionRequest::new(trimmed, class))
}

/// Raw text completion under the retry policy.
pub async fn generate_text(
    model: &dyn ModelClient,
    context: &str,
    class: ModelClass,
    budgets: &TokenBudgets,
    policy: &RetryPolicy,
) -> Result<String, ModelError> {
    let request = build_request(context, class, budgets)?;
    invoke_with_retry(model, request, policy, |raw| Ok(raw.to_string())).await
}

/// Generate a user-facing message response and frame it as [`Content`].
///
/// Any raw text the model produces becomes valid content: structured JSON is
/// preferred, but an unparseable response is framed as plain text rather
/// than failing the turn. A response that declares no action gets the
/// explicit `NONE` action.
pub async fn generate_message_response(
    model: &dyn ModelClient,
    context: &str,
    budgets: &TokenBudgets,
    policy: &RetryPolicy,
) -> Result<Content, ModelError> {
    let request = build_request(context, ModelClass::Large, budgets)?;
    invoke_with_retry(model, request, policy, |raw| Ok(parse_response(raw))).await
}

/// Frame a raw model response as [`Content`] with an explicit action.
pub fn parse_response(raw: &str) -> Content {
    let mut content = match extract_json(raw) {
        Some(json) => Content::parse(&json),
        None => Content::from_text(raw.trim()),
    };
    if content.text.is_empty() {
        content.text = raw.trim().to_string();
    }
    if content.action.as_deref().map_or(true, str::is_empty) {
        content.action = Some("NONE".to_string());
    }
    content
}

/// The three-way gate decision for whether the agent replies at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShouldRespond {
    Respond,
    Ignore,
    Stop,
}

/// Reduce a classification reply to a bare uppercase token: surrounding
/// whitespace, punctuation, and brackets are stripped, interior words are
/// kept. `"[RESPOND]"` becomes `RESPOND`; `"DO NOT RESPOND"` stays
/// `DO NOT RESPOND` and matches nothing, so a hedged or negated answer is
/// retried instead of taken at face value.
fn decision_token(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_uppercase()
}

/// Classify whether the agent should reply. The model must answer with
/// exactly one of `RESPOND`, `IGNORE`, `STOP`; anything else is a parse
/// failure and retried.
pub async fn generate_should_respond(
    model: &dyn ModelClient,
    context: &str,
    budgets: &TokenBudgets,
    policy: &RetryPolicy,
) -> Result<ShouldRespond, ModelError> {
    let request = build_request(context, ModelClass::Small, budgets)?;
    invoke_with_retry(model, request, policy, |raw| {
        match decision_token(raw).as_str() {
            "RESPOND" => Ok(ShouldRespond::Respond),
            "IGNORE" => Ok(ShouldRespond::Ignore),
            "STOP" => Ok(ShouldRespond::Stop),
            _ => Err(ModelError::Parse(format!(
                "expected RESPOND/IGNORE/STOP, got: {}",
                raw.trim()
            ))),
        }
    })
    .await
}

/// Classify a yes/no question. Accepts exactly YES/TRUE and NO/FALSE.
pub async fn generate_true_false(
    model: &dyn ModelClient,
    context: &str,
    budgets: &TokenBudgets,
    policy: &RetryPolicy,
) -> Result<bool, ModelError> {
    let request = build_request(context, ModelClass::Small, budgets)?;
    invoke_with_retry(model, request, policy, |raw| {
        match decision_token(raw).as_str() {
            "TRUE" | "YES" => Ok(true),
            "FALSE" | "NO" => Ok(false),
            _ => Err(ModelError::Parse(format!(
                "expected a yes/no answer, got: {}",
                raw.trim()
            ))),
        }
    })
    .await
}

/// Ask the model for a JSON array of strings (evaluator selection and
/// similar list picks).
pub async fn generate_text_array(
    model: &dyn ModelClient,
    context: &str,
    budgets: &TokenBudgets,
    policy: &RetryPolicy,
) -> Result<Vec<String>, ModelError> {
    let request = build_request(context, ModelClass::Small, budgets)?;
    invoke_with_retry(model, request, policy, |raw| {
        let json = extract_json(raw)
            .ok_or_else(|| ModelError::Parse(format!("no JSON array in: {}", raw.trim())))?;
        serde_json::from_str::<Vec<String>>(&json)
            .map_err(|e| ModelError::Parse(format!("invalid string array: {e}")))
    })
    .await
}

/// Ask the model for an arbitrary JSON object.
pub async fn generate_object(
    model: &dyn ModelClient,
    context: &str,
    class: ModelClass,
    budgets: &TokenBudgets,
    policy: &RetryPolicy,
) -> Result<serde_json::Value, ModelError> {
    let request = build_request(context, class, budgets)?;
    invoke_with_retry(model, request, policy, |raw| {
        let json = extract_json(raw)
            .ok_or_else(|| ModelError::Parse(format!("no JSON object in: {}", raw.trim())))?;
        serde_json::from_str(&json).map_err(|e| ModelError::Parse(format!("invalid JSON: {e}")))
    })
    .await
}

/// Pull a JSON value out of a model response: a fenced code block if
/// present, otherwise the span from the first opening bracket to the last
/// matching closing one.
fn extract_json(raw: &str) -> Option<String> {
    let text = raw.trim();

    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            let fenced = after[..end].trim();
            if !fenced.is_empty() {
                return Some(fenced.to_string());
            }
        }
    }

    // Whichever bracket opens first decides the shape
    let close = match (text.find('{'), text.find('[')) {
        (Some(o), Some(a)) if a < o => ']',
        (Some(_), _) => '}',
        (None, Some(_)) => ']',
        (None, None) => return None,
    };
    let open = if close == '}' { '{' } else { '[' };
    if let (Some(start), Some(end)) = (text.find(open), text.rfind(close)) {
        if start < end {
            return Some(text[start..=end].to_string());
        }
    }
    None
}

//! Model client trait — the abstraction over language-model backends.
//!
//! The core never defines provider-specific wire formats. A `ModelClient`
//! accepts a context string plus a response-class hint and returns response
//! text; everything else (HTTP, auth, request shaping) lives outside the
//! workspace.

use crate::error::ModelError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Response-class hint for an invocation. Backends map these to concrete
/// models; the generation layer maps them to input-token budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelClass {
    /// Cheap classification calls (should-respond, evaluator selection)
    Small,
    Medium,
    /// Full user-facing response generation
    Large,
}

/// A single invocation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The assembled context text. Must be non-empty; the generation layer
    /// enforces this before the request reaches a client.
    pub context: String,

    /// Response-class hint
    pub class: ModelClass,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,

    /// Maximum tokens the backend may generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_response_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(context: impl Into<String>, class: ModelClass) -> Self {
        Self {
            context: context.into(),
            class,
            stop: Vec::new(),
            max_response_tokens: None,
        }
    }
}

/// The model-invocation seam.
///
/// The contract is "eventually resolves or raises" — cancellation mid-flight
/// is a collaborator concern, not part of this trait.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// A human-readable name for this backend.
    fn name(&self) -> &str;

    /// Invoke the model and return the raw response text.
    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelError>;

    /// Compute an embedding for the given text.
    ///
    /// Default implementation reports the capability as unsupported; memory
    /// and knowledge retrieval require a client that overrides this.
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ModelError> {
        Err(ModelError::NotSupported(format!(
            "model client '{}' does not support embeddings",
            self.name()
        )))
    }
}

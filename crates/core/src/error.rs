//! Error types for the loreweave domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.
//!
//! The taxonomy follows a strict propagation policy:
//! - configuration errors are raised immediately and never retried
//! - transient model errors are retryable by the generation layer
//! - expected-absence conditions (no memories, no matching action) are not
//!   errors at all — they surface as empty results or no-ops
//! - malformed stored data is recovered best-effort and never fatal

use thiserror::Error;

/// The top-level error type for all loreweave operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Model errors ---
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    // --- Capability errors ---
    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Error)]
pub enum MemoryError {
    /// Raised when an embedding is requested for a memory with no text.
    #[error("Cannot embed memory with empty content text")]
    EmptyContent,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),
}

#[derive(Debug, Error)]
pub enum ModelError {
    /// The generation layer refuses to invoke the model with empty context.
    #[error("Refusing to invoke model with empty context")]
    EmptyContext,

    /// A response generation exhausted its retry budget.
    #[error("Model invocation failed after {waited_ms}ms of cumulative backoff")]
    MaxRetriesExceeded { waited_ms: u64 },

    #[error("Model invocation failed: {0}")]
    Invocation(String),

    #[error("Failed to parse model response: {0}")]
    Parse(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Not supported by model client: {0}")]
    NotSupported(String),
}

#[derive(Debug, Error)]
pub enum CapabilityError {
    /// A context provider failed — surfaced, not masked (configuration bug).
    #[error("Context provider failed: {0}")]
    Provider(String),

    #[error("Handler for '{name}' failed: {reason}")]
    Handler { name: String, reason: String },

    #[error("Evaluation failed: {0}")]
    Evaluation(String),
}

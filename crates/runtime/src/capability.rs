//! Capability traits — the extension surface of the runtime.
//!
//! Three small interfaces rather than one inheritance hierarchy:
//!
//! - [`Action`]: a named, validated behavior the agent may perform in
//!   response to a message
//! - [`Evaluator`]: a named, validated post-hoc behavior run after a
//!   response to extract facts or update state
//! - [`ContextProvider`]: a source of supplementary context text injected
//!   into every composed state
//!
//! Capabilities are registered at runtime construction (directly or via
//! [`Plugin`] bundles) and are immutable afterward.

use crate::runtime::AgentRuntime;
use async_trait::async_trait;
use futures::future::BoxFuture;
use loreweave_core::memory::{Content, Memory};
use loreweave_core::state::State;
use loreweave_core::Result;
use std::sync::Arc;

/// Callback handed to action handlers for emitting response content back to
/// the platform client.
pub type HandlerCallback = Arc<dyn Fn(Content) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A named, validated behavior the agent may perform.
#[async_trait]
pub trait Action: Send + Sync {
    /// Canonical action name (e.g. `tweet_with_media`).
    fn name(&self) -> &str;

    /// Alternate names accepted during fuzzy resolution.
    fn similes(&self) -> &[String] {
        &[]
    }

    /// What this action does, described to the model.
    fn description(&self) -> &str;

    /// Example invocations, described to the model.
    fn examples(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether a handler is wired. A matched action without one is a
    /// configuration error: dispatch logs at error level and no-ops.
    fn has_handler(&self) -> bool {
        true
    }

    /// Structural gate: does this action apply to the message at all?
    async fn validate(
        &self,
        runtime: &AgentRuntime,
        message: &Memory,
        state: Option<&State>,
    ) -> Result<bool>;

    /// Execute the action.
    async fn handle(
        &self,
        runtime: &AgentRuntime,
        message: &Memory,
        state: Option<&State>,
        options: &serde_json::Value,
        callback: Option<&HandlerCallback>,
    ) -> Result<()>;
}

/// A named, validated post-hoc behavior.
#[async_trait]
pub trait Evaluator: Send + Sync {
    fn name(&self) -> &str;

    fn similes(&self) -> &[String] {
        &[]
    }

    fn description(&self) -> &str;

    fn examples(&self) -> Vec<String> {
        Vec::new()
    }

    /// Always-run evaluators are considered even when the runtime produced
    /// no response this cycle.
    fn always_run(&self) -> bool {
        false
    }

    /// Structural gate, evaluated concurrently for every registered
    /// evaluator. Passing it only makes the evaluator a candidate — the
    /// model makes the final selection by name.
    async fn validate(
        &self,
        runtime: &AgentRuntime,
        message: &Memory,
        state: Option<&State>,
    ) -> Result<bool>;

    async fn handle(
        &self,
        runtime: &AgentRuntime,
        message: &Memory,
        state: Option<&State>,
    ) -> Result<()>;
}

/// A source of supplementary context text.
///
/// Every registered provider is invoked concurrently during composition and
/// the outputs are newline-joined into one block. A provider failure is a
/// configuration bug to surface, not something to mask.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn get(
        &self,
        runtime: &AgentRuntime,
        message: &Memory,
        state: Option<&State>,
    ) -> Result<String>;
}

/// A long-lived collaborator bundled with a plugin (platform client,
/// scheduler, ...). The runtime only registers and hands these out; their
/// lifecycles are owned by the embedding application.
pub trait Service: Send + Sync {
    fn name(&self) -> &str;
}

/// A named bundle of capabilities merged into the registries at runtime
/// construction.
#[derive(Default)]
pub struct Plugin {
    pub name: String,
    pub description: String,
    pub actions: Vec<Arc<dyn Action>>,
    pub evaluators: Vec<Arc<dyn Evaluator>>,
    pub providers: Vec<Arc<dyn ContextProvider>>,
    pub services: Vec<Arc<dyn Service>>,
}

impl Plugin {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Default::default()
        }
    }
}

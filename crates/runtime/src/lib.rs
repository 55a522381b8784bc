//! # Loreweave Runtime
//!
//! The agent runtime: given an incoming message, compose a bounded world
//! state from independent data sources, decide which registered capabilities
//! apply, and invoke the model backend under an explicit retry contract.
//!
//! Entry points live on [`AgentRuntime`]:
//! - [`AgentRuntime::compose_state`] — the state composition pipeline
//! - [`AgentRuntime::update_recent_message_state`] — cheap tail refresh
//! - [`AgentRuntime::process_actions`] — fuzzy-matched action dispatch
//! - [`AgentRuntime::evaluate`] — two-phase evaluator gate

pub mod capability;
pub mod format;
pub mod generation;
pub mod persona;
pub mod registry;
pub mod runtime;

pub use capability::{Action, ContextProvider, Evaluator, HandlerCallback, Plugin, Service};
pub use generation::{RetryPolicy, ShouldRespond};
pub use runtime::AgentRuntime;

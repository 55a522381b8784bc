//! # Loreweave Core
//!
//! Domain types, traits, and error definitions for the loreweave agent
//! runtime. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is defined as a trait here: the storage
//! adapter, the cache adapter, and the model client. Implementations live in
//! their respective crates (or outside the workspace entirely). This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod actor;
pub mod adapter;
pub mod character;
pub mod error;
pub mod goal;
pub mod memory;
pub mod model;
pub mod state;
pub mod template;

// Re-export key types at crate root for ergonomics
pub use actor::{Account, Actor, ActorDetails, Relationship, Room};
pub use adapter::{CacheAdapter, DatabaseAdapter};
pub use character::{Character, ExampleContent, ExampleMessage, Style};
pub use error::{CapabilityError, Error, MemoryError, ModelError, Result};
pub use goal::{GetGoalsParams, Goal, GoalStatus, Objective};
pub use memory::{Content, GetMemoriesParams, Media, Memory, SearchParams};
pub use model::{CompletionRequest, ModelClass, ModelClient};
pub use state::State;

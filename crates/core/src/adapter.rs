//! Storage and cache adapter traits — the seams to external collaborators.
//!
//! The core never talks to a concrete database. Everything is keyed by
//! opaque identifiers with at-least request-response semantics and no
//! transactional guarantee across calls. Implementations live outside this
//! workspace; `loreweave-memory` ships an in-memory adapter for tests and
//! ephemeral sessions.

use crate::actor::{Account, Relationship, Room};
use crate::error::MemoryError;
use crate::goal::{GetGoalsParams, Goal};
use crate::memory::{GetMemoriesParams, Memory, SearchParams};
use async_trait::async_trait;
use uuid::Uuid;

/// The storage adapter consumed by the memory subsystem and the runtime.
///
/// All memory operations are scoped by `table` — the per-category namespace
/// (messages, descriptions, knowledge, ...).
#[async_trait]
pub trait DatabaseAdapter: Send + Sync {
    // --- Memories ---
    async fn get_memories(
        &self,
        table: &str,
        params: &GetMemoriesParams,
    ) -> Result<Vec<Memory>, MemoryError>;

    /// Fetch memories across several rooms at once, optionally restricted to
    /// one agent. Used for cross-room interaction history.
    async fn get_memories_by_rooms(
        &self,
        table: &str,
        room_ids: &[Uuid],
        agent_id: Option<Uuid>,
    ) -> Result<Vec<Memory>, MemoryError>;

    async fn get_memory_by_id(&self, table: &str, id: Uuid)
        -> Result<Option<Memory>, MemoryError>;

    async fn create_memory(
        &self,
        table: &str,
        memory: &Memory,
        unique: bool,
    ) -> Result<(), MemoryError>;

    async fn remove_memory(&self, table: &str, id: Uuid) -> Result<(), MemoryError>;

    async fn remove_all_memories(&self, table: &str, room_id: Uuid) -> Result<(), MemoryError>;

    async fn count_memories(
        &self,
        table: &str,
        room_id: Uuid,
        unique: bool,
    ) -> Result<usize, MemoryError>;

    /// Similarity search. The adapter owns the vector math; the core only
    /// defines the contract and defaults.
    async fn search_memories_by_embedding(
        &self,
        table: &str,
        embedding: &[f32],
        params: &SearchParams,
    ) -> Result<Vec<Memory>, MemoryError>;

    /// Look up a previously computed embedding for identical input text.
    async fn get_cached_embeddings(&self, text: &str) -> Result<Option<Vec<f32>>, MemoryError>;

    // --- Goals ---
    async fn get_goals(&self, params: &GetGoalsParams) -> Result<Vec<Goal>, MemoryError>;
    async fn create_goal(&self, goal: &Goal) -> Result<(), MemoryError>;
    async fn update_goal(&self, goal: &Goal) -> Result<(), MemoryError>;
    async fn remove_goal(&self, id: Uuid) -> Result<(), MemoryError>;
    async fn remove_all_goals(&self, room_id: Uuid) -> Result<(), MemoryError>;

    // --- Rooms & participants ---
    async fn get_room(&self, id: Uuid) -> Result<Option<Room>, MemoryError>;
    async fn create_room(&self, id: Uuid) -> Result<(), MemoryError>;
    async fn remove_room(&self, id: Uuid) -> Result<(), MemoryError>;
    async fn get_participants_for_room(&self, room_id: Uuid) -> Result<Vec<Uuid>, MemoryError>;
    async fn add_participant(&self, user_id: Uuid, room_id: Uuid) -> Result<(), MemoryError>;
    async fn remove_participant(&self, user_id: Uuid, room_id: Uuid) -> Result<(), MemoryError>;

    /// Rooms where every one of `user_ids` participates.
    async fn get_rooms_for_participants(&self, user_ids: &[Uuid])
        -> Result<Vec<Uuid>, MemoryError>;

    // --- Accounts & relationships ---
    async fn get_account_by_id(&self, id: Uuid) -> Result<Option<Account>, MemoryError>;
    async fn create_account(&self, account: &Account) -> Result<(), MemoryError>;
    async fn create_relationship(&self, user_a: Uuid, user_b: Uuid) -> Result<(), MemoryError>;
    async fn get_relationships(&self, user_id: Uuid) -> Result<Vec<Relationship>, MemoryError>;
}

/// A raw string key-value cache.
///
/// Best-effort only: a miss (or a silently failing set) triggers
/// recomputation, never an error. Expiry semantics are layered on top by
/// `loreweave-memory::cache`.
#[async_trait]
pub trait CacheAdapter: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: &str);
    async fn delete(&self, key: &str);
}

//! Memory subsystem — typed, per-category access to persisted records.
//!
//! A [`MemoryManager`] wraps the storage adapter for one table (category)
//! of memories: messages, descriptions, knowledge, and so on. It owns the
//! embedding-attachment path (with cached-embedding lookup), idempotent
//! creation, and the read-degradation policy:
//!
//! - read failures degrade to empty results (context gets thinner, the
//!   interaction continues)
//! - write and delete failures propagate (a failed memory write is a real
//!   integrity event)

pub mod cache;
pub mod in_memory;
pub mod vector;

pub use cache::ExpiringCache;
pub use in_memory::{InMemoryAdapter, InMemoryCache};

use loreweave_core::adapter::DatabaseAdapter;
use loreweave_core::error::MemoryError;
use loreweave_core::memory::{GetMemoriesParams, Memory, SearchParams};
use loreweave_core::model::ModelClient;
use loreweave_core::Result;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Typed access to one category of memories.
pub struct MemoryManager {
    table: String,
    agent_id: Uuid,
    db: Arc<dyn DatabaseAdapter>,
    model: Arc<dyn ModelClient>,
}

impl MemoryManager {
    pub fn new(
        table: impl Into<String>,
        agent_id: Uuid,
        db: Arc<dyn DatabaseAdapter>,
        model: Arc<dyn ModelClient>,
    ) -> Self {
        Self {
            table: table.into(),
            agent_id,
            db,
            model,
        }
    }

    /// The category (table name) this manager serves.
    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn agent_id(&self) -> Uuid {
        self.agent_id
    }

    /// Attach an embedding to a memory, computing one if absent.
    ///
    /// Idempotent per memory instance: an existing embedding is returned
    /// unchanged. A previously cached embedding for identical text is reused
    /// before the model client is consulted.
    pub async fn add_embedding(&self, mut memory: Memory) -> Result<Memory> {
        if memory.embedding.is_some() {
            return Ok(memory);
        }

        let text = memory.content.text.trim().to_string();
        if text.is_empty() {
            return Err(MemoryError::EmptyContent.into());
        }

        match self.db.get_cached_embeddings(&text).await {
            Ok(Some(cached)) => {
                debug!(table = %self.table, "reusing cached embedding");
                memory.embedding = Some(cached);
                return Ok(memory);
            }
            Ok(None) => {}
            // Cache lookup is an optimization, never a correctness dependency
            Err(e) => debug!(table = %self.table, error = %e, "embedding cache lookup failed"),
        }

        let embedding = self.model.embed(&text).await?;
        memory.embedding = Some(embedding);
        Ok(memory)
    }

    /// Fetch memories for a room, newest first.
    ///
    /// Never raises: a read failure degrades to an empty sequence with a
    /// warning, since missing context should thin the prompt rather than
    /// abort the interaction.
    pub async fn get_memories(&self, params: &GetMemoriesParams) -> Vec<Memory> {
        match self.db.get_memories(&self.table, params).await {
            Ok(memories) => memories,
            Err(e) => {
                warn!(table = %self.table, room_id = %params.room_id, error = %e,
                      "memory read failed, degrading to empty context");
                Vec::new()
            }
        }
    }

    /// Fetch a single memory by id. Degrades to `None` on failure.
    pub async fn get_by_id(&self, id: Uuid) -> Option<Memory> {
        match self.db.get_memory_by_id(&self.table, id).await {
            Ok(found) => found,
            Err(e) => {
                warn!(table = %self.table, %id, error = %e, "memory lookup failed");
                None
            }
        }
    }

    /// Similarity search, delegated to the storage adapter.
    ///
    /// Scoped to this manager's agent unless the caller names one
    /// explicitly — a shared store must not surface another agent's
    /// records. Unlike plain reads this propagates failure — callers decide
    /// whether a missing search path is recoverable (for knowledge
    /// retrieval it is a configuration failure, not a runtime condition).
    pub async fn search_by_embedding(
        &self,
        embedding: &[f32],
        params: &SearchParams,
    ) -> Result<Vec<Memory>> {
        let mut params = params.clone();
        params.agent_id.get_or_insert(self.agent_id);
        let hits = self
            .db
            .search_memories_by_embedding(&self.table, embedding, &params)
            .await?;
        Ok(hits)
    }

    /// Persist a memory, skipping silently if the id already exists.
    ///
    /// The idempotency check protects against duplicate ingestion from
    /// retried upstream calls. Write failures propagate.
    pub async fn create_memory(&self, memory: &Memory, unique: bool) -> Result<()> {
        if let Some(_existing) = self.db.get_memory_by_id(&self.table, memory.id).await? {
            debug!(table = %self.table, id = %memory.id, "memory already exists, skipping create");
            return Ok(());
        }
        self.db.create_memory(&self.table, memory, unique).await?;
        Ok(())
    }

    /// Remove a single memory. Failures propagate.
    pub async fn remove(&self, id: Uuid) -> Result<()> {
        self.db.remove_memory(&self.table, id).await?;
        Ok(())
    }

    /// Room-scoped bulk delete. Failures propagate.
    pub async fn remove_all(&self, room_id: Uuid) -> Result<()> {
        self.db.remove_all_memories(&self.table, room_id).await?;
        Ok(())
    }

    /// Count memories in a room.
    pub async fn count(&self, room_id: Uuid, unique: bool) -> Result<usize> {
        let n = self.db.count_memories(&self.table, room_id, unique).await?;
        Ok(n)
    }
}

//! In-memory adapters — useful for testing and ephemeral sessions.
//!
//! [`InMemoryAdapter`] implements the full storage contract over
//! `RwLock`-guarded collections; [`InMemoryCache`] is the matching raw
//! key-value cache.

use crate::vector::rank_by_similarity;
use async_trait::async_trait;
use chrono::Utc;
use loreweave_core::actor::{Account, Relationship, Room};
use loreweave_core::adapter::{CacheAdapter, DatabaseAdapter};
use loreweave_core::error::MemoryError;
use loreweave_core::goal::{GetGoalsParams, Goal, GoalStatus};
use loreweave_core::memory::{GetMemoriesParams, Memory, SearchParams};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// An in-memory storage adapter backed by locked collections.
#[derive(Default)]
pub struct InMemoryAdapter {
    memories: RwLock<HashMap<String, Vec<Memory>>>,
    goals: RwLock<Vec<Goal>>,
    rooms: RwLock<HashMap<Uuid, Room>>,
    participants: RwLock<HashMap<Uuid, Vec<Uuid>>>,
    accounts: RwLock<HashMap<Uuid, Account>>,
    relationships: RwLock<Vec<Relationship>>,
    embedding_cache: RwLock<HashMap<String, Vec<f32>>>,
}

impl InMemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DatabaseAdapter for InMemoryAdapter {
    async fn get_memories(
        &self,
        table: &str,
        params: &GetMemoriesParams,
    ) -> Result<Vec<Memory>, MemoryError> {
        let memories = self.memories.read().await;
        let mut found: Vec<Memory> = memories
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|m| m.room_id == params.room_id)
                    .filter(|m| !params.unique || m.unique)
                    .filter(|m| params.start.map_or(true, |s| m.created_at >= s))
                    .filter(|m| params.end.map_or(true, |e| m.created_at < e))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(count) = params.count {
            found.truncate(count);
        }
        Ok(found)
    }

    async fn get_memories_by_rooms(
        &self,
        table: &str,
        room_ids: &[Uuid],
        agent_id: Option<Uuid>,
    ) -> Result<Vec<Memory>, MemoryError> {
        let memories = self.memories.read().await;
        let mut found: Vec<Memory> = memories
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|m| room_ids.contains(&m.room_id))
                    .filter(|m| agent_id.map_or(true, |a| m.agent_id == a))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn get_memory_by_id(
        &self,
        table: &str,
        id: Uuid,
    ) -> Result<Option<Memory>, MemoryError> {
        let memories = self.memories.read().await;
        Ok(memories
            .get(table)
            .and_then(|rows| rows.iter().find(|m| m.id == id).cloned()))
    }

    async fn create_memory(
        &self,
        table: &str,
        memory: &Memory,
        unique: bool,
    ) -> Result<(), MemoryError> {
        let mut memories = self.memories.write().await;
        let rows = memories.entry(table.to_string()).or_default();

        if unique {
            let duplicate = rows
                .iter()
                .any(|m| m.room_id == memory.room_id && m.content.text == memory.content.text);
            if duplicate {
                debug!(table, id = %memory.id, "identical content already stored, skipping");
                return Ok(());
            }
        }

        let mut stored = memory.clone();
        stored.unique = unique;
        if let Some(embedding) = &stored.embedding {
            self.embedding_cache
                .write()
                .await
                .insert(stored.content.text.trim().to_string(), embedding.clone());
        }
        rows.push(stored);
        Ok(())
    }

    async fn remove_memory(&self, table: &str, id: Uuid) -> Result<(), MemoryError> {
        let mut memories = self.memories.write().await;
        if let Some(rows) = memories.get_mut(table) {
            rows.retain(|m| m.id != id);
        }
        Ok(())
    }

    async fn remove_all_memories(&self, table: &str, room_id: Uuid) -> Result<(), MemoryError> {
        let mut memories = self.memories.write().await;
        if let Some(rows) = memories.get_mut(table) {
            rows.retain(|m| m.room_id != room_id);
        }
        Ok(())
    }

    async fn count_memories(
        &self,
        table: &str,
        room_id: Uuid,
        unique: bool,
    ) -> Result<usize, MemoryError> {
        let memories = self.memories.read().await;
        Ok(memories
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|m| m.room_id == room_id && (!unique || m.unique))
                    .count()
            })
            .unwrap_or(0))
    }

    async fn search_memories_by_embedding(
        &self,
        table: &str,
        embedding: &[f32],
        params: &SearchParams,
    ) -> Result<Vec<Memory>, MemoryError> {
        let memories = self.memories.read().await;
        let candidates: Vec<Memory> = memories
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|m| params.room_id.map_or(true, |r| m.room_id == r))
                    .filter(|m| params.agent_id.map_or(true, |a| m.agent_id == a))
                    .filter(|m| !params.unique || m.unique)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(rank_by_similarity(
            &candidates,
            embedding,
            params.match_threshold,
            params.count,
        ))
    }

    async fn get_cached_embeddings(&self, text: &str) -> Result<Option<Vec<f32>>, MemoryError> {
        Ok(self.embedding_cache.read().await.get(text.trim()).cloned())
    }

    async fn get_goals(&self, params: &GetGoalsParams) -> Result<Vec<Goal>, MemoryError> {
        let goals = self.goals.read().await;
        let mut found: Vec<Goal> = goals
            .iter()
            .filter(|g| g.room_id == params.room_id)
            .filter(|g| params.user_id.map_or(true, |u| g.user_id == u))
            .filter(|g| !params.only_in_progress || g.status == GoalStatus::InProgress)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(count) = params.count {
            found.truncate(count);
        }
        Ok(found)
    }

    async fn create_goal(&self, goal: &Goal) -> Result<(), MemoryError> {
        self.goals.write().await.push(goal.clone());
        Ok(())
    }

    async fn update_goal(&self, goal: &Goal) -> Result<(), MemoryError> {
        let mut goals = self.goals.write().await;
        match goals.iter_mut().find(|g| g.id == goal.id) {
            Some(existing) => {
                *existing = goal.clone();
                Ok(())
            }
            None => Err(MemoryError::QueryFailed(format!(
                "goal {} not found",
                goal.id
            ))),
        }
    }

    async fn remove_goal(&self, id: Uuid) -> Result<(), MemoryError> {
        self.goals.write().await.retain(|g| g.id != id);
        Ok(())
    }

    async fn remove_all_goals(&self, room_id: Uuid) -> Result<(), MemoryError> {
        self.goals.write().await.retain(|g| g.room_id != room_id);
        Ok(())
    }

    async fn get_room(&self, id: Uuid) -> Result<Option<Room>, MemoryError> {
        Ok(self.rooms.read().await.get(&id).cloned())
    }

    async fn create_room(&self, id: Uuid) -> Result<(), MemoryError> {
        self.rooms.write().await.entry(id).or_insert(Room {
            id,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn remove_room(&self, id: Uuid) -> Result<(), MemoryError> {
        self.rooms.write().await.remove(&id);
        self.participants.write().await.remove(&id);
        Ok(())
    }

    async fn get_participants_for_room(&self, room_id: Uuid) -> Result<Vec<Uuid>, MemoryError> {
        Ok(self
            .participants
            .read()
            .await
            .get(&room_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_participant(&self, user_id: Uuid, room_id: Uuid) -> Result<(), MemoryError> {
        let mut participants = self.participants.write().await;
        let room = participants.entry(room_id).or_default();
        if !room.contains(&user_id) {
            room.push(user_id);
        }
        Ok(())
    }

    async fn remove_participant(&self, user_id: Uuid, room_id: Uuid) -> Result<(), MemoryError> {
        if let Some(room) = self.participants.write().await.get_mut(&room_id) {
            room.retain(|u| *u != user_id);
        }
        Ok(())
    }

    async fn get_rooms_for_participants(
        &self,
        user_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, MemoryError> {
        let participants = self.participants.read().await;
        Ok(participants
            .iter()
            .filter(|(_, members)| user_ids.iter().all(|u| members.contains(u)))
            .map(|(room_id, _)| *room_id)
            .collect())
    }

    async fn get_account_by_id(&self, id: Uuid) -> Result<Option<Account>, MemoryError> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }

    async fn create_account(&self, account: &Account) -> Result<(), MemoryError> {
        self.accounts
            .write()
            .await
            .entry(account.id)
            .or_insert_with(|| account.clone());
        Ok(())
    }

    async fn create_relationship(&self, user_a: Uuid, user_b: Uuid) -> Result<(), MemoryError> {
        self.relationships.write().await.push(Relationship {
            id: Uuid::new_v4(),
            user_a,
            user_b,
            user_id: user_a,
            status: "FRIENDS".into(),
        });
        Ok(())
    }

    async fn get_relationships(&self, user_id: Uuid) -> Result<Vec<Relationship>, MemoryError> {
        Ok(self
            .relationships
            .read()
            .await
            .iter()
            .filter(|r| r.user_a == user_id || r.user_b == user_id)
            .cloned()
            .collect())
    }
}

/// An in-memory raw key-value cache.
#[derive(Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheAdapter for InMemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        self.entries.read().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: &str) {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
    }

    async fn delete(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loreweave_core::memory::Content;

    fn memory(room_id: Uuid, text: &str, embedding: Option<Vec<f32>>) -> Memory {
        let mut m = Memory::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            room_id,
            Content::from_text(text),
        );
        m.embedding = embedding;
        m
    }

    #[tokio::test]
    async fn tables_are_isolated() {
        let db = InMemoryAdapter::new();
        let room = Uuid::new_v4();
        db.create_memory("messages", &memory(room, "a message", None), false)
            .await
            .unwrap();
        db.create_memory("knowledge", &memory(room, "a fact", None), false)
            .await
            .unwrap();

        assert_eq!(db.count_memories("messages", room, false).await.unwrap(), 1);
        assert_eq!(db.count_memories("knowledge", room, false).await.unwrap(), 1);
        let messages = db
            .get_memories("messages", &GetMemoriesParams::room(room))
            .await
            .unwrap();
        assert_eq!(messages[0].content.text, "a message");
    }

    #[tokio::test]
    async fn unique_create_skips_identical_text_in_room() {
        let db = InMemoryAdapter::new();
        let room = Uuid::new_v4();
        db.create_memory("facts", &memory(room, "the sky is blue", None), true)
            .await
            .unwrap();
        db.create_memory("facts", &memory(room, "the sky is blue", None), true)
            .await
            .unwrap();
        assert_eq!(db.count_memories("facts", room, true).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn embedding_search_honors_room_scope() {
        let db = InMemoryAdapter::new();
        let room_a = Uuid::new_v4();
        let room_b = Uuid::new_v4();
        db.create_memory("facts", &memory(room_a, "in scope", Some(vec![1.0, 0.0])), false)
            .await
            .unwrap();
        db.create_memory("facts", &memory(room_b, "out of scope", Some(vec![1.0, 0.0])), false)
            .await
            .unwrap();

        let params = SearchParams {
            room_id: Some(room_a),
            ..Default::default()
        };
        let hits = db
            .search_memories_by_embedding("facts", &[1.0, 0.0], &params)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content.text, "in scope");
    }

    #[tokio::test]
    async fn embedding_search_honors_agent_scope() {
        let db = InMemoryAdapter::new();
        let room = Uuid::new_v4();
        let agent_a = Uuid::new_v4();

        let mut mine = memory(room, "mine", Some(vec![1.0, 0.0]));
        mine.agent_id = agent_a;
        db.create_memory("facts", &mine, false).await.unwrap();
        db.create_memory("facts", &memory(room, "someone else's", Some(vec![1.0, 0.0])), false)
            .await
            .unwrap();

        let params = SearchParams {
            agent_id: Some(agent_a),
            ..Default::default()
        };
        let hits = db
            .search_memories_by_embedding("facts", &[1.0, 0.0], &params)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content.text, "mine");
    }

    #[tokio::test]
    async fn goals_return_newest_first() {
        let db = InMemoryAdapter::new();
        let room = Uuid::new_v4();
        let user = Uuid::new_v4();

        for (i, name) in ["oldest", "middle", "newest"].iter().enumerate() {
            let goal = Goal {
                id: Uuid::new_v4(),
                room_id: room,
                user_id: user,
                name: (*name).into(),
                status: GoalStatus::InProgress,
                created_at: Utc::now() + chrono::Duration::seconds(i as i64),
                objectives: vec![],
            };
            db.create_goal(&goal).await.unwrap();
        }

        let found = db
            .get_goals(&GetGoalsParams {
                room_id: room,
                user_id: None,
                only_in_progress: false,
                count: Some(2),
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "newest");
        assert_eq!(found[1].name, "middle");
    }

    #[tokio::test]
    async fn rooms_for_participants_requires_all_members() {
        let db = InMemoryAdapter::new();
        let (alice, bob, carol) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let shared = Uuid::new_v4();
        let solo = Uuid::new_v4();

        db.create_room(shared).await.unwrap();
        db.create_room(solo).await.unwrap();
        db.add_participant(alice, shared).await.unwrap();
        db.add_participant(bob, shared).await.unwrap();
        db.add_participant(alice, solo).await.unwrap();
        db.add_participant(carol, solo).await.unwrap();

        let rooms = db.get_rooms_for_participants(&[alice, bob]).await.unwrap();
        assert_eq!(rooms, vec![shared]);
    }

    #[tokio::test]
    async fn update_missing_goal_is_an_error() {
        let db = InMemoryAdapter::new();
        let goal = Goal {
            id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "ghost".into(),
            status: GoalStatus::Pending,
            created_at: Utc::now(),
            objectives: vec![],
        };
        let err = db.update_goal(&goal).await.unwrap_err();
        assert!(matches!(err, MemoryError::QueryFailed(_)));
    }

    #[tokio::test]
    async fn account_create_is_idempotent() {
        let db = InMemoryAdapter::new();
        let id = Uuid::new_v4();
        let account = Account {
            id,
            name: "Ada".into(),
            username: "ada".into(),
            email: None,
            details: Default::default(),
        };
        db.create_account(&account).await.unwrap();
        let mut renamed = account.clone();
        renamed.name = "Not Ada".into();
        db.create_account(&renamed).await.unwrap();

        let stored = db.get_account_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Ada");
    }
}

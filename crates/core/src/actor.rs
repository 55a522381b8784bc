//! Actor, account, room, and relationship read models.
//!
//! Actors are a derived view over room participants — the runtime builds
//! them from accounts at composition time and never persists them itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Short descriptive details attached to an account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActorDetails {
    #[serde(default)]
    pub tagline: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub quote: String,
}

/// A participant in a room, as seen by the composition pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub details: ActorDetails,
}

/// A persisted user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub details: ActorDetails,
}

impl Account {
    /// View this account as an actor.
    pub fn as_actor(&self) -> Actor {
        Actor {
            id: self.id,
            name: self.name.clone(),
            username: self.username.clone(),
            details: self.details.clone(),
        }
    }
}

/// A conversation scope containing participants and exchanged memories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A persisted connection between two users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub id: Uuid,
    pub user_a: Uuid,
    pub user_b: Uuid,
    /// The user who initiated the relationship
    pub user_id: Uuid,
    #[serde(default)]
    pub status: String,
}

//! Goal and objective types.
//!
//! Goals are created and updated by application logic outside the core; the
//! runtime only reads them and formats them into context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GoalStatus {
    Pending,
    InProgress,
    Done,
    Failed,
}

/// A sub-task of a goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Objective {
    pub description: String,
    #[serde(default)]
    pub completed: bool,
}

/// A tracked intent with sub-tasks, used to bias agent behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub room_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub status: GoalStatus,
    /// When the goal was created; reads return newest first
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub objectives: Vec<Objective>,
}

/// Parameters for reading goals from the storage adapter.
#[derive(Debug, Clone)]
pub struct GetGoalsParams {
    pub room_id: Uuid,
    /// Restrict to goals owned by this user
    pub user_id: Option<Uuid>,
    /// When false, completed goals are included as well
    pub only_in_progress: bool,
    pub count: Option<usize>,
}

//! The ephemeral, per-message `State` value object.
//!
//! A `State` is fully reconstructed for every handled message — it is never
//! partially mutated across messages. Everything in it is derivable from the
//! incoming message plus persisted data; the only non-determinism is the
//! intentional persona sampling. Callers may thread a state forward and
//! refresh only its conversational tail via the runtime's
//! `update_recent_message_state`.

use crate::actor::Actor;
use crate::goal::Goal;
use crate::memory::Memory;
use std::collections::HashMap;
use uuid::Uuid;

/// The composed context for one generation cycle.
///
/// Formatted string fields are ready for template substitution; the `*_data`
/// fields carry the raw backing arrays for consumers that need structured
/// access.
#[derive(Debug, Clone)]
pub struct State {
    pub agent_id: Uuid,
    pub agent_name: String,
    pub room_id: Uuid,

    // Persona material (sampled per composition)
    pub bio: String,
    pub lore: String,
    pub topics: String,
    pub adjective: String,
    pub message_directions: String,
    pub post_directions: String,
    pub message_examples: String,
    pub post_examples: String,

    // Formatted context blocks
    pub actors: String,
    pub goals: String,
    pub recent_messages: String,
    pub attachments: String,
    pub knowledge: String,
    pub recent_interactions: String,
    pub recent_posts: String,

    // Raw backing arrays
    pub actors_data: Vec<Actor>,
    pub goals_data: Vec<Goal>,
    pub recent_messages_data: Vec<Memory>,

    // Capability summaries
    pub action_names: String,
    pub actions: String,
    pub action_examples: String,
    pub evaluator_names: String,
    pub evaluators: String,
    pub evaluator_examples: String,

    // Concatenated context-provider output
    pub providers: String,

    // Caller-supplied fields, merged last
    pub extra: HashMap<String, String>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            agent_id: Uuid::nil(),
            agent_name: String::new(),
            room_id: Uuid::nil(),
            bio: String::new(),
            lore: String::new(),
            topics: String::new(),
            adjective: String::new(),
            message_directions: String::new(),
            post_directions: String::new(),
            message_examples: String::new(),
            post_examples: String::new(),
            actors: String::new(),
            goals: String::new(),
            recent_messages: String::new(),
            attachments: String::new(),
            knowledge: String::new(),
            recent_interactions: String::new(),
            recent_posts: String::new(),
            actors_data: Vec::new(),
            goals_data: Vec::new(),
            recent_messages_data: Vec::new(),
            action_names: String::new(),
            actions: String::new(),
            action_examples: String::new(),
            evaluator_names: String::new(),
            evaluators: String::new(),
            evaluator_examples: String::new(),
            providers: String::new(),
            extra: HashMap::new(),
        }
    }
}

impl State {
    /// Flatten this state into the template variable map.
    ///
    /// Caller-supplied `extra` fields are merged last but cannot shadow the
    /// named fields — the field set is disjoint by construction, and named
    /// fields win on collision.
    pub fn template_values(&self) -> HashMap<String, String> {
        let mut values: HashMap<String, String> = self.extra.clone();
        values.insert("agentId".into(), self.agent_id.to_string());
        values.insert("agentName".into(), self.agent_name.clone());
        values.insert("roomId".into(), self.room_id.to_string());
        values.insert("bio".into(), self.bio.clone());
        values.insert("lore".into(), self.lore.clone());
        values.insert("topics".into(), self.topics.clone());
        values.insert("adjective".into(), self.adjective.clone());
        values.insert("messageDirections".into(), self.message_directions.clone());
        values.insert("postDirections".into(), self.post_directions.clone());
        values.insert("messageExamples".into(), self.message_examples.clone());
        values.insert("postExamples".into(), self.post_examples.clone());
        values.insert("actors".into(), self.actors.clone());
        values.insert("goals".into(), self.goals.clone());
        values.insert("recentMessages".into(), self.recent_messages.clone());
        values.insert("attachments".into(), self.attachments.clone());
        values.insert("knowledge".into(), self.knowledge.clone());
        values.insert("recentInteractions".into(), self.recent_interactions.clone());
        values.insert("recentPosts".into(), self.recent_posts.clone());
        values.insert("actionNames".into(), self.action_names.clone());
        values.insert("actions".into(), self.actions.clone());
        values.insert("actionExamples".into(), self.action_examples.clone());
        values.insert("evaluatorNames".into(), self.evaluator_names.clone());
        values.insert("evaluators".into(), self.evaluators.clone());
        values.insert("evaluatorExamples".into(), self.evaluator_examples.clone());
        values.insert("providers".into(), self.providers.clone());
        values
    }
}

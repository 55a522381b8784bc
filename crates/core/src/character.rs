//! Character — static persona configuration.
//!
//! Loaded once per runtime instance and treated as read-only afterward. The
//! composition pipeline samples bounded random subsets of bio/lore/topics/
//! adjectives and canned examples from it on every turn, which is what gives
//! one static persona prompt variety across turns.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Static persona configuration for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    /// Display name of the agent
    pub name: String,

    /// Biography lines, sampled per turn
    #[serde(default)]
    pub bio: Vec<String>,

    /// Background lore lines, sampled per turn
    #[serde(default)]
    pub lore: Vec<String>,

    /// Topics the agent gravitates toward
    #[serde(default)]
    pub topics: Vec<String>,

    /// Adjectives describing the agent's voice
    #[serde(default)]
    pub adjectives: Vec<String>,

    /// Style directions by context
    #[serde(default)]
    pub style: Style,

    /// Canned multi-turn conversation examples. Participant slots use
    /// `{{user1}}`, `{{user2}}`, ... placeholders substituted with
    /// pseudo-random names at composition time.
    #[serde(default)]
    pub message_examples: Vec<Vec<ExampleMessage>>,

    /// Canned standalone post examples
    #[serde(default)]
    pub post_examples: Vec<String>,

    /// Prompt template overrides, keyed by template name
    #[serde(default)]
    pub templates: HashMap<String, String>,

    /// Which model backend this character prefers
    #[serde(default)]
    pub model_provider: Option<String>,

    /// Free-form character settings (keys surfaced via the runtime)
    #[serde(default)]
    pub settings: HashMap<String, String>,
}

/// Style directions applied by conversational context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Style {
    /// Applied everywhere
    #[serde(default)]
    pub all: Vec<String>,
    /// Applied to chat replies
    #[serde(default)]
    pub chat: Vec<String>,
    /// Applied to standalone posts
    #[serde(default)]
    pub post: Vec<String>,
}

/// One turn of a canned example conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleMessage {
    /// Speaker slot — either the character's own name or a `{{userN}}`
    /// placeholder
    pub user: String,
    /// What was said (text plus optional action tag)
    pub content: ExampleContent,
}

/// Content of an example turn. Narrower than [`crate::Content`] on purpose:
/// examples are authored by hand and carry no storage metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleContent {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl Character {
    /// Minimal character with just a name. Used heavily in tests.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bio: Vec::new(),
            lore: Vec::new(),
            topics: Vec::new(),
            adjectives: Vec::new(),
            style: Style::default(),
            message_examples: Vec::new(),
            post_examples: Vec::new(),
            templates: HashMap::new(),
            model_provider: None,
            settings: HashMap::new(),
        }
    }

    /// Look up a character setting.
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn character_deserializes_with_defaults() {
        let character: Character = serde_json::from_str(r#"{"name": "Echo"}"#).unwrap();
        assert_eq!(character.name, "Echo");
        assert!(character.bio.is_empty());
        assert!(character.style.all.is_empty());
        assert!(character.model_provider.is_none());
    }

    #[test]
    fn example_messages_parse() {
        let character: Character = serde_json::from_str(
            r#"{
                "name": "Echo",
                "message_examples": [[
                    {"user": "{{user1}}", "content": {"text": "hi there"}},
                    {"user": "Echo", "content": {"text": "hello", "action": "WAVE"}}
                ]]
            }"#,
        )
        .unwrap();
        assert_eq!(character.message_examples.len(), 1);
        assert_eq!(character.message_examples[0][1].content.action.as_deref(), Some("WAVE"));
    }

    #[test]
    fn settings_lookup() {
        let mut character = Character::named("Echo");
        character.settings.insert("voice".into(), "deadpan".into());
        assert_eq!(character.setting("voice"), Some("deadpan"));
        assert_eq!(character.setting("missing"), None);
    }
}

//! Persona sampling — bounded random subsets of character material.
//!
//! The sampling is the one intentional source of non-determinism in state
//! composition: a static character still produces varied prompts across
//! turns. Bounds per sample: 10 bio lines, 10 lore lines, 5 topics, one
//! adjective, 5 message example conversations, 5 posts.

use loreweave_core::character::Character;
use rand::seq::SliceRandom;
use rand::Rng;

pub const MAX_BIO_LINES: usize = 10;
pub const MAX_LORE_LINES: usize = 10;
pub const MAX_TOPICS: usize = 5;
pub const MAX_MESSAGE_EXAMPLES: usize = 5;
pub const MAX_POST_EXAMPLES: usize = 5;

/// Pool of names substituted into `{{userN}}` example placeholders.
const EXAMPLE_NAMES: &[&str] = &[
    "Alex", "Jordan", "Casey", "Riley", "Morgan", "Taylor", "Quinn", "Avery",
];

/// One turn's worth of sampled persona material, already formatted.
#[derive(Debug, Clone, Default)]
pub struct PersonaSample {
    pub bio: String,
    pub lore: String,
    pub topics: String,
    pub adjective: String,
    pub message_examples: String,
    pub post_examples: String,
}

fn sample_lines<R: Rng>(rng: &mut R, lines: &[String], max: usize) -> Vec<String> {
    let mut picked: Vec<String> = lines
        .choose_multiple(rng, max.min(lines.len()))
        .cloned()
        .collect();
    picked.shuffle(rng);
    picked
}

/// Substitute `{{user1}}`, `{{user2}}`, ... with names drawn from a fixed
/// pool. The same slot maps to the same name within one conversation.
fn fill_user_slots<R: Rng>(rng: &mut R, text: &str) -> String {
    let offset = rng.gen_range(0..EXAMPLE_NAMES.len());
    let mut out = text.to_string();
    for slot in 1..=EXAMPLE_NAMES.len() {
        let placeholder = format!("{{{{user{slot}}}}}");
        let name = EXAMPLE_NAMES[(offset + slot - 1) % EXAMPLE_NAMES.len()];
        out = out.replace(&placeholder, name);
    }
    out
}

/// Draw a fresh persona sample from the character.
pub fn sample(character: &Character) -> PersonaSample {
    let mut rng = rand::thread_rng();

    let bio = sample_lines(&mut rng, &character.bio, MAX_BIO_LINES).join("\n");
    let lore = sample_lines(&mut rng, &character.lore, MAX_LORE_LINES).join("\n");
    let topics = sample_lines(&mut rng, &character.topics, MAX_TOPICS).join(", ");
    let adjective = character
        .adjectives
        .choose(&mut rng)
        .cloned()
        .unwrap_or_default();

    let conversations: Vec<String> = character
        .message_examples
        .choose_multiple(&mut rng, MAX_MESSAGE_EXAMPLES.min(character.message_examples.len()))
        .map(|conversation| {
            let rendered = conversation
                .iter()
                .map(|turn| {
                    let action = turn
                        .content
                        .action
                        .as_deref()
                        .map(|a| format!(" ({a})"))
                        .unwrap_or_default();
                    format!("{}: {}{}", turn.user, turn.content.text, action)
                })
                .collect::<Vec<_>>()
                .join("\n");
            fill_user_slots(&mut rng, &rendered)
        })
        .collect();

    let posts = sample_lines(&mut rng, &character.post_examples, MAX_POST_EXAMPLES).join("\n");

    PersonaSample {
        bio,
        lore,
        topics,
        adjective,
        message_examples: conversations.join("\n\n"),
        post_examples: posts,
    }
}

/// Style directions for chat replies: shared directions plus chat-specific.
pub fn message_directions(character: &Character) -> String {
    let mut lines = character.style.all.clone();
    lines.extend(character.style.chat.iter().cloned());
    lines.join("\n")
}

/// Style directions for standalone posts: shared directions plus
/// post-specific.
pub fn post_directions(character: &Character) -> String {
    let mut lines = character.style.all.clone();
    lines.extend(character.style.post.iter().cloned());
    lines.join("\n")
}

//! Deterministic formatting of persisted data into context blocks.
//!
//! Every formatter here is a pure function of its inputs: the same actors,
//! goals, and messages always render to the same text. Transcripts read
//! oldest-to-newest even though fetches return newest-first.

use chrono::{DateTime, Duration, Utc};
use loreweave_core::actor::Actor;
use loreweave_core::goal::Goal;
use loreweave_core::memory::{Media, Memory};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Text substituted for attachment content that has aged out of the
/// freshness window.
pub const HIDDEN_ATTACHMENT_TEXT: &str = "[Hidden]";

/// How long attachment content stays visible, measured back from the most
/// recent attachment-carrying message.
pub const ATTACHMENT_WINDOW_MINUTES: i64 = 60;

/// Coarse human-readable age of a timestamp relative to `now`.
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);
    if elapsed < Duration::minutes(1) {
        "just now".to_string()
    } else if elapsed < Duration::hours(1) {
        let m = elapsed.num_minutes();
        format!("{m} minute{} ago", if m == 1 { "" } else { "s" })
    } else if elapsed < Duration::days(1) {
        let h = elapsed.num_hours();
        format!("{h} hour{} ago", if h == 1 { "" } else { "s" })
    } else {
        let d = elapsed.num_days();
        format!("{d} day{} ago", if d == 1 { "" } else { "s" })
    }
}

fn actor_name(actors: &[Actor], id: Uuid) -> String {
    actors
        .iter()
        .find(|a| a.id == id)
        .map(|a| a.name.clone())
        .unwrap_or_else(|| "Unknown User".to_string())
}

/// Render messages as a transcript, one line per message:
/// `(relative-time) [short-id] name: text (action)`.
///
/// `messages` is newest-first as fetched; output is chronological.
pub fn format_messages(messages: &[Memory], actors: &[Actor]) -> String {
    let now = Utc::now();
    messages
        .iter()
        .rev()
        .filter(|m| !m.content.text.is_empty())
        .map(|m| {
            let name = actor_name(actors, m.user_id);
            let action = m
                .content
                .action
                .as_deref()
                .filter(|a| !a.is_empty() && *a != "NONE")
                .map(|a| format!(" ({a})"))
                .unwrap_or_default();
            format!(
                "({}) [{}] {}: {}{}",
                relative_time(m.created_at, now),
                m.short_id(),
                name,
                m.content.text,
                action
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render goals with an objective checklist. Each objective gets one line
/// marked `[x]` when completed, `[ ]` otherwise.
pub fn format_goals(goals: &[Goal]) -> String {
    goals
        .iter()
        .map(|goal| {
            let mut out = format!("Goal: {} (status: {:?})", goal.name, goal.status);
            for objective in &goal.objectives {
                let mark = if objective.completed { "x" } else { " " };
                out.push_str(&format!("\n- [{}] {}", mark, objective.description));
            }
            out
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One line per actor: `Name (@username): tagline`.
pub fn format_actors(actors: &[Actor]) -> String {
    actors
        .iter()
        .map(|a| {
            if a.details.tagline.is_empty() {
                format!("{} (@{})", a.name, a.username)
            } else {
                format!("{} (@{}): {}", a.name, a.username, a.details.tagline)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render an attachment block.
pub fn format_attachments(attachments: &[Media]) -> String {
    attachments
        .iter()
        .map(|a| {
            format!(
                "ID: {}\nName: {}\nURL: {}\nType: {}\nDescription: {}\nText: {}",
                a.id, a.title, a.url, a.source, a.description, a.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Apply the trailing attachment freshness window.
///
/// The anchor is the newest attachment-carrying message; any message older
/// than anchor minus [`ATTACHMENT_WINDOW_MINUTES`] has its attachment text
/// replaced with [`HIDDEN_ATTACHMENT_TEXT`]. This bounds how much stale
/// attachment content leaks into context while still surfacing very recent
/// shared media. Messages without attachments are untouched.
pub fn redact_stale_attachments(messages: &mut [Memory]) {
    let Some(anchor) = messages
        .iter()
        .filter(|m| !m.content.attachments.is_empty())
        .map(|m| m.created_at)
        .max()
    else {
        return;
    };

    let cutoff = anchor - Duration::minutes(ATTACHMENT_WINDOW_MINUTES);
    for message in messages.iter_mut() {
        if message.created_at < cutoff {
            for attachment in &mut message.content.attachments {
                attachment.text = HIDDEN_ATTACHMENT_TEXT.to_string();
            }
        }
    }
}

/// Render messages as posts grouped by room, for cross-room history.
pub fn format_posts(messages: &[Memory], actors: &[Actor]) -> String {
    let mut by_room: BTreeMap<Uuid, Vec<&Memory>> = BTreeMap::new();
    for message in messages {
        if !message.content.text.is_empty() {
            by_room.entry(message.room_id).or_default().push(message);
        }
    }

    by_room
        .into_iter()
        .map(|(room_id, mut posts)| {
            posts.sort_by_key(|m| m.created_at);
            let body = posts
                .iter()
                .map(|m| {
                    format!(
                        "Name: {}\nID: {}\nText: {}",
                        actor_name(actors, m.user_id),
                        m.short_id(),
                        m.content.text
                    )
                })
                .collect::<Vec<_>>()
                .join("\n\n");
            format!("Conversation: {}\n{}", room_id.to_string().chars().take(8).collect::<String>(), body)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

//! Capability name resolution and description formatting.
//!
//! Model-produced action names are imprecise — wrong case, spaces instead
//! of underscores. Resolution normalizes both sides (lowercase, internal
//! separators stripped) and accepts a substring match in either direction
//! against the action's own name or any of its similes. The first
//! registered match wins.

use crate::capability::{Action, Evaluator};
use std::sync::Arc;

/// Lowercase and strip internal separators.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Substring match in either direction over normalized names.
pub fn names_match(a: &str, b: &str) -> bool {
    let a = normalize_name(a);
    let b = normalize_name(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

/// Resolve a declared action name against the registry.
pub fn find_action<'a>(
    actions: &'a [Arc<dyn Action>],
    target: &str,
) -> Option<&'a Arc<dyn Action>> {
    actions.iter().find(|action| {
        names_match(action.name(), target)
            || action.similes().iter().any(|s| names_match(s, target))
    })
}

/// Resolve an evaluator by name or simile (exact-normalized or substring).
pub fn find_evaluator<'a>(
    evaluators: &'a [Arc<dyn Evaluator>],
    target: &str,
) -> Option<&'a Arc<dyn Evaluator>> {
    evaluators.iter().find(|evaluator| {
        names_match(evaluator.name(), target)
            || evaluator.similes().iter().any(|s| names_match(s, target))
    })
}

/// Comma-separated action names, for the `{{actionNames}}` template slot.
pub fn format_action_names(actions: &[Arc<dyn Action>]) -> String {
    actions
        .iter()
        .map(|a| a.name().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// One `name: description` line per action.
pub fn format_actions(actions: &[Arc<dyn Action>]) -> String {
    actions
        .iter()
        .map(|a| format!("{}: {}", a.name(), a.description()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Bulleted example lines, grouped under each action name.
pub fn format_action_examples(actions: &[Arc<dyn Action>]) -> String {
    actions
        .iter()
        .filter(|a| !a.examples().is_empty())
        .map(|a| {
            let examples = a
                .examples()
                .iter()
                .map(|e| format!("- {e}"))
                .collect::<Vec<_>>()
                .join("\n");
            format!("{}:\n{}", a.name(), examples)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_evaluator_names(evaluators: &[Arc<dyn Evaluator>]) -> String {
    evaluators
        .iter()
        .map(|e| e.name().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn format_evaluators(evaluators: &[Arc<dyn Evaluator>]) -> String {
    evaluators
        .iter()
        .map(|e| format!("{}: {}", e.name(), e.description()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_evaluator_examples(evaluators: &[Arc<dyn Evaluator>]) -> String {
    evaluators
        .iter()
        .filter(|e| !e.examples().is_empty())
        .map(|e| {
            let examples = e
                .examples()
                .iter()
                .map(|x| format!("- {x}"))
                .collect::<Vec<_>>()
                .join("\n");
            format!("{}:\n{}", e.name(), examples)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_separators_and_case() {
        assert_eq!(normalize_name("Tweet With Media"), "tweetwithmedia");
        assert_eq!(normalize_name("tweet_with-media"), "tweetwithmedia");
    }

    #[test]
    fn names_match_is_bidirectional_substring() {
        assert!(names_match("tweet_with_media", "Tweet With Media"));
        assert!(names_match("tweet", "tweet_with_media"));
        assert!(names_match("tweet_with_media", "tweet"));
        assert!(!names_match("dance", "tweet_with_media"));
    }

    #[test]
    fn empty_names_never_match() {
        assert!(!names_match("", "anything"));
        assert!(!names_match("anything", "  "));
    }
}

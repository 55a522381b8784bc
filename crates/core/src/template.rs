//! Prompt template rendering.
//!
//! Templates use `{{placeholder}}` substitution against a flat key-value
//! map. Undefined variables substitute to the empty string — a missing
//! variable is not an error.

use std::collections::HashMap;

/// Render a template by substituting `{{name}}` placeholders from `values`.
pub fn render(template: &str, values: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = after[..end].trim();
                if let Some(value) = values.get(name) {
                    out.push_str(value);
                }
                rest = &after[end + 2..];
            }
            None => {
                // Unterminated placeholder — emit literally
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

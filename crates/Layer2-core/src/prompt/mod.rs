//! # Prompt construction
//!
//! Prompts are plain-text templates with `{{name}}` placeholders, filled from
//! a static [`FrameworkProfile`] table and the request itself.
//!
//! - [`frameworks`] - per-framework instructions, checks and hints
//! - [`builder`] - [`PromptBuilder`] for generation and validation prompts

pub mod builder;
pub mod frameworks;

pub use builder::PromptBuilder;
pub use frameworks::{FrameworkProfile, OptimizationHints, ValidationChecks};

/// Substitute `{{name}}` placeholders in a single pass.
///
/// Unknown placeholders are left as-is, and substituted values are never
/// re-scanned.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() * 2);
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let value = after.find("}}").and_then(|end| {
            let name = &after[..end];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, end))
        });

        match value {
            Some((value, end)) => {
                out.push_str(value);
                rest = &after[end + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_known_placeholders() {
        let out = render("Hello {{name}}, {{name}}!", &[("name", "Ada")]);
        assert_eq!(out, "Hello Ada, Ada!");
    }

    #[test]
    fn test_render_leaves_unknown_and_does_not_rescan() {
        let out = render("{{a}} {{missing}}", &[("a", "{{a}}")]);
        assert_eq!(out, "{{a}} {{missing}}");
    }

    #[test]
    fn test_render_plain_braces() {
        let out = render("{ \"files\": {} }", &[]);
        assert_eq!(out, "{ \"files\": {} }");
    }
}

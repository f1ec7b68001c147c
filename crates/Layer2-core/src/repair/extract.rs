//! Locating and repairing the JSON document inside model output

use regex::Regex;
use std::sync::OnceLock;

fn fenced_block() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").ok())
        .as_ref()
}

/// JSON-looking parts of a model response, most likely first.
///
/// Fenced code blocks that open with a JSON bracket come first, in order.
/// Then the first `{` to the last `}` and the first `[` to the last `]`,
/// ordered by where they open. The trimmed text closes the list. A fenced
/// block can be cut short by a fence inside the payload, and narration can
/// contain stray brackets, so callers try each candidate in turn.
pub fn json_candidates(raw: &str) -> Vec<&str> {
    let mut candidates: Vec<&str> = Vec::new();

    if let Some(fence) = fenced_block() {
        for capture in fence.captures_iter(raw) {
            if let Some(body) = capture.get(1) {
                let body = body.as_str().trim();
                if body.starts_with('{') || body.starts_with('[') {
                    candidates.push(body);
                }
            }
        }
    }

    let mut spans: Vec<(usize, &str)> = [('{', '}'), ('[', ']')]
        .into_iter()
        .filter_map(|(open, close)| bracket_span(raw, open, close))
        .collect();
    spans.sort_by_key(|(start, _)| *start);
    candidates.extend(spans.into_iter().map(|(_, span)| span));
    candidates.push(raw.trim());

    let mut seen = Vec::with_capacity(candidates.len());
    candidates.retain(|c| {
        if seen.contains(c) {
            false
        } else {
            seen.push(*c);
            true
        }
    });
    candidates
}

/// `open` at its first occurrence to `close` at its last, with the start offset
fn bracket_span(raw: &str, open: char, close: char) -> Option<(usize, &str)> {
    let start = raw.find(open)?;
    let end = raw.rfind(close)?;
    (end > start).then(|| (start, &raw[start..=end]))
}

/// Re-escape string contents the model forgot to escape.
///
/// Walks the text tracking whether it is inside a string. Inside a string,
/// raw control characters become escapes, backslashes that do not start a
/// valid escape are doubled, and a `"` only closes the string when what
/// follows could legally follow a JSON string; any other quote is escaped.
pub fn repair_json(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            i += 1;
            continue;
        }

        match c {
            '\\' => match chars.get(i + 1) {
                Some(&next) if is_escape(next) => {
                    out.push('\\');
                    out.push(next);
                    i += 2;
                    continue;
                }
                _ => out.push_str("\\\\"),
            },
            '"' => {
                if closes_string(&chars, i + 1) {
                    in_string = false;
                    out.push('"');
                } else {
                    out.push_str("\\\"");
                }
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
        i += 1;
    }

    out
}

fn is_escape(c: char) -> bool {
    matches!(c, '"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u')
}

fn next_significant(chars: &[char], from: usize) -> Option<(usize, char)> {
    chars
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, c)| !c.is_whitespace())
        .map(|(i, c)| (i, *c))
}

/// Whether a quote at `from - 1` can end a JSON string
fn closes_string(chars: &[char], from: usize) -> bool {
    match next_significant(chars, from) {
        None => true,
        Some((_, '}' | ']' | ':')) => true,
        Some((comma, ',')) => match next_significant(chars, comma + 1) {
            None => true,
            Some((_, c)) => {
                matches!(c, '"' | '{' | '[' | '}' | ']' | '-' | 't' | 'f' | 'n')
                    || c.is_ascii_digit()
            }
        },
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_block_comes_first() {
        let raw = "Here you go:\n```json\n{\"a\": 1}\n```\nThanks {not json}";
        assert_eq!(json_candidates(raw)[0], "{\"a\": 1}");
    }

    #[test]
    fn test_fences_without_json_are_skipped() {
        let raw = "```bash\nnpm install\n```\n{\"a\": 1}";
        assert_eq!(json_candidates(raw)[0], "{\"a\": 1}");
    }

    #[test]
    fn test_brace_span() {
        let candidates = json_candidates("Sure! {\"a\": {\"b\": 2}} done");
        assert_eq!(candidates[0], "{\"a\": {\"b\": 2}}");
    }

    #[test]
    fn test_top_level_array_opens_first() {
        let raw = "files: [{\"name\": \"a\", \"content\": \"b\"}]";
        let candidates = json_candidates(raw);
        assert_eq!(candidates[0], "[{\"name\": \"a\", \"content\": \"b\"}]");
        assert_eq!(candidates[1], "{\"name\": \"a\", \"content\": \"b\"}");
    }

    #[test]
    fn test_bracketed_narration_keeps_object_span() {
        let raw = "I built a [React] app:\n{\"files\": {\"a\": \"x\"}, \"suggestions\": [\"s\"]}";
        let candidates = json_candidates(raw);
        assert!(candidates[0].starts_with("[React]"));
        assert_eq!(
            candidates[1],
            "{\"files\": {\"a\": \"x\"}, \"suggestions\": [\"s\"]}"
        );
    }

    #[test]
    fn test_inner_fence_leaves_whole_span_as_fallback() {
        let raw = "```json\n{\"files\": {\"README.md\": \"# App\\n```bash\\nnpm i\\n```\"}}\n```";
        let candidates = json_candidates(raw);
        assert_eq!(candidates[0], "{\"files\": {\"README.md\": \"# App\\n");
        assert!(candidates.contains(&"{\"files\": {\"README.md\": \"# App\\n```bash\\nnpm i\\n```\"}}"));
    }

    #[test]
    fn test_plain_text_is_the_only_candidate() {
        assert_eq!(json_candidates("  no json here  "), vec!["no json here"]);
    }

    #[test]
    fn test_repair_inner_quotes_and_newlines() {
        let broken = "{\"files\": {\"index.html\": \"<div class=\"app\">\n  Hi\n</div>\"}}";
        let repaired = repair_json(broken);
        let value: serde_json::Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(
            value["files"]["index.html"],
            "<div class=\"app\">\n  Hi\n</div>"
        );
    }

    #[test]
    fn test_repair_quote_followed_by_comma_in_code() {
        let broken = "{\"a.js\": \"console.log(\"x\", y)\"}";
        let value: serde_json::Value = serde_json::from_str(&repair_json(broken)).unwrap();
        assert_eq!(value["a.js"], "console.log(\"x\", y)");
    }

    #[test]
    fn test_repair_invalid_backslash() {
        let broken = "{\"path\": \"C:\\temp\\x\"}";
        let value: serde_json::Value = serde_json::from_str(&repair_json(broken)).unwrap();
        assert_eq!(value["path"], "C:\temp\\x");
    }

    #[test]
    fn test_repair_keeps_valid_json_intact() {
        let valid = r#"{"a": "line\nbreak", "b": [1, true, null], "c": "q\"uote"}"#;
        assert_eq!(repair_json(valid), valid);
    }
}

//! Telling human-readable narration apart from code while streaming

/// Characters typical of code and JSON, rare in prose
const STRUCTURAL: &[char] = &['{', '}', '[', ']', '"', '<', '>', ';', '='];

/// Fraction of structural characters above which a chunk counts as code
const DENSITY_LIMIT: f32 = 0.15;

const FENCE: &str = "```";

/// Stateful filter over a chunk sequence.
///
/// Suppresses everything inside fenced code blocks, everything from the
/// first `{` onwards (the JSON payload), and chunks dense with structural
/// characters. Fences split across chunks are still recognised.
#[derive(Debug, Default)]
pub struct NarrationFilter {
    in_fence: bool,
    in_payload: bool,
    /// Backticks at the end of the previous chunk not yet part of a fence
    pending_ticks: usize,
}

impl NarrationFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `chunk` should be shown to the user as narration
    pub fn accept(&mut self, chunk: &str) -> bool {
        if self.in_payload {
            return false;
        }

        let carried = "`".repeat(self.pending_ticks);
        let joined = format!("{}{}", carried, chunk);
        let fences = joined.matches(FENCE).count();
        let trailing = joined.chars().rev().take_while(|c| *c == '`').count();
        self.pending_ticks = trailing % FENCE.len();

        if fences > 0 || self.pending_ticks > 0 {
            if fences % 2 == 1 {
                self.in_fence = !self.in_fence;
            }
            return false;
        }
        if self.in_fence {
            return false;
        }

        if chunk.contains('{') || chunk.trim_start().starts_with('[') {
            self.in_payload = true;
            return false;
        }

        !is_code_dense(chunk)
    }
}

fn is_code_dense(chunk: &str) -> bool {
    let mut visible = 0usize;
    let mut structural = 0usize;
    for c in chunk.chars().filter(|c| !c.is_whitespace()) {
        visible += 1;
        if STRUCTURAL.contains(&c) {
            structural += 1;
        }
    }
    structural >= 3 && structural as f32 / visible as f32 > DENSITY_LIMIT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prose_passes() {
        let mut filter = NarrationFilter::new();
        assert!(filter.accept("Sure! I'll build a todo list "));
        assert!(filter.accept("with local storage support."));
        assert!(filter.accept(" "));
    }

    #[test]
    fn test_payload_suppresses_rest_of_stream() {
        let mut filter = NarrationFilter::new();
        assert!(filter.accept("Here is the app. "));
        assert!(!filter.accept("{\"files\": "));
        assert!(!filter.accept("a plain looking sentence inside the payload"));
    }

    #[test]
    fn test_fenced_blocks_are_suppressed() {
        let mut filter = NarrationFilter::new();
        assert!(!filter.accept("```tsx\n"));
        assert!(!filter.accept("export default App\n"));
        assert!(!filter.accept("```"));
        assert!(filter.accept("Let me know if you need more."));
    }

    #[test]
    fn test_fence_split_across_chunks() {
        let mut filter = NarrationFilter::new();
        assert!(filter.accept("Here is the component. "));
        assert!(!filter.accept("\n``"));
        assert!(!filter.accept("`tsx\n"));
        assert!(!filter.accept("export default function App() \n"));
        assert!(!filter.accept("`"));
        assert!(!filter.accept("``\n"));
        assert!(filter.accept("That should get you started."));
    }

    #[test]
    fn test_dense_chunks_are_code() {
        let mut filter = NarrationFilter::new();
        assert!(!filter.accept("<div className=\"app\"></div>;"));
        assert!(filter.accept("Use a <div> wrapper for the layout"));
    }
}

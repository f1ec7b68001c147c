//! Generation and validation prompt rendering

use super::frameworks::FrameworkProfile;
use super::render;
use crate::error::Result;
use crate::types::{ChatMessage, FileMap, GenerationRequest, ValidationRequest};
use tracing::{debug, warn};

const GENERATION_TEMPLATE: &str = "{{role}}

REQUIREMENTS:
{{instructions}}

STRUCTURE:
{{required_files}}

CODING STANDARDS:
{{best_practices}}

IDIOMATIC PATTERNS:
{{patterns}}

USER REQUIREMENTS:
{{prompt}}

TARGET FRAMEWORK: {{framework}}

Please create a {{display_name}} application that fulfills these requirements.
{{history}}{{files}}
{{critical}}

{{response_format}}
";

const VALIDATION_TEMPLATE: &str = "{{role}}

TECHNICAL ISSUES:
{{technical}}

BEST PRACTICES:
{{best_practices}}

PERFORMANCE:
{{performance}}

SECURITY:
{{security}}

CODE TO ANALYZE:
{{files}}
ANALYSIS FOCUS:
{{analysis_focus}}
{{response_format}}

IMPORTANT:
- Provide specific, actionable feedback
- Include line numbers or code snippets where relevant
- Focus on {{framework}}-specific best practices
- Ensure the JSON response is valid and properly formatted
";

const FALLBACK_GENERATION_TEMPLATE: &str = "Create a {{display_name}} application based on this requirement:
{{prompt}}

{{response_format}}
";

const FALLBACK_VALIDATION_TEMPLATE: &str = "Validate this {{display_name}} code:
{{files}}
{{response_format}}
";

const CRITICAL_REQUIREMENTS: &str = "CRITICAL REQUIREMENTS:
- Ensure all file content is complete and production-ready
- Include proper error handling and validation
- Follow the framework's best practices and conventions
- Make the code maintainable and well-documented
- Ensure the JSON response is valid and properly escaped";

const GENERATION_RESPONSE_FORMAT: &str = r#"RESPONSE FORMAT:
You must respond with a valid JSON object containing:
{
    "files": {
        "filename1": "complete_file_content1",
        "filename2": "complete_file_content2"
    },
    "explanation": "Brief explanation of what was created and key features",
    "suggestions": ["suggestion1", "suggestion2", "suggestion3"]
}"#;

const VALIDATION_RESPONSE_FORMAT: &str = r#"RESPONSE FORMAT:
You must respond with a valid JSON object containing:
{
    "is_valid": true/false,
    "errors": ["error1", "error2"],
    "warnings": ["warning1", "warning2"],
    "suggestions": ["suggestion1", "suggestion2", "suggestion3"]
}"#;

/// Renders framework-aware prompts
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    /// Most recent history messages included
    pub history_limit: usize,
    /// Characters kept per history message
    pub history_chars: usize,
    /// Characters kept per current file
    pub file_preview_chars: usize,
    /// Prompts longer than this are replaced by the compact fallback
    pub max_prompt_chars: Option<usize>,
    /// Optimisation hints listed per category in the analysis focus
    pub focus_hints: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            history_limit: 5,
            history_chars: 200,
            file_preview_chars: 500,
            max_prompt_chars: None,
            focus_hints: 3,
        }
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_chars(mut self, max_prompt_chars: usize) -> Self {
        self.max_prompt_chars = Some(max_prompt_chars);
        self
    }

    pub fn build_generation_prompt(&self, request: &GenerationRequest) -> Result<String> {
        request.validate()?;
        let profile = FrameworkProfile::of(request.framework);

        let history = self.render_history(&request.history);
        let files = self.render_current_files(&request.current_files);
        let instructions = bullets(profile.instructions);
        let required_files = bullets(profile.required_files);
        let best_practices = bullets(profile.best_practices);
        let patterns = bullets(profile.patterns);

        let prompt = render(
            GENERATION_TEMPLATE,
            &[
                ("role", profile.generator_role),
                ("instructions", &instructions),
                ("required_files", &required_files),
                ("best_practices", &best_practices),
                ("patterns", &patterns),
                ("prompt", request.prompt.trim()),
                ("framework", request.framework.as_str()),
                ("display_name", profile.display_name),
                ("history", &history),
                ("files", &files),
                ("critical", CRITICAL_REQUIREMENTS),
                ("response_format", GENERATION_RESPONSE_FORMAT),
            ],
        );

        if self.exceeds_limit(&prompt) {
            warn!(
                framework = %request.framework,
                prompt_len = prompt.chars().count(),
                "Generation prompt too long, using compact prompt"
            );
            return Ok(render(
                FALLBACK_GENERATION_TEMPLATE,
                &[
                    ("display_name", profile.display_name),
                    ("prompt", request.prompt.trim()),
                    ("response_format", GENERATION_RESPONSE_FORMAT),
                ],
            ));
        }

        debug!(
            framework = %request.framework,
            prompt_len = prompt.len(),
            history = request.history.len(),
            files = request.current_files.len(),
            "Generation prompt built"
        );
        Ok(prompt)
    }

    pub fn build_validation_prompt(&self, request: &ValidationRequest) -> Result<String> {
        request.validate()?;
        let profile = FrameworkProfile::of(request.framework);

        let files = render_full_files(&request.files);
        let technical = bullets(profile.checks.technical);
        let best_practices = bullets(profile.checks.best_practices);
        let performance = bullets(profile.checks.performance);
        let security = bullets(profile.checks.security);
        let analysis_focus = self.render_analysis_focus(profile);

        let prompt = render(
            VALIDATION_TEMPLATE,
            &[
                ("role", profile.reviewer_role),
                ("technical", &technical),
                ("best_practices", &best_practices),
                ("performance", &performance),
                ("security", &security),
                ("files", &files),
                ("analysis_focus", &analysis_focus),
                ("response_format", VALIDATION_RESPONSE_FORMAT),
                ("framework", request.framework.as_str()),
            ],
        );

        if self.exceeds_limit(&prompt) {
            warn!(
                framework = %request.framework,
                prompt_len = prompt.chars().count(),
                "Validation prompt too long, using compact prompt"
            );
            return Ok(render(
                FALLBACK_VALIDATION_TEMPLATE,
                &[
                    ("display_name", profile.display_name),
                    ("files", &files),
                    ("response_format", VALIDATION_RESPONSE_FORMAT),
                ],
            ));
        }

        debug!(
            framework = %request.framework,
            prompt_len = prompt.len(),
            files = request.files.len(),
            "Validation prompt built"
        );
        Ok(prompt)
    }

    fn exceeds_limit(&self, prompt: &str) -> bool {
        self.max_prompt_chars
            .is_some_and(|max| prompt.chars().count() > max)
    }

    fn render_history(&self, history: &[ChatMessage]) -> String {
        if history.is_empty() {
            return String::new();
        }

        let start = history.len().saturating_sub(self.history_limit);
        let mut out = String::from("\nCONVERSATION CONTEXT:\n");
        for message in &history[start..] {
            out.push_str(&message.role.as_str().to_uppercase());
            out.push_str(": ");
            out.push_str(&truncate_chars(&message.content, self.history_chars));
            out.push('\n');
        }
        out.push_str("\nPlease consider this conversation context when generating the code.\n");
        out
    }

    fn render_current_files(&self, files: &FileMap) -> String {
        if files.is_empty() {
            return String::new();
        }

        let mut out = String::from("\nCURRENT PROJECT FILES:\n");
        for (path, content) in files {
            out.push_str(&format!(
                "\n--- {} ---\n{}\n",
                path,
                truncate_chars(content, self.file_preview_chars)
            ));
        }
        out.push_str(
            "\nPlease consider these existing files when generating new code. \
             Ensure compatibility and consistency.\n",
        );
        out
    }

    fn render_analysis_focus(&self, profile: &FrameworkProfile) -> String {
        let mut out = format!("Focus on {}-specific issues:\n", profile.framework);
        out.push_str("\nPERFORMANCE CONSIDERATIONS:\n");
        for hint in profile.hints.performance.iter().take(self.focus_hints) {
            out.push_str(&format!("- {}\n", hint));
        }
        out.push_str("\nBEST PRACTICES:\n");
        for hint in profile.hints.best_practices.iter().take(self.focus_hints) {
            out.push_str(&format!("- {}\n", hint));
        }
        out
    }
}

fn render_full_files(files: &FileMap) -> String {
    files
        .iter()
        .map(|(path, content)| format!("\n--- FILE: {} ---\n{}\n", path, content))
        .collect()
}

fn bullets(items: &[&str]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Keep at most `max` characters, marking the cut with an ellipsis
fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_index, _)) => format!("{}...", &text[..byte_index]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Framework;

    fn request(prompt: &str) -> GenerationRequest {
        GenerationRequest::new(prompt, Framework::React)
    }

    #[test]
    fn test_generation_prompt_sections() {
        let prompt = PromptBuilder::new()
            .build_generation_prompt(&request("Create a hello world page"))
            .unwrap();

        assert!(prompt.starts_with("You are an expert React developer."));
        assert!(prompt.contains("STRUCTURE:\n- package.json with all necessary dependencies"));
        assert!(prompt.contains("USER REQUIREMENTS:\nCreate a hello world page"));
        assert!(prompt.contains("TARGET FRAMEWORK: react"));
        assert!(prompt.contains("CRITICAL REQUIREMENTS:"));
        assert!(prompt.contains("\"explanation\""));
        assert!(!prompt.contains("{{"));
        assert!(!prompt.contains("CONVERSATION CONTEXT"));
        assert!(!prompt.contains("CURRENT PROJECT FILES"));
    }

    #[test]
    fn test_history_keeps_last_five_truncated() {
        let history: Vec<ChatMessage> = (0..7)
            .map(|i| ChatMessage::user(format!("message-{}", i)))
            .chain(std::iter::once(ChatMessage::assistant("x".repeat(300))))
            .collect();
        let prompt = PromptBuilder::new()
            .build_generation_prompt(&request("todo app").with_history(history))
            .unwrap();

        assert!(prompt.contains("CONVERSATION CONTEXT:"));
        assert!(!prompt.contains("message-2"));
        assert!(prompt.contains("USER: message-3"));
        assert!(prompt.contains(&format!("ASSISTANT: {}...", "x".repeat(200))));
        assert!(!prompt.contains(&"x".repeat(201)));
    }

    #[test]
    fn test_current_files_are_previewed() {
        let mut files = FileMap::new();
        files.insert("src/App.tsx".into(), "a".repeat(600));
        files.insert("package.json".into(), "{}".into());
        let prompt = PromptBuilder::new()
            .build_generation_prompt(&request("add routing").with_files(files))
            .unwrap();

        assert!(prompt.contains("CURRENT PROJECT FILES:"));
        assert!(prompt.contains("--- package.json ---\n{}\n"));
        assert!(prompt.contains(&format!("--- src/App.tsx ---\n{}...", "a".repeat(500))));
        assert!(!prompt.contains(&"a".repeat(501)));
    }

    #[test]
    fn test_empty_prompt_is_rejected() {
        assert!(PromptBuilder::new()
            .build_generation_prompt(&request("   "))
            .is_err());
    }

    #[test]
    fn test_oversized_prompt_uses_compact_form() {
        let mut files = FileMap::new();
        files.insert("big.ts".into(), "b".repeat(400));
        let builder = PromptBuilder::new().with_max_chars(1_000);
        let prompt = builder
            .build_generation_prompt(&request("dashboard").with_files(files))
            .unwrap();

        assert!(prompt.starts_with("Create a React application"));
        assert!(!prompt.contains("big.ts"));
    }

    #[test]
    fn test_validation_prompt() {
        let mut files = FileMap::new();
        files.insert("src/main.ts".into(), "createApp(App).mount('#app')".into());
        let prompt = PromptBuilder::new()
            .build_validation_prompt(&ValidationRequest::new(files, Framework::Vue))
            .unwrap();

        assert!(prompt.starts_with("You are an expert Vue.js code reviewer."));
        assert!(prompt.contains("--- FILE: src/main.ts ---\ncreateApp(App).mount('#app')"));
        assert!(prompt.contains("PERFORMANCE CONSIDERATIONS:\n- Use computed properties"));
        assert!(!prompt.contains("Use shallow refs for large objects"));
        assert!(prompt.contains("\"is_valid\""));
        assert!(prompt.contains("Focus on vue-specific best practices"));
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé...");
        assert_eq!(truncate_chars("hi", 5), "hi");
    }
}

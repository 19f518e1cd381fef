//! Prompt builder for text translation.
//!
//! [`PromptBuilder::build_chat`] returns a `(system_msg, user_msg)` pair for
//! any OpenAI-compatible `/v1/chat/completions` endpoint.  The system message
//! pins the target language and asks for the translation only; the user
//! message is the original text, untouched.

// ---------------------------------------------------------------------------
// System instruction
// ---------------------------------------------------------------------------

/// `{language}` is replaced by the target language's display name.
const SYSTEM_INSTRUCTION: &str = "\
You are a professional translator.
Task: Translate the user's message into {language}.

Rules:
1. Output ONLY the translation. No explanation, notes, or quotes.
2. Preserve the meaning, tone, and formatting of the original.
3. Keep names, numbers, and technical terms intact.
4. If the text is already in {language}, return it unchanged.";

// ---------------------------------------------------------------------------
// PromptBuilder
// ---------------------------------------------------------------------------

/// Builds translation prompts in chat-message format.
///
/// # Example
/// ```rust
/// use text_to_voice::translate::PromptBuilder;
///
/// let builder = PromptBuilder::new("Spanish");
/// let (system, user) = builder.build_chat("Hello");
/// assert!(system.contains("Spanish"));
/// assert_eq!(user, "Hello");
/// ```
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    target_language: String,
}

impl PromptBuilder {
    /// Create a builder for the given target-language display name
    /// (e.g. `"Spanish"`).
    pub fn new(target_language: &str) -> Self {
        Self {
            target_language: target_language.trim().to_string(),
        }
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    /// Build a **(system_msg, user_msg)** pair.
    pub fn build_chat(&self, text: &str) -> (String, String) {
        let system_msg = SYSTEM_INSTRUCTION.replace("{language}", &self.target_language);
        (system_msg, text.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

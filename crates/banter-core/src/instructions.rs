use std::collections::BTreeMap;

/// Appended to every instruction so replies render well in the chat log.
pub const FORMAT_SUFFIX: &str = " Please format your response using Markdown syntax.";

pub const FALLBACK_INSTRUCTION: &str = "You are a helpful AI assistant.";

/// Maps a model identifier to the system instruction sent ahead of the history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionTable {
    entries: BTreeMap<String, String>,
    fallback: String,
}

impl Default for InstructionTable {
    fn default() -> Self {
        let entries = [
            ("llama3", "You are a friendly, knowledgeable general-purpose assistant."),
            (
                "codellama",
                "You are an expert programmer. Answer with working code and short explanations.",
            ),
            ("gemma", "You are a concise assistant. Prefer short, direct answers."),
            ("mistral", "You are a precise assistant who reasons step by step."),
        ]
        .into_iter()
        .map(|(model, text)| (model.to_string(), text.to_string()))
        .collect();

        Self {
            entries,
            fallback: FALLBACK_INSTRUCTION.to_string(),
        }
    }
}

impl InstructionTable {
    pub fn extend<I>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.entries.extend(overrides);
    }

    /// Text used for models without their own entry.
    pub fn set_fallback(&mut self, instruction: &str) {
        self.fallback = instruction.to_string();
    }

    /// Full instruction for `model`, falling back to the generic assistant text.
    pub fn lookup(&self, model: &str) -> String {
        let base = self.entries.get(model).unwrap_or(&self.fallback);
        format!("{}{}", base, FORMAT_SUFFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_models_get_their_own_text() {
        let table = InstructionTable::default();
        assert_ne!(table.lookup("llama3"), table.lookup("codellama"));
        assert!(table.lookup("codellama").starts_with("You are an expert programmer."));
        assert!(table.lookup("codellama").ends_with(FORMAT_SUFFIX));
    }

    #[test]
    fn test_unknown_model_falls_back() {
        let table = InstructionTable::default();
        assert_eq!(
            table.lookup("phi3"),
            format!("{}{}", FALLBACK_INSTRUCTION, FORMAT_SUFFIX)
        );
    }

    #[test]
    fn test_overrides_replace_defaults() {
        let mut table = InstructionTable::default();
        table.extend([("gemma".to_string(), "Talk like a pirate.".to_string())]);
        assert_eq!(table.lookup("gemma"), format!("Talk like a pirate.{}", FORMAT_SUFFIX));
        assert!(table.lookup("mistral").starts_with("You are a precise assistant"));
    }

    #[test]
    fn test_custom_fallback_only_covers_unlisted_models() {
        let mut table = InstructionTable::default();
        table.set_fallback("Be terse.");
        assert_eq!(table.lookup("phi3"), format!("Be terse.{}", FORMAT_SUFFIX));
        assert!(table.lookup("codellama").starts_with("You are an expert programmer."));
    }
}

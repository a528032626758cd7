use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Task category picked by the user; selects how the prompt is rewritten
/// before it is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TaskKey {
    #[default]
    Chat,
    Code,
    Translate,
    Explain,
}

impl TaskKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKey::Chat => "chat",
            TaskKey::Code => "code",
            TaskKey::Translate => "translate",
            TaskKey::Explain => "explain",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "chat" => Some(TaskKey::Chat),
            "code" => Some(TaskKey::Code),
            "translate" => Some(TaskKey::Translate),
            "explain" => Some(TaskKey::Explain),
            _ => None,
        }
    }

    /// Like [`TaskKey::parse`], but unknown keys fall back to plain chat.
    pub fn from_key(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }

    pub fn all() -> Vec<TaskKey> {
        vec![TaskKey::Chat, TaskKey::Code, TaskKey::Translate, TaskKey::Explain]
    }

    /// Next task in selector order, wrapping around.
    pub fn next(&self) -> Self {
        match self {
            TaskKey::Chat => TaskKey::Code,
            TaskKey::Code => TaskKey::Translate,
            TaskKey::Translate => TaskKey::Explain,
            TaskKey::Explain => TaskKey::Chat,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TaskKey::Chat => "Chat",
            TaskKey::Code => "Code",
            TaskKey::Translate => "Translate",
            TaskKey::Explain => "Explain",
        }
    }

    /// Build the text that is actually sent for `prompt`.
    pub fn resolve_prompt(&self, prompt: &str) -> String {
        match self {
            TaskKey::Chat => prompt.to_string(),
            TaskKey::Code => format!(
                "Return only executable code with no explanations or comments. Code for: {prompt}"
            ),
            TaskKey::Translate => format!("Translate this to English: {prompt}"),
            TaskKey::Explain => format!("Explain this in simple terms: {prompt}"),
        }
    }
}

impl std::fmt::Display for TaskKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

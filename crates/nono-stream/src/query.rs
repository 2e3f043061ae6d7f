use std::fmt;

use crate::errors::ClientError;

/// The kind of assistance a query asks for.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Translate a selected snippet.
    Translate,
    /// Summarize a selected snippet.
    Summarize,
    /// Explain a word or phrase.
    Define,
    /// Translate a whole paragraph in place.
    TranslateParagraph,
    /// Translate the contents of an input field.
    AssistInput,
}

impl TaskKind {
    /// Returns true for the task kinds whose output is a translation.
    pub fn is_translation(self) -> bool {
        matches!(
            self,
            Self::Translate | Self::TranslateParagraph | Self::AssistInput
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Translate => "translate",
            Self::Summarize => "summarize",
            Self::Define => "define",
            Self::TranslateParagraph => "translate_paragraph",
            Self::AssistInput => "assist_input",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One prompt sent to the completion service.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Query {
    task: TaskKind,
    system_prompt: String,
    assistant_prompt: Option<String>,
    user_prompt: String,
}

impl Query {
    /// Creates a query, rejecting an empty user prompt.
    pub fn new(
        task: TaskKind,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let user_prompt = user_prompt.into();
        if user_prompt.trim().is_empty() {
            return Err(ClientError::Validation(
                "user prompt must not be empty".into(),
            ));
        }
        Ok(Self {
            task,
            system_prompt: system_prompt.into(),
            assistant_prompt: None,
            user_prompt,
        })
    }

    /// Sets the optional assistant message placed between system and user.
    ///
    /// Blank text clears it.
    pub fn with_assistant_prompt(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.assistant_prompt = Some(text).filter(|s| !s.trim().is_empty());
        self
    }

    pub fn task(&self) -> TaskKind {
        self.task
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn assistant_prompt(&self) -> Option<&str> {
        self.assistant_prompt.as_deref()
    }

    pub fn user_prompt(&self) -> &str {
        &self.user_prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_user_prompt() {
        let err = Query::new(TaskKind::Translate, "sys", "   ").expect_err("blank prompt");
        assert!(matches!(err, ClientError::Validation(msg) if msg.contains("user prompt")));
    }

    #[test]
    fn blank_assistant_prompt_is_dropped() {
        let query = Query::new(TaskKind::Define, "sys", "word")
            .expect("query")
            .with_assistant_prompt(" ");
        assert_eq!(query.assistant_prompt(), None);
    }

    #[test]
    fn translation_kinds() {
        assert!(TaskKind::Translate.is_translation());
        assert!(TaskKind::AssistInput.is_translation());
        assert!(!TaskKind::Summarize.is_translation());
        assert!(!TaskKind::Define.is_translation());
    }
}

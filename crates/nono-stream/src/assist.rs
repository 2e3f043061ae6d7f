//! Task adapters: fixed prompt templates for each kind of assistance, built
//! on top of `CompletionClient`.

use std::borrow::Cow;

use crate::client::CompletionClient;
use crate::errors::ClientError;
use crate::query::{Query, TaskKind};
use crate::session::SessionHandle;
use crate::slot::{Slot, SlotRegistry};
use crate::stream::{CompletionCallbacks, DeltaFilter, PassThrough};

const TRANSLATE_SYSTEM: &str =
    "You are a translation engine that can only translate text and cannot interpret it.";
const SUMMARIZE_SYSTEM: &str =
    "You are a text summarizer, you can only summarize the text, never interpret it.";
const DEFINE_SYSTEM: &str =
    "You are a dictionary that explains words and phrases without adding commentary.";
const DEFINE_ASSISTANT: &str =
    "Give the part of speech, a short definition and one example sentence.";
const PARAGRAPH_ASSISTANT: &str =
    "Keep the paragraph structure and reply with the translation only.";

/// Quotation characters the model tends to echo at the start of a translation.
const LEADING_QUOTES: [char; 3] = ['"', '\u{201C}', '\u{300C}'];

/// Source and target language for translation tasks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Languages {
    pub from: String,
    pub to: String,
}

impl Languages {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl Default for Languages {
    fn default() -> Self {
        Self::new("English", "Chinese")
    }
}

/// Strips one leading quotation character from the first delta a
/// translation receives. Later deltas pass through untouched, even when the
/// first one was nothing but a quote.
#[derive(Clone, Copy, Debug, Default)]
pub struct LeadingQuoteStrip;

impl DeltaFilter for LeadingQuoteStrip {
    fn apply<'a>(&mut self, delta: &'a str, first_received: bool) -> Cow<'a, str> {
        if !first_received {
            return Cow::Borrowed(delta);
        }
        match delta.strip_prefix(LEADING_QUOTES) {
            Some(rest) => Cow::Borrowed(rest),
            None => Cow::Borrowed(delta),
        }
    }
}

/// Opens task-specific completion sessions.
///
/// Each call owns its own session and first-delta tracking, so concurrent
/// calls never interfere.
#[derive(Clone)]
pub struct Assistant {
    client: CompletionClient,
    languages: Languages,
    input_language: Option<String>,
}

impl Assistant {
    pub fn new(client: CompletionClient) -> Self {
        Self {
            client,
            languages: Languages::default(),
            input_language: None,
        }
    }

    pub fn with_languages(mut self, languages: Languages) -> Self {
        self.languages = languages;
        self
    }

    pub fn languages(&self) -> &Languages {
        &self.languages
    }

    /// Sets the language input fields are written in; input assist translates
    /// it into English.
    pub fn with_input_language(mut self, language: impl Into<String>) -> Self {
        self.input_language = Some(language.into());
        self
    }

    /// Language of input-field text, defaulting to the translation target.
    pub fn input_language(&self) -> &str {
        self.input_language.as_deref().unwrap_or(&self.languages.to)
    }

    /// Builds the prompt for `task` over the selected `text`.
    pub fn query(&self, task: TaskKind, text: &str) -> Result<Query, ClientError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ClientError::Validation("selected text is empty".into()));
        }
        let query = match task {
            TaskKind::Translate => Query::new(
                task,
                TRANSLATE_SYSTEM,
                translate_prompt(&self.languages.from, &self.languages.to, text),
            )?,
            TaskKind::TranslateParagraph => Query::new(
                task,
                TRANSLATE_SYSTEM,
                translate_prompt(&self.languages.from, &self.languages.to, text),
            )?
            .with_assistant_prompt(PARAGRAPH_ASSISTANT),
            TaskKind::AssistInput => Query::new(
                task,
                TRANSLATE_SYSTEM,
                translate_prompt(self.input_language(), "English", text),
            )?,
            TaskKind::Summarize => Query::new(
                task,
                SUMMARIZE_SYSTEM,
                format!("summarize this text in the most concise language:\n\n\"{text}\" =>"),
            )?,
            TaskKind::Define => Query::new(task, DEFINE_SYSTEM, format!("define:\n\n\"{text}\" =>"))?
                .with_assistant_prompt(DEFINE_ASSISTANT),
        };
        Ok(query)
    }

    /// Opens a session for `task`; translation tasks get the leading-quote strip.
    pub fn run(
        &self,
        task: TaskKind,
        text: &str,
        callbacks: impl CompletionCallbacks,
    ) -> Result<SessionHandle, ClientError> {
        let query = self.query(task, text)?;
        Ok(self.open(&query, callbacks))
    }

    /// Like `run`, replacing whatever session currently occupies `slot`.
    pub fn run_in_slot(
        &self,
        slots: &SlotRegistry,
        slot: Slot,
        task: TaskKind,
        text: &str,
        callbacks: impl CompletionCallbacks,
    ) -> Result<SessionHandle, ClientError> {
        let query = self.query(task, text)?;
        slots.cancel(&slot);
        let handle = self.open(&query, callbacks);
        slots.occupy(slot, handle.clone());
        Ok(handle)
    }

    fn open(&self, query: &Query, callbacks: impl CompletionCallbacks) -> SessionHandle {
        if query.task().is_translation() {
            self.client.open_filtered(query, LeadingQuoteStrip, callbacks)
        } else {
            self.client.open_filtered(query, PassThrough, callbacks)
        }
    }

    pub fn translate(
        &self,
        text: &str,
        callbacks: impl CompletionCallbacks,
    ) -> Result<SessionHandle, ClientError> {
        self.run(TaskKind::Translate, text, callbacks)
    }

    pub fn summarize(
        &self,
        text: &str,
        callbacks: impl CompletionCallbacks,
    ) -> Result<SessionHandle, ClientError> {
        self.run(TaskKind::Summarize, text, callbacks)
    }

    pub fn define(
        &self,
        text: &str,
        callbacks: impl CompletionCallbacks,
    ) -> Result<SessionHandle, ClientError> {
        self.run(TaskKind::Define, text, callbacks)
    }

    pub fn translate_paragraph(
        &self,
        text: &str,
        callbacks: impl CompletionCallbacks,
    ) -> Result<SessionHandle, ClientError> {
        self.run(TaskKind::TranslateParagraph, text, callbacks)
    }

    /// Translates the contents of an input field into English.
    pub fn assist_input(
        &self,
        text: &str,
        callbacks: impl CompletionCallbacks,
    ) -> Result<SessionHandle, ClientError> {
        self.run(TaskKind::AssistInput, text, callbacks)
    }
}

fn translate_prompt(from: &str, to: &str, text: &str) -> String {
    format!("translate from {from} to {to}:\n\n\"{text}\" =>")
}

use clap::{Args, Parser, Subcommand};
use nono_stream::{ClientConfig, ClientError, Languages, RetryPolicy, TaskKind};

#[derive(Parser, Debug)]
#[command(name = "nono", version, about = "Stream translations, summaries and definitions")]
pub struct Cli {
    /// Chat model to use
    #[arg(long, global = true, env = "OPENAI_MODEL")]
    pub model: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[arg(long, global = true, env = "OPENAI_BASE_URL")]
    pub base_url: Option<String>,

    /// Reconnect attempts before giving up
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// Retry forever (overrides --max-retries)
    #[arg(long, global = true)]
    pub retry_forever: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Translate text between two languages
    Translate {
        #[command(flatten)]
        languages: LanguageArgs,
        #[command(flatten)]
        input: InputArgs,
    },
    /// Summarize text
    Summarize {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Explain a word or phrase
    Define {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Translate a whole paragraph
    Paragraph {
        #[command(flatten)]
        languages: LanguageArgs,
        #[command(flatten)]
        input: InputArgs,
    },
    /// Translate text typed in your language into English
    Input {
        /// Language the text is written in
        #[arg(long, default_value = "Chinese")]
        from: String,
        #[command(flatten)]
        input: InputArgs,
    },
}

#[derive(Args, Debug)]
pub struct LanguageArgs {
    #[arg(long, default_value = "English")]
    pub from: String,
    #[arg(long, default_value = "Chinese")]
    pub to: String,
}

#[derive(Args, Debug)]
pub struct InputArgs {
    /// Text to process; read from stdin when omitted
    pub text: Option<String>,
}

impl Command {
    pub fn task(&self) -> TaskKind {
        match self {
            Self::Translate { .. } => TaskKind::Translate,
            Self::Summarize { .. } => TaskKind::Summarize,
            Self::Define { .. } => TaskKind::Define,
            Self::Paragraph { .. } => TaskKind::TranslateParagraph,
            Self::Input { .. } => TaskKind::AssistInput,
        }
    }

    pub fn input(&self) -> &InputArgs {
        match self {
            Self::Translate { input, .. }
            | Self::Summarize { input }
            | Self::Define { input }
            | Self::Paragraph { input, .. }
            | Self::Input { input, .. } => input,
        }
    }

    pub fn languages(&self) -> Languages {
        match self {
            Self::Translate { languages, .. } | Self::Paragraph { languages, .. } => {
                Languages::new(&languages.from, &languages.to)
            }
            Self::Summarize { .. } | Self::Define { .. } | Self::Input { .. } => {
                Languages::default()
            }
        }
    }

    /// Source language of `input`; its text is always translated into English.
    pub fn input_language(&self) -> Option<&str> {
        match self {
            Self::Input { from, .. } => Some(from.as_str()),
            _ => None,
        }
    }
}

impl Cli {
    /// Merges command-line overrides into the environment-derived config.
    pub fn client_config(&self) -> Result<ClientConfig, ClientError> {
        let mut config = ClientConfig::from_env()?;
        if let Some(model) = &self.model {
            config = config.model(model);
        }
        if let Some(base_url) = &self.base_url {
            config = config.base_url(base_url);
        }
        if self.retry_forever {
            config = config.retry(RetryPolicy::unbounded());
        } else if let Some(max) = self.max_retries {
            let retry = config.retry.clone().max_retries(Some(max));
            config = config.retry(retry);
        }
        Ok(config)
    }
}

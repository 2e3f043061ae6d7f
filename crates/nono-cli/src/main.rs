//! `nono`: stream a translation, summary or definition to the terminal.

mod cli;
mod observability;

use std::io::Write as _;
use std::process::ExitCode;

use clap::Parser as _;
use nono_stream::prelude::*;
use tokio::io::AsyncReadExt as _;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    observability::init_observability();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(SessionState::Finished) => ExitCode::SUCCESS,
        Ok(SessionState::Cancelled) => ExitCode::from(130),
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("nono: {e}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<SessionState, Box<dyn std::error::Error>> {
    let text = match &cli.command.input().text {
        Some(text) => text.clone(),
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            buf
        }
    };

    let client = CompletionClient::new(cli.client_config()?)?;
    let mut assistant = Assistant::new(client).with_languages(cli.command.languages());
    if let Some(language) = cli.command.input_language() {
        assistant = assistant.with_input_language(language);
    }
    let task = cli.command.task();
    tracing::info!(%task, chars = text.len(), "starting completion");

    let handle = assistant.run(
        task,
        &text,
        Callbacks::new(
            |delta: &str, _is_first: bool| {
                let mut out = std::io::stdout().lock();
                let _ = out.write_all(delta.as_bytes());
                let _ = out.flush();
            },
            |_full: &str| println!(),
            |message: &str| eprintln!("\nnono: {message}"),
        ),
    )?;

    let state = tokio::select! {
        state = handle.wait() => state,
        _ = tokio::signal::ctrl_c() => {
            handle.cancel();
            eprintln!();
            tracing::info!(session_id = %handle.id(), "cancelled by user");
            SessionState::Cancelled
        }
    };
    Ok(state)
}

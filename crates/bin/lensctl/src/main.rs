//! # lensctl
//!
//! Composition root and command-line front end of the rule-chain editor.
//!
//! ## Responsibilities
//! - Parse configuration (`lens.toml`, env vars) and command-line arguments
//! - Install the `tracing` subscriber
//! - Construct the HTTP backend adapter
//! - Construct the application services around it and run one command
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! No editor logic belongs here.

mod cli;
mod config;
mod report;

use anyhow::Context;
use clap::Parser;
use lens_adapter_http_reqwest::HttpBackend;
use lens_app::notice::NoticeBoard;
use lens_app::ports::ActionsBackend;
use lens_app::services::action_list::ActionList;
use lens_app::services::editor::EditorSession;
use lens_domain::action::Action;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load().context("loading configuration")?;

    let filter = EnvFilter::try_new(&config.logging.filter)
        .with_context(|| format!("invalid log filter {:?}", config.logging.filter))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let backend = HttpBackend::new(&config.backend).context("building http client")?;
    tracing::debug!(url = backend.base_url(), "backend configured");

    let board = NoticeBoard::new();
    let outcome = run(cli.command, backend, &board).await;
    eprint!("{}", report::notices(&board.all()));
    outcome
}

async fn run(command: Command, backend: HttpBackend, board: &NoticeBoard) -> anyhow::Result<()> {
    match command {
        Command::Actions => {
            let mut list = ActionList::new(backend);
            print!("{}", report::summaries(list.reload().await));
        }
        Command::Show { id } => {
            let session = EditorSession::new(backend);
            let editor = session
                .open_existing(id)
                .await
                .with_context(|| format!("loading action {id}"))?;
            print!("{}", editor.view());
        }
        Command::Save { file, id } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let action: Action = serde_json::from_str(&text)
                .with_context(|| format!("{} is not a valid action", file.display()))?;
            let session = EditorSession::new(backend);
            let mut editor = session.open_from(id.or(action.id), &action).await;
            let saved = editor.save(board).await.context("saving action")?;
            if let Some(id) = saved.id {
                println!("{id}");
            }
        }
        Command::Delete { id } => {
            let mut list = ActionList::new(backend);
            list.delete(id, board)
                .await
                .with_context(|| format!("deleting action {id}"))?;
        }
        Command::Schema { device } => {
            let session = EditorSession::new(backend);
            let schema = session.schemas().get_schema(device).await;
            print!("{}", report::schema(&schema));
        }
        Command::Check { id, payload } => {
            let action = backend
                .get_action(id)
                .await
                .with_context(|| format!("loading action {id}"))?;
            print!("{}", report::check(&action.chain.trigger, &payload));
        }
    }
    Ok(())
}

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use rag_chat::models::{Message, Role};
use rag_chat::{AppConfig, QueryDispatcher, SkipReason, SubmitOutcome};

#[derive(Parser, Debug)]
#[command(name = "rag-chat")]
#[command(about = "Ask questions against a RAG backend and inspect the cited sources")]
struct Cli {
    /// Backend base URL; overrides RAG_BACKEND_URL.
    #[arg(long)]
    backend: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match cli.backend {
        Some(url) => AppConfig::from_backend_url(Some(url)),
        None => AppConfig::from_env(),
    };

    let dispatcher = QueryDispatcher::from_config(&config);
    tracing::info!("using backend {}", dispatcher.backend().base_url());
    probe_health(&dispatcher).await;

    println!("Ask a question. Commands: /clear, /health, /quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed reading stdin")? {
        match line.trim() {
            "/quit" | "/exit" => break,
            "/clear" => {
                dispatcher.clear();
                println!("(conversation cleared)");
            }
            "/health" => probe_health(&dispatcher).await,
            _ => match dispatcher.submit(&line).await {
                SubmitOutcome::Skipped(SkipReason::EmptyInput) => {}
                SubmitOutcome::Skipped(SkipReason::InFlight) => {
                    println!("(still waiting on the previous question)");
                }
                SubmitOutcome::Discarded => {}
                SubmitOutcome::Answered(_) | SubmitOutcome::Failed(_) => {
                    if let Some(message) = dispatcher.snapshot().last() {
                        print_message(message);
                    }
                }
            },
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn probe_health(dispatcher: &QueryDispatcher) {
    match dispatcher.check_health().await {
        Ok(health) => tracing::info!("backend health: {}", health.status),
        Err(err) => tracing::warn!("backend health check failed: {}", err),
    }
}

fn print_message(message: &Message) {
    if message.role != Role::Assistant {
        return;
    }

    println!();
    if let Some(meta) = &message.meta {
        println!("{}", meta.summary());
    }
    println!("{}", message.content);

    if !message.citations.is_empty() {
        println!();
        println!("Sources");
        for citation in &message.citations {
            println!(
                "  {} ({}) - {}",
                citation.label(),
                citation.display_source(),
                citation.snippet
            );
        }
    }
    println!();
}

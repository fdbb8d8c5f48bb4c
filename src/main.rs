//! `herald` - conversational news agent
//!
//! Wires the task execution runtime to a real model service for local use:
//! one-shot questions, an interactive chat loop and config inspection.

use anyhow::{Context, Result};
use clap::Parser;
use console::Style;
use futures::StreamExt;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, Interrupt, InterruptState};
use herald_core::agent::runtime::impls::{LlmClientCapability, ToolRegistry};
use herald_core::agent::runtime::{AgentRuntime, IdGenerator, ResponseEvent, ResponseKind, UuidGenerator};
use herald_core::config::HeraldConfig;
use herald_core::protocol::{Message, Task};
use herald_core::LlmClient;

mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => HeraldConfig::load_from(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => HeraldConfig::load().context("Failed to load configuration")?,
    };
    config.apply_env_overrides();

    match cli.command {
        Commands::Config { init, force } => handle_config(&config, init, force),
        Commands::Ask {
            message,
            context,
            task,
        } => {
            let runtime = build_runtime(&config)?;
            with_janitor(&runtime, &config, handle_ask(&runtime, message, context, task)).await
        }
        Commands::Chat { context } => {
            let runtime = build_runtime(&config)?;
            with_janitor(&runtime, &config, handle_chat(&runtime, context)).await
        }
    }
}

/// Logs go to stderr; `RUST_LOG` overrides the default `info` level
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_runtime(config: &HeraldConfig) -> Result<AgentRuntime> {
    let llm_config = config
        .resolve()
        .context("Invalid endpoint configuration")?;
    let client = LlmClient::new(llm_config).context("Failed to create LLM client")?;

    let chat = LlmClientCapability::new(Arc::new(client))
        .with_max_tool_rounds(config.agent.max_tool_rounds);

    Ok(AgentRuntime::new(Arc::new(chat), config.agent.system_prompt.clone())
        .with_tools(Arc::new(ToolRegistry::with_defaults()))
        .with_idle_eviction(config.sessions.evict_idle))
}

/// Run `work` with the periodic session janitor alive
async fn with_janitor(
    runtime: &AgentRuntime,
    config: &HeraldConfig,
    work: impl std::future::Future<Output = Result<()>>,
) -> Result<()> {
    let shutdown = CancellationToken::new();
    let janitor = runtime.janitor().spawn(
        config.sessions.sweep_interval(),
        config.sessions.max_age(),
        shutdown.clone(),
    );

    let result = work.await;

    shutdown.cancel();
    if let Err(e) = janitor.await {
        tracing::warn!(error = %e, "Session janitor ended abnormally");
    }
    result
}

async fn handle_ask(
    runtime: &AgentRuntime,
    message: String,
    context: Option<String>,
    task_id: Option<String>,
) -> Result<()> {
    let mut task = Task::new(Message::user_text(UuidGenerator.generate(), message));
    task.id = task_id;
    task.context_id = context;

    let cancel = CancellationToken::new();
    let mut events = runtime.execute(task, cancel.clone());
    let mut interrupts = InterruptState::default();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => match interrupts.press() {
                Interrupt::Cancel => cancel.cancel(),
                Interrupt::Quit => return interrupted(),
            },
            event = events.next() => match event {
                Some(event) => print_event(&event),
                None => break,
            },
        }
    }
    Ok(())
}

async fn handle_chat(runtime: &AgentRuntime, context: Option<String>) -> Result<()> {
    let ids = UuidGenerator;
    let context_id = context.unwrap_or_else(|| ids.generate());
    let prompt = Style::new().cyan().bold();
    let dim = Style::new().dim();

    println!(
        "{}",
        dim.apply_to(format!(
            "Conversation {}. Ctrl-C cancels a running request (twice quits), 'exit' quits.",
            context_id
        ))
    );

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        stdout
            .write_all(format!("{} ", prompt.apply_to("you>")).as_bytes())
            .await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        let task_id = ids.generate();
        let task = Task::new(Message::user_text(ids.generate(), line))
            .with_id(task_id.clone())
            .with_context_id(context_id.clone());

        let mut events = runtime.execute(task, CancellationToken::new());
        let mut interrupts = InterruptState::default();
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => match interrupts.press() {
                    Interrupt::Cancel => {
                        if !runtime.cancel_task(&task_id) {
                            tracing::debug!(task_id = %task_id, "Nothing to cancel");
                        }
                    }
                    Interrupt::Quit => return interrupted(),
                },
                event = events.next() => match event {
                    Some(event) => print_event(&event),
                    None => break,
                },
            }
        }
    }

    Ok(())
}

/// Second Ctrl-C: dropping the event stream stops the pending execution
fn interrupted() -> Result<()> {
    eprintln!("{}", Style::new().dim().apply_to("Interrupted."));
    Ok(())
}

fn print_event(event: &ResponseEvent) {
    let style = match event.kind {
        ResponseKind::Message => Style::new().green(),
        ResponseKind::Error => Style::new().red(),
        ResponseKind::Cancelled => Style::new().yellow(),
    };
    println!("{} {}", style.apply_to("herald>"), event.text());
}

fn handle_config(config: &HeraldConfig, init: bool, force: bool) -> Result<()> {
    if init {
        let path = HeraldConfig::user_config_path()
            .context("Could not determine home directory")?;
        if path.exists() && !force {
            anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
        }
        HeraldConfig::default()
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let bold = Style::new().bold();
    let shown = toml::to_string_pretty(&config.redacted()).context("Failed to render configuration")?;
    println!("{}", bold.apply_to("# Effective configuration"));
    println!("{}", shown);

    match config.resolve() {
        Ok(llm) => println!(
            "{} {} via {} ({})",
            bold.apply_to("# Endpoint:"),
            llm.model,
            llm.base_url,
            llm.provider
        ),
        Err(e) => println!("{} {}", Style::new().red().apply_to("# Endpoint invalid:"), e),
    }
    Ok(())
}

//! cord: run code snippets from a conversation, get the results
//! streamed back.
//!
//! This binary wires the full pipeline against the in-process
//! loopback kernel and a console transport, so the batching,
//! classification, and delivery behavior can be exercised end to end
//! from a terminal.
//!
//! # Configuration
//!
//! Layered, lowest priority first: compiled defaults, the optional
//! `--config` TOML file, `CORD_*` environment variables, CLI flags.
//!
//! # Console Conventions
//!
//! - A line of ` ``` ` toggles a code buffer; on the closing fence
//!   the buffered snippet is sent using the transport's
//!   carriage-return delimiter convention.
//! - `/lang <language>` issues the language-selection card action.
//! - `/quit` exits.
//! - Anything else is sent as plain conversation text.
//!
//! Inside a snippet, the loopback kernel understands `#img`,
//! `#classify`, `#html`, `#fail`, and `#sleep` directives; other
//! lines echo back as plain output.

mod console;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cord_app::CordBot;
use cord_kernel::LoopbackKernel;
use cord_runtime::{
    CardAction, CordConfig, Dispatcher, InboundMessage, MemorySessionStore,
};
use cord_types::{ConversationId, UserId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use console::ConsoleSink;

/// cord console: code conversations against the loopback kernel
#[derive(Parser, Debug)]
#[command(name = "cord")]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Config file path (TOML)
    #[arg(short, long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// Select the session language up front instead of the default
    #[arg(long, value_name = "LANGUAGE")]
    lang: Option<String>,
}

fn init_tracing(args: &Args, config: &CordConfig) -> Result<()> {
    let terminal_filter = if args.debug {
        EnvFilter::new("debug")
    } else if args.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.log.level.clone()))
    };

    let terminal_layer = fmt::layer().with_target(false).with_filter(terminal_filter);

    if let Some(path) = &config.log.file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("cannot open log file {}", path.display()))?;
        let file_layer = fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(Arc::new(file))
            .with_filter(EnvFilter::new(config.log.level.clone()));

        tracing_subscriber::registry()
            .with(terminal_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry().with(terminal_layer).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => CordConfig::load(path)
            .with_context(|| format!("cannot load config {}", path.display()))?,
        None => CordConfig::default(),
    };
    config.apply_env();

    init_tracing(&args, &config)?;

    let sink = Arc::new(ConsoleSink::new());
    let sessions = Arc::new(MemorySessionStore::new());
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(LoopbackKernel::new()),
        sink.clone(),
        &config,
    ));
    let bot = CordBot::new(dispatcher, sink, sessions, &config);

    let conversation = ConversationId::new("console");
    let me = UserId::new(format!(
        "console:{}",
        std::env::var("USER").unwrap_or_else(|_| "you".to_string())
    ));
    let my_name = std::env::var("USER").unwrap_or_else(|_| "you".to_string());

    println!(
        "cord v{} | ``` to open/close a snippet, /lang to switch, /quit to exit",
        env!("CARGO_PKG_VERSION")
    );

    match &args.lang {
        Some(language) => {
            debug!(language, "selecting language from flag");
            bot.handle_message(InboundMessage::card(
                conversation.clone(),
                me.clone(),
                my_name.clone(),
                CardAction::SelectLanguage {
                    language: language.clone(),
                },
            ))
            .await;
        }
        None => bot.handle_member_added(&conversation).await,
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut snippet: Option<String> = None;

    while let Some(line) = lines.next_line().await.context("stdin read failed")? {
        let trimmed = line.trim_end();

        if snippet.is_none() {
            match trimmed {
                "/quit" | "/exit" => break,
                "```" => {
                    snippet = Some(String::new());
                    continue;
                }
                _ if trimmed.starts_with("/lang ") => {
                    let language = trimmed["/lang ".len()..].trim().to_string();
                    bot.handle_message(InboundMessage::card(
                        conversation.clone(),
                        me.clone(),
                        my_name.clone(),
                        CardAction::SelectLanguage { language },
                    ))
                    .await;
                    continue;
                }
                "" => continue,
                _ => {
                    bot.handle_message(
                        InboundMessage::text(
                            conversation.clone(),
                            me.clone(),
                            my_name.clone(),
                            trimmed,
                        )
                        .mentioning_bot(),
                    )
                    .await;
                    continue;
                }
            }
        }

        // inside a snippet buffer
        if trimmed == "```" {
            let code = snippet.take().unwrap_or_default();
            // the transport's snippet convention: code between two
            // carriage returns
            let text = format!("\r{code}\r");
            bot.handle_message(InboundMessage::text(
                conversation.clone(),
                me.clone(),
                my_name.clone(),
                text,
            ))
            .await;
        } else if let Some(buffer) = snippet.as_mut() {
            if !buffer.is_empty() {
                buffer.push('\n');
            }
            buffer.push_str(&line);
        }
    }

    // let in-flight deliveries drain before the process goes away
    tokio::time::sleep(config.pipeline.settle() + std::time::Duration::from_millis(200)).await;
    println!("bye 👋");
    Ok(())
}

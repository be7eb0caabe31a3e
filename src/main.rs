use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use icq::agent::ProtocolConfig;
use icq::config::SendMode;
use icq::console::{parse_command, CommandOutcome, ConsoleView, SharedContext, HELP};
use icq::core::{copilot_protocol, AppEvent, Runtime};
use icq::{util, Config, SessionRepo};

/// Watch and drive Copilot CLI sessions from the terminal
#[derive(Parser, Debug)]
#[command(name = "copilot-icq", version)]
struct Args {
    /// Config file (default: ~/.copilot-icq/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Session-state directory to monitor
    #[arg(long)]
    session_state: Option<PathBuf>,

    /// Hook socket path
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Do not listen for hook events
    #[arg(long)]
    no_hooks: bool,

    /// How messages are sent: protocol or pty
    #[arg(long, value_parser = parse_send_mode)]
    send_mode: Option<SendMode>,
}

fn parse_send_mode(value: &str) -> Result<SendMode, String> {
    match value {
        "protocol" => Ok(SendMode::Protocol),
        "pty" => Ok(SendMode::Pty),
        other => Err(format!("expected 'protocol' or 'pty', got '{other}'")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    util::init_data_dir(None);

    // Initialize logging to file (~/.copilot-icq/logs/copilot-icq.log)
    fs::create_dir_all(util::logs_dir())?;

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(util::log_file_path())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(log_file)
        .with_ansi(false) // Disable ANSI colors in log file
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };
    if let Some(dir) = args.session_state {
        config = config.with_session_state_dir(dir);
    }
    if let Some(path) = args.socket {
        config = config.with_socket_path(path);
    }
    if let Some(mode) = args.send_mode {
        config = config.with_send_mode(mode);
    }
    if args.no_hooks {
        config = config.without_hooks();
    }

    tracing::info!(
        session_state = %config.session_state_dir.display(),
        send_mode = ?config.send_mode,
        hooks = config.hooks.enabled,
        "Starting copilot-icq"
    );

    let source = Arc::new(SessionRepo::new(config.session_state_dir.clone()));
    let protocol = copilot_protocol(ProtocolConfig::default().with_binary(&config.copilot_binary));
    let runtime = Runtime::new(config, source, protocol);

    let ctx = SharedContext::default();
    spawn_console_input(runtime.sender(), ctx.clone());

    println!("copilot-icq: type 'help' for commands");
    let mut view = ConsoleView::new();
    runtime
        .run(|app| {
            for line in view.render(app, &ctx) {
                println!("{line}");
            }
        })
        .await;

    Ok(())
}

fn spawn_console_input(tx: tokio::sync::mpsc::UnboundedSender<AppEvent>, ctx: SharedContext) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    let _ = tx.send(AppEvent::Quit);
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read console input");
                    let _ = tx.send(AppEvent::Quit);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            let outcome = parse_command(&line).and_then(|cmd| cmd.resolve(&ctx.lock()));
            match outcome {
                Ok(CommandOutcome::Event(event)) => {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
                Ok(CommandOutcome::Print(lines)) => {
                    for line in lines {
                        println!("{line}");
                    }
                }
                Err(e) => {
                    println!("!! {e}");
                    if e.starts_with("unknown command") {
                        println!("{HELP}");
                    }
                }
            }
        }
    });
}

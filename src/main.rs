use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use llama_buddy::{ChatSession, Config, Dispatcher, TaskKey};

mod app;
mod handler;
mod tui;
mod ui;

use app::{App, FAILURE_HINT};
use tui::{EventHandler, TICK_RATE};

#[derive(Parser)]
#[command(name = "llama-buddy")]
#[command(author, version, about = "Chat with hosted LLMs from the terminal", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Model identifier (overrides config)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Chat completions endpoint URL (overrides config)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Minimum seconds between requests (overrides config)
    #[arg(long, global = true)]
    interval: Option<u64>,

    /// Task template to start with
    #[arg(short, long, global = true, value_enum, default_value_t = TaskKey::Chat)]
    task: TaskKey,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one prompt and print the reply
    Ask {
        /// The prompt text
        prompt: String,
    },
    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the config file location
    Path,
    /// Write a config file with default values
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        None => {
            let config = load_config(&cli)?;
            let _guard = init_file_logging(cli.verbose)?;
            run_tui(config, cli.task).await
        }
        Some(Commands::Ask { prompt }) => {
            init_stderr_logging(cli.verbose);
            let config = load_config(&cli)?;
            ask(config, prompt, cli.task).await
        }
        Some(Commands::Config { action }) => config_command(action),
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(interval) = cli.interval {
        config.request_interval_secs = interval;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn env_filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "llama_buddy=debug" } else { "llama_buddy=info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// The TUI owns the terminal, so logs go to a file next to the config.
fn init_file_logging(verbose: bool) -> Result<WorkerGuard> {
    let log_dir = Config::config_dir()?;
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create {}", log_dir.display()))?;

    let appender = tracing_appender::rolling::never(&log_dir, "llama-buddy.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .init();
    Ok(guard)
}

fn init_stderr_logging(verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run_tui(config: Config, task: TaskKey) -> Result<()> {
    // Fail before touching the terminal so the message stays readable
    let dispatcher = Dispatcher::from_config(&config)?;
    info!(
        "Starting chat with {} (1 request every {}s)",
        config.model, config.request_interval_secs
    );

    let mut app = App::new(dispatcher, task);
    let mut terminal = tui::init()?;
    tui::install_panic_hook();
    let mut events = EventHandler::new(TICK_RATE);

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event),
                None => break,
            }
            app.poll_query_task().await;
        }
        Ok::<_, anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    result
}

async fn ask(config: Config, prompt: &str, task: TaskKey) -> Result<()> {
    let dispatcher = Dispatcher::from_config(&config)?;
    let mut session = ChatSession::new(dispatcher);

    match session.submit(prompt, task).await {
        Ok(reply) => {
            println!("{reply}");
            Ok(())
        }
        Err(err) => {
            eprintln!("{err}");
            anyhow::bail!(FAILURE_HINT)
        }
    }
}

fn config_command(action: &ConfigAction) -> Result<()> {
    let path = Config::config_path()?;
    match action {
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Init => {
            if path.exists() {
                println!("Config already exists at {}", path.display());
            } else {
                Config::default().save()?;
                println!("Wrote default config to {}", path.display());
                println!("Add your \"api_key\" there or set OPENROUTER_API_KEY.");
            }
        }
    }
    Ok(())
}

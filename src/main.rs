use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use prboard::config::{self, Config};
use prboard::filter::{self, FilterState, StateFilter};
use prboard::gh::GitHubApi;
use prboard::render::{self, Counts};
use prboard::session::PrSession;
use prboard::token::{
    ChainTokenProvider, EnvTokenProvider, GhCliTokenProvider, HttpTokenProvider, TokenProvider,
};
use prboard::{clone, tui};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Pull request dashboard for a single GitHub repository
#[derive(Parser, Debug)]
#[command(name = "prboard", version = env!("PRBOARD_VERSION_STRING"), about)]
struct Cli {
    /// Repository as owner/repo or a GitHub URL
    #[arg(long, global = true, env = "PRBOARD_REPO")]
    repo: Option<String>,

    /// URL answering { "token": "..." } with a GitHub token
    #[arg(long, global = true, env = "PRBOARD_TOKEN_ENDPOINT")]
    token_endpoint: Option<String>,

    /// GitHub REST API base URL
    #[arg(long, global = true)]
    api_base: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive dashboard (default)
    Tui,

    /// Print pull requests once
    List {
        /// all, open, closed or draft
        #[arg(long, default_value_t = StateFilter::All)]
        state: StateFilter,

        /// Search text, e.g. "is:open author:octocat label:bug"
        #[arg(long, default_value = "")]
        search: String,

        /// Ignore the cache and fetch from GitHub
        #[arg(long, default_value_t = false)]
        refresh: bool,
    },

    /// git clone a repository into the clone root
    Clone {
        url: String,

        /// Directory to clone into instead of the configured clone root
        #[arg(long)]
        dest: Option<PathBuf>,

        /// Print the outcome as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Inspect or clear the pull request cache
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },

    /// Print the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long, default_value_t = false)]
        save: bool,
    },
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    Show,
    Clear,
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("prboard=info"))
}

/// The dashboard owns the terminal, so its logs go to a file.
fn init_file_logging() -> Result<PathBuf> {
    let dir = config::config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join("prboard.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(default_filter())
        .init();
    Ok(path)
}

fn init_stderr_logging() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(default_filter())
        .init();
}

fn effective_config(cli: &Cli) -> Result<Config> {
    let mut cfg = config::load_config();
    if let Some(repo) = &cli.repo {
        cfg.set_repo(repo)?;
    }
    if let Some(endpoint) = &cli.token_endpoint {
        cfg.token_endpoint = Some(endpoint.clone());
    }
    if let Some(api_base) = &cli.api_base {
        cfg.api_base = api_base.clone();
    }
    Ok(cfg)
}

fn build_session(cfg: &Config) -> Result<PrSession> {
    let source = GitHubApi::new(&cfg.api_base, &cfg.owner, &cfg.repo, cfg.request_timeout())?;
    debug!(url = %source.pulls_url(), "Pull request source");

    let tokens: Box<dyn TokenProvider> = match &cfg.token_endpoint {
        Some(endpoint) => Box::new(HttpTokenProvider::new(
            endpoint.as_str(),
            cfg.request_timeout(),
        )?),
        None => Box::new(ChainTokenProvider::new(vec![
            Box::new(EnvTokenProvider::default()),
            Box::new(GhCliTokenProvider),
        ])),
    };

    Ok(PrSession::new(Box::new(source), tokens, cfg.cache()))
}

fn run_list(cfg: &Config, state: StateFilter, search: String, refresh: bool) -> Result<()> {
    let now = Utc::now();
    let cached = if refresh {
        None
    } else {
        cfg.cache().load_valid(now)
    };

    let prs = match cached {
        Some(entry) => {
            info!(count = entry.prs.len(), "Using cached pull requests");
            entry.prs
        }
        None => {
            let mut session = build_session(cfg)?;
            let outcome = session.refresh(now, refresh);
            if outcome.is_failure() {
                anyhow::bail!(outcome.describe());
            }
            session.prs().to_vec()
        }
    };

    let view = FilterState::new(state, search);
    let filtered = filter::filter(&prs, &view);

    println!("{}  Filters: {}\n", cfg.repo_slug(), state.label());
    for row in render::project(&filtered) {
        let draft = if row.draft { " [draft]" } else { "" };
        println!("{:<7}{}{}", row.state.as_str(), row.title, draft);
        println!("       {}", row.meta);
    }

    let counts = Counts::of(&filtered);
    println!("\nOpen: {}  Closed: {}", counts.open, counts.closed);
    Ok(())
}

fn run_clone(cfg: &Config, url: &str, dest: Option<PathBuf>, json: bool) -> Result<()> {
    let root = dest.unwrap_or_else(|| cfg.clone_root());
    let outcome = clone::clone_repository(url, &root)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if outcome.success {
        println!("Cloned into {}", outcome.path.display());
    }

    if !outcome.success {
        anyhow::bail!(
            "git clone failed: {}",
            outcome.message.unwrap_or_default()
        );
    }
    Ok(())
}

fn run_cache(cfg: &Config, action: CacheCommand) -> Result<()> {
    let cache = cfg.cache();
    match action {
        CacheCommand::Show => {
            let entry = cache
                .read()
                .with_context(|| format!("Failed to read {}", cache.path().display()))?;
            match entry {
                Some(entry) => {
                    let now = Utc::now();
                    let age = entry
                        .age(now)
                        .map(|age| format!("{}s ago", age.as_secs()))
                        .unwrap_or_else(|| "in the future".to_string());
                    println!("Cache:      {}", cache.path().display());
                    println!("Written at: {} ({})", entry.written_at, age);
                    println!("Valid:      {}", entry.is_valid(now, cache.ttl()));
                    println!("Records:    {}", entry.prs.len());
                }
                None => println!("No cache at {}", cache.path().display()),
            }
        }
        CacheCommand::Clear => {
            if cache.clear()? {
                println!("Removed {}", cache.path().display());
            } else {
                println!("No cache at {}", cache.path().display());
            }
        }
    }
    Ok(())
}

fn run_config(cfg: &Config, save: bool) -> Result<()> {
    println!("# {}", config::config_path().display());
    println!("{}", serde_json::to_string_pretty(cfg)?);
    if save {
        config::save_config(cfg)?;
        println!("\nSaved configuration.");
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = effective_config(&cli)?;

    match cli.command.unwrap_or(Command::Tui) {
        Command::Tui => {
            let log_path = init_file_logging()?;
            info!(repo = %cfg.repo_slug(), log = %log_path.display(), "Starting dashboard");
            let session = build_session(&cfg)?;
            tui::run(&cfg, session)
        }
        Command::List {
            state,
            search,
            refresh,
        } => {
            init_stderr_logging();
            run_list(&cfg, state, search, refresh)
        }
        Command::Clone { url, dest, json } => {
            init_stderr_logging();
            run_clone(&cfg, &url, dest, json)
        }
        Command::Cache { action } => run_cache(&cfg, action),
        Command::Config { save } => run_config(&cfg, save),
    }
}

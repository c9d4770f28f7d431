use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use axel_capture::{
    CaptureConfig, CaptureStore, ChatHistory, capture_message, search, summarize,
};
use axel_cipher::generate_key;
use axel_common::config::ENV_ENCRYPTION_KEY;
use axel_common::{APP_NAME, AxelConfig, RepoList, logging};
use axel_discord::DiscordGateway;
use axel_quests::{
    DEFAULT_LIMIT, ModelCatalog, TokenPlaceClient, plan_client_integrations, suggest,
};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

mod output;

const DEFAULT_SEARCH_LIMIT: usize = 5;
const WATCH_PAGE_SIZE: usize = 100;

#[derive(Debug, Parser)]
#[command(name = "axel", about = "Axel local assistant CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate local setup and generate default config if missing.
    Doctor,
    /// Discord capture commands.
    Discord {
        #[command(subcommand)]
        command: DiscordCommand,
    },
    /// Suggest quests that link repositories from the repo list.
    Quests {
        /// Repository list (defaults to the configured repo file).
        #[arg(long)]
        path: Option<PathBuf>,
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
        #[arg(long)]
        token_place_url: Option<String>,
        #[arg(long)]
        token_place_key: Option<String>,
    },
    /// token.place helpers.
    TokenPlace {
        #[command(subcommand)]
        command: TokenPlaceCommand,
    },
}

#[derive(Debug, Subcommand)]
enum DiscordCommand {
    /// Validate configured Discord token with Discord API.
    Status,
    /// Send a message to a Discord channel.
    Send { channel_id: String, message: String },
    /// Capture one message (or the message it replies to) with its context.
    Capture {
        channel_id: String,
        message_id: String,
    },
    /// Poll a channel and capture every message that mentions the bot.
    Watch {
        #[arg(long)]
        channel: String,
        /// Scan the latest page of messages once and exit.
        #[arg(long)]
        once: bool,
    },
    /// Search saved captures for text.
    Search {
        query: String,
        #[arg(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,
    },
    /// Summarize the first capture that matches the query.
    Summarize { query: String },
    /// Print a fresh capture encryption key.
    Keygen,
}

#[derive(Debug, Subcommand)]
enum TokenPlaceCommand {
    /// List available token.place models.
    List {
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Plan token.place client integrations across repositories.
    Clients {
        #[arg(long)]
        path: Option<PathBuf>,
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        api_key: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Some(Command::Doctor) => doctor(),
        Some(Command::Discord { command }) => discord(command),
        Some(Command::Quests {
            path,
            limit,
            token_place_url,
            token_place_key,
        }) => quests(path, limit, token_place_url, token_place_key),
        Some(Command::TokenPlace { command }) => token_place(command),
        None => {
            println!("{APP_NAME} CLI ready.");
            println!("Run `axel doctor` to generate and validate local config.");
            Ok(())
        }
    }
}

fn load_initialized_config() -> Result<AxelConfig> {
    let (mut config, _, _) = AxelConfig::load_or_create()?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    logging::init(&config.log_level);
    Ok(config)
}

fn open_store(config: &AxelConfig) -> Result<CaptureStore> {
    let store = CaptureStore::open(&CaptureConfig::from_discord(&config.discord))?;
    Ok(store)
}

fn load_repos(path: &Path) -> Result<RepoList> {
    RepoList::load(path).with_context(|| format!("failed to read repo list {}", path.display()))
}

fn doctor() -> Result<()> {
    let (mut config, path, created) = AxelConfig::load_or_create()?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    logging::init(&config.log_level);

    let store = open_store(&config)?;
    let repos = load_repos(&config.repo_file)?;

    println!("{APP_NAME} doctor: OK");
    println!("config: {}", path.display());
    println!("created_config: {created}");
    println!("capture_dir: {}", store.root().display());
    println!("encrypted: {}", store.is_encrypted());
    println!("repo_file: {}", config.repo_file.display());
    println!("repos: {}", repos.len());
    println!("token_place_url: {}", config.token_place.base_url);
    println!("discord_token: {}", config.discord.token.is_some());

    Ok(())
}

fn discord(command: DiscordCommand) -> Result<()> {
    let config = load_initialized_config()?;

    match command {
        DiscordCommand::Status => {
            let me = connect(&config)?.healthcheck()?;
            println!("discord_status: ok");
            println!("bot_id: {}", me.id);
            println!("bot_username: {}", me.username);
        }
        DiscordCommand::Send {
            channel_id,
            message,
        } => {
            let sent = connect(&config)?.send_message(&channel_id, &message)?;
            println!("send_status: ok");
            println!("message_id: {}", sent.id);
            println!("channel_id: {}", sent.channel_id);
        }
        DiscordCommand::Capture {
            channel_id,
            message_id,
        } => {
            let store = open_store(&config)?;
            let repos = load_repos(&config.repo_file)?;
            let gateway = connect(&config)?;
            let channel = gateway.fetch_channel(&channel_id)?;
            let trigger = gateway.fetch_message(&channel, &message_id)?;
            let outcome = capture_message(&store, &gateway, &repos, &trigger)?;
            println!("capture_saved: {}", outcome.path.display());
            println!("message_id: {}", outcome.message_id);
            println!("context: {}", outcome.context_len);
            println!("attachments: {}", outcome.attachments_saved);
            println!("soft_failures: {}", outcome.soft_failures.len());
        }
        DiscordCommand::Watch { channel, once } => {
            let store = open_store(&config)?;
            let repos = load_repos(&config.repo_file)?;
            let gateway = connect(&config)?;
            watch(&gateway, &store, &repos, &channel, &config, once)?;
        }
        DiscordCommand::Search { query, limit } => {
            let store = open_store(&config)?;
            let hits = search(&store, &query, limit);
            println!("{}", output::search_report(&query, &hits));
        }
        DiscordCommand::Summarize { query } => {
            let store = open_store(&config)?;
            let summary = summarize(&store, &query);
            println!("{}", output::summary_report(&query, summary.as_ref()));
        }
        DiscordCommand::Keygen => {
            println!("encryption_key: {}", generate_key());
            println!("hint: export {ENV_ENCRYPTION_KEY}=<key> to encrypt new captures");
        }
    }
    Ok(())
}

fn connect(config: &AxelConfig) -> Result<DiscordGateway> {
    let token = config.discord.token.as_deref().ok_or_else(|| {
        anyhow!("discord token missing: set DISCORD_BOT_TOKEN or config.discord.token")
    })?;
    DiscordGateway::new(token, config.discord.request_timeout_ms)
}

/// Polls `channel_id` for messages mentioning the bot, captures each one and
/// replies with the saved path. Failures of a single poll or capture are
/// logged and the loop keeps going.
fn watch(
    gateway: &DiscordGateway,
    store: &CaptureStore,
    repos: &RepoList,
    channel_id: &str,
    config: &AxelConfig,
    once: bool,
) -> Result<()> {
    let me = gateway.healthcheck()?;
    let channel = gateway.fetch_channel(channel_id)?;
    // A single pass scans the latest page; a long-running watch starts after
    // the newest existing message.
    let mut cursor = if once {
        None
    } else {
        gateway
            .list_recent_messages(&channel.id, None, 1)?
            .last()
            .map(|message| message.id.clone())
    };
    info!(channel_id = %channel.id, bot_id = %me.id, "watching for mentions");
    println!("watching: {}", channel.id);

    loop {
        if !once {
            thread::sleep(Duration::from_millis(config.discord.poll_interval_ms));
        }
        let messages =
            match gateway.list_recent_messages(&channel.id, cursor.as_deref(), WATCH_PAGE_SIZE) {
                Ok(messages) => messages,
                Err(err) => {
                    warn!(error = %err, "poll failed");
                    if once {
                        return Err(err);
                    }
                    continue;
                }
            };

        for message in messages {
            cursor = Some(message.id.clone());
            if message.author.bot || message.author.id == me.id || !message.mentions_user(&me.id) {
                continue;
            }
            let trigger = match message.into_chat_message(&channel) {
                Ok(trigger) => trigger,
                Err(err) => {
                    warn!(error = %err, "skipping unreadable mention");
                    continue;
                }
            };
            match capture_message(store, gateway, repos, &trigger) {
                Ok(outcome) => {
                    let reply = format!("Saved to {}", outcome.path.display());
                    if let Err(err) = gateway.send_message(&channel.id, &reply) {
                        warn!(error = %err, "capture reply failed");
                    }
                    println!("capture_saved: {}", outcome.path.display());
                }
                Err(err) => {
                    warn!(message_id = %trigger.id, error = %err, "capture failed");
                }
            }
        }

        if once {
            return Ok(());
        }
    }
}

fn quests(
    path: Option<PathBuf>,
    limit: usize,
    token_place_url: Option<String>,
    token_place_key: Option<String>,
) -> Result<()> {
    let mut config = load_initialized_config()?;
    if let Some(url) = token_place_url {
        config.token_place.base_url = url;
    }
    if let Some(key) = token_place_key {
        config.token_place.api_key = Some(key);
    }
    let repos = load_repos(&path.unwrap_or_else(|| config.repo_file.clone()))?;
    let client = TokenPlaceClient::from_config(&config.token_place)?;

    let suggestions = suggest(
        repos.urls().iter().map(String::as_str),
        limit,
        Some(&client as &dyn ModelCatalog),
    );
    println!("{}", output::quest_report(&suggestions));
    Ok(())
}

fn token_place(command: TokenPlaceCommand) -> Result<()> {
    let mut config = load_initialized_config()?;
    match command {
        TokenPlaceCommand::List {
            base_url,
            api_key,
            timeout_ms,
        } => {
            if let Some(url) = base_url {
                config.token_place.base_url = url;
            }
            if let Some(key) = api_key {
                config.token_place.api_key = Some(key);
            }
            if let Some(timeout_ms) = timeout_ms {
                config.token_place.timeout_ms = timeout_ms;
            }
            let client = TokenPlaceClient::from_config(&config.token_place)?;
            let models = client
                .list_models()
                .with_context(|| "failed to list models")?;
            println!("{}", output::models_report(&models));
        }
        TokenPlaceCommand::Clients {
            path,
            base_url,
            api_key,
        } => {
            if let Some(url) = base_url {
                config.token_place.base_url = url;
            }
            if let Some(key) = api_key {
                config.token_place.api_key = Some(key);
            }
            let repos = load_repos(&path.unwrap_or_else(|| config.repo_file.clone()))?;
            let client = TokenPlaceClient::from_config(&config.token_place)?;
            let plans = plan_client_integrations(
                repos.urls().iter().map(String::as_str),
                Some(&client as &dyn ModelCatalog),
            );
            println!("{}", output::integration_report(&plans));
        }
    }
    Ok(())
}

//! Hive Curation Bot CLI
//!
//! Streams blocks, scores community posts, and manages the bot's user lists.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hive_curation_bot::{
    config::BotConfig,
    curator::Curator,
    cursor::BlockCursor,
    lists::{ListName, UserListStore},
};

#[derive(Parser)]
#[command(name = "hive-curation-bot")]
#[command(about = "Community curation bot for the Hive blockchain")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "curation.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream blocks and score community posts
    Run {
        /// Start from a specific block height (overrides saved cursor)
        #[arg(long)]
        from_height: Option<u64>,
    },

    /// Score a post and print the breakdown
    Score {
        /// Post author
        author: String,
        /// Post permlink
        permlink: String,
    },

    /// Cast a vote and the promotional reply on a post
    Vote {
        /// Post author
        author: String,
        /// Post permlink
        permlink: String,
        /// Vote weight percent (0-100)
        #[arg(short, long)]
        weight: u32,
    },

    /// Manage a user list (verified, blacklist, auto, trail, staff)
    List {
        /// List name
        name: String,

        #[command(subcommand)]
        action: ListAction,
    },

    /// Show cursor position and list sizes
    Status,

    /// Validate configuration file
    ValidateConfig,
}

#[derive(Subcommand)]
enum ListAction {
    /// Add an account to the list
    Add {
        account: String,
        /// Controlling operator id (staff list only)
        #[arg(long)]
        operator_id: Option<String>,
    },
    /// Remove an account from the list
    Remove { account: String },
    /// Print the list
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    let config = match BotConfig::from_file(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            if matches!(cli.command, Commands::ValidateConfig) {
                eprintln!("Configuration validation failed: {}", e);
                std::process::exit(1);
            }
            if cli.config.exists() {
                anyhow::bail!("Failed to load config from {:?}: {}", cli.config, e);
            }
            tracing::info!("No config file at {:?}, using defaults", cli.config);
            BotConfig::default()
        }
    };

    match cli.command {
        Commands::Run { from_height } => run_stream(config, from_height).await,
        Commands::Score { author, permlink } => score_post(config, &author, &permlink).await,
        Commands::Vote {
            author,
            permlink,
            weight,
        } => cast_vote(config, &author, &permlink, weight).await,
        Commands::List { name, action } => manage_list(&config, &name, action),
        Commands::Status => show_status(&config),
        Commands::ValidateConfig => {
            println!("Configuration is valid.");
            println!("  Hive nodes: {:?}", config.hive_nodes);
            println!("  Community tags: {:?}", config.community_tags);
            println!("  Voter account: {}", config.voter_account);
            println!("  Cursor file: {:?}", config.cursor_file);
            println!(
                "  Posting key: {}",
                if config.posting_key.is_some() {
                    "configured"
                } else {
                    "not configured (scoring only)"
                }
            );
            Ok(())
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

async fn run_stream(config: BotConfig, from_height: Option<u64>) -> Result<()> {
    tracing::info!("Starting curation bot");
    let curator = Curator::new(config)?;

    tokio::select! {
        result = curator.run(from_height) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
            Ok(())
        }
    }
}

async fn score_post(config: BotConfig, author: &str, permlink: &str) -> Result<()> {
    let curator = Curator::new(config)?;
    let breakdown = curator.score_post(author, permlink).await?;

    println!("Score for @{}/{}:", author, permlink);
    println!("{}", breakdown.summary());
    Ok(())
}

async fn cast_vote(config: BotConfig, author: &str, permlink: &str, weight: u32) -> Result<()> {
    if weight > 100 {
        anyhow::bail!("Vote weight must be 0-100, got {}", weight);
    }
    let curator = Curator::new(config)?;
    curator.cast_vote_and_comment(author, permlink, weight).await?;

    println!("Voted {}% on @{}/{}", weight, author, permlink);
    Ok(())
}

fn manage_list(config: &BotConfig, name: &str, action: ListAction) -> Result<()> {
    let store = UserListStore::new(&config.lists_dir);

    if name == "staff" {
        return manage_staff(&store, action);
    }

    let list: ListName = name.parse()?;
    match action {
        ListAction::Add { account, .. } => {
            if store.add(list, &account)? {
                println!("Added @{} to the {} list", account, name);
            } else {
                println!("@{} is already on the {} list", account, name);
            }
        }
        ListAction::Remove { account } => {
            if store.remove(list, &account)? {
                println!("Removed @{} from the {} list", account, name);
            } else {
                println!("@{} is not on the {} list", account, name);
            }
        }
        ListAction::Show => {
            let mut members = store.members(list);
            members.sort();
            for account in members {
                println!("- @{}", account);
            }
        }
    }
    Ok(())
}

fn manage_staff(store: &UserListStore, action: ListAction) -> Result<()> {
    match action {
        ListAction::Add {
            account,
            operator_id,
        } => {
            let operator_id = operator_id
                .ok_or_else(|| anyhow::anyhow!("--operator-id is required for the staff list"))?;
            if store.add_staff(&account, &operator_id)? {
                println!("Added @{} to the staff list", account);
            } else {
                println!("@{} is already on the staff list", account);
            }
        }
        ListAction::Remove { account } => {
            if store.remove_staff(&account)? {
                println!("Removed @{} from the staff list", account);
            } else {
                println!("@{} is not on the staff list", account);
            }
        }
        ListAction::Show => {
            let mut staff = store.staff();
            staff.sort_by(|a, b| a.account.cmp(&b.account));
            for entry in staff {
                println!("- @{} (operator {})", entry.account, entry.operator_id);
            }
        }
    }
    Ok(())
}

fn show_status(config: &BotConfig) -> Result<()> {
    let cursor = BlockCursor::load(&config.cursor_file);
    let store = UserListStore::new(&config.lists_dir);

    println!("Status:");
    println!("  Last processed block: {}", cursor.height());
    println!("  Verified: {}", store.members(ListName::Verified).len());
    println!("  Blacklisted: {}", store.members(ListName::Blacklist).len());
    println!("  Auto-vote: {}", store.members(ListName::Auto).len());
    println!("  Trail: {}", store.members(ListName::Trail).len());
    println!("  Staff: {}", store.staff().len());
    Ok(())
}

//! kopiyka-doctor — operational checks from the command line.
//!
//! Usage:
//!   kopiyka-doctor health
//!   kopiyka-doctor status-env
//!   kopiyka-doctor client-info --token <bank token>

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

/// First 4 chars, the rest starred.
fn mask_secret(value: Option<&str>) -> String {
    match value {
        None | Some("") => "None".to_string(),
        Some(v) if v.chars().count() <= 4 => "*".repeat(v.chars().count()),
        Some(v) => {
            let head: String = v.chars().take(4).collect();
            format!("{head}{}", "*".repeat(v.chars().count() - 4))
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "kopiyka-doctor",
    version,
    about = "kopiyka operational checks"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify the binary starts and the cache dir is writable.
    Health,

    /// Print the recognized environment (secrets masked).
    StatusEnv,

    /// Fetch and summarize client-info with an explicit token.
    ClientInfo {
        /// Bank personal API token (not stored).
        #[arg(long)]
        token: String,
    },
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let cache_dir = env_opt("CACHE_DIR").unwrap_or_else(|| ".cache".to_string());

    match args.command {
        Command::Health => {
            std::fs::create_dir_all(&cache_dir)
                .with_context(|| format!("creating cache dir {cache_dir}"))?;
            println!("ok");
        }

        Command::StatusEnv => {
            println!(
                "TELEGRAM_BOT_TOKEN = {}",
                mask_secret(env_opt("TELEGRAM_BOT_TOKEN").as_deref())
            );
            println!(
                "MASTER_KEY = {}",
                mask_secret(env_opt("MASTER_KEY").as_deref())
            );
            println!(
                "OPENAI_API_KEY = {}",
                mask_secret(env_opt("OPENAI_API_KEY").as_deref())
            );
            println!(
                "OPENAI_MODEL = {}",
                env_opt("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string())
            );
            println!("CACHE_DIR = {cache_dir}");
            println!(
                "LOG_LEVEL = {}",
                env_opt("LOG_LEVEL").unwrap_or_else(|| "info".to_string())
            );
        }

        Command::ClientInfo { token } => {
            let cache = Arc::new(
                kopiyka_store::DiskCache::open(format!("{cache_dir}/http"))
                    .context("opening disk cache")?,
            );
            let limiter = Arc::new(
                kopiyka_store::RateLimiter::open(format!("{cache_dir}/rate_limits.json"))
                    .context("opening rate limiter")?,
            );
            let client = kopiyka_bank::BankClient::new(&token, cache, limiter)
                .context("building bank client")?;

            let info = client.client_info().await.context("fetching client-info")?;
            println!("client_name = {}", info.name.as_deref().unwrap_or("?"));
            println!("accounts_count = {}", info.accounts.len());
            for acc in info.accounts.iter().take(5) {
                println!(
                    "account: {} currencyCode={} balance={} label={}",
                    acc.id,
                    acc.currency_code,
                    acc.balance,
                    acc.display_label()
                );
            }
            if info.accounts.len() > 5 {
                println!("... and {} more accounts", info.accounts.len() - 5);
            }
        }
    }

    Ok(())
}

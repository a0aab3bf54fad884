//! Command line client for a running tally store

use clap::{Parser, Subcommand, ValueEnum};
use server_tcp::StoreClient;
use shared::config::Config;
use std::sync::Arc;
use tally::fetch::HttpFetcher;
use tally::{Cache, ContentCache, KeyValueStore, OperationIdentity, StoredValue, ValueKind};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Counted, replayable calls on a key-value store", long_about = None)]
struct Cli {
    /// Store address, overrides TALLY_HOST and TALLY_TCP_PORT
    #[arg(long, global = true)]
    addr: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the store answers
    Ping,

    /// Store each value under a fresh key and print the keys
    Store {
        /// Integers and floats are stored as numbers, anything else as text
        #[arg(required = true)]
        values: Vec<String>,
    },

    /// Read a stored value
    Get {
        key: String,

        #[arg(short, long, value_enum, default_value_t = Kind::Text)]
        kind: Kind,
    },

    /// Print the call history of an operation
    Replay {
        #[arg(default_value = Cache::STORE_IDENTITY)]
        identity: String,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch a page through the content cache
    Page { url: String },

    /// How many times a page was fetched from its origin
    Count { url: String },

    /// Remove every key from the store
    Flush,
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Text,
    Int,
    Float,
    Bytes,
}

impl From<Kind> for ValueKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Text => ValueKind::Text,
            Kind::Int => ValueKind::Integer,
            Kind::Float => ValueKind::Float,
            Kind::Bytes => ValueKind::Bytes,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Logs go to stderr so command output stays pipeable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::from_env();
    let addr = cli.addr.unwrap_or_else(|| config.store_addr());

    info!("Using store at {}", addr);
    let client = StoreClient::connect_with_max_frame(addr.as_str(), config.max_frame_bytes).await?;

    if let Commands::Ping = cli.command {
        client.ping().await?;
        println!("PONG from {addr}");
        return Ok(());
    }

    let store: Arc<dyn KeyValueStore> = Arc::new(client);

    match cli.command {
        Commands::Ping => {}
        Commands::Store { values } => {
            let cache = Cache::attach(store);
            for value in values {
                let key = cache.store(parse_value(&value)).await?;
                println!("{key}");
            }
        }
        Commands::Get { key, kind } => {
            let cache = Cache::attach(store);
            match cache.get_as(&key, kind.into()).await? {
                Some(StoredValue::Text(text)) => println!("{text}"),
                Some(value) => println!("{value:?}"),
                None => {
                    warn!("Key '{}' not found", key);
                    println!("(nil)");
                }
            }
        }
        Commands::Replay { identity, json } => {
            let report = tally::ReplayReporter::new(store)
                .report(&OperationIdentity::new(identity))
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{report}");
            }
        }
        Commands::Page { url } => {
            let pages = ContentCache::with_ttl(HttpFetcher::new(), store, config.cache_ttl);
            println!("{}", pages.get_page(&url).await?);
        }
        Commands::Count { url } => {
            let pages = ContentCache::with_ttl(HttpFetcher::new(), store, config.cache_ttl);
            println!("{}", pages.access_count(&url).await?);
        }
        Commands::Flush => {
            store.flush_db().await?;
            println!("OK");
        }
    }

    Ok(())
}

/// Numbers keep their type, everything else is text
fn parse_value(raw: &str) -> StoredValue {
    if let Ok(value) = raw.parse::<i64>() {
        return StoredValue::Integer(value);
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => StoredValue::Float(value),
        _ => StoredValue::Text(raw.to_string()),
    }
}

//! CLI interface for the vector store

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use hybrid_vectorstore::{
    create_store, DistanceMetric, Filter, SearchRequest, StoreConfig, VectorRecord, VectorStore,
};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "vstore")]
#[command(author, version, about = "Administer an embedded or remote vector store", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Deployment mode (overrides the configuration file)
    #[arg(long)]
    mode: Option<String>,

    /// Data directory for the embedded backend (overrides the configuration file)
    #[arg(long)]
    persist_path: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List collections
    Collections,
    /// Create a collection
    Create {
        name: String,
        #[arg(short, long)]
        dimension: usize,
        /// cosine, euclidean (l2) or dot (ip)
        #[arg(short, long, default_value = "cosine")]
        metric: String,
    },
    /// Show a collection's schema and size
    Info { name: String },
    /// Delete a collection
    Drop { name: String },
    /// Insert or replace a record
    Upsert {
        collection: String,
        id: String,
        /// Vector data as comma-separated values (e.g., "1.0,2.0,3.0")
        #[arg(short, long)]
        vector: String,
        /// JSON object stored with the record
        #[arg(short, long)]
        payload: Option<String>,
    },
    /// Search for similar records
    Search {
        collection: String,
        /// Query vector as comma-separated values (e.g., "1.0,2.0,3.0")
        query: String,
        /// Number of results to return
        #[arg(short, long, default_value = "5")]
        k: usize,
        /// Minimum normalized score
        #[arg(long)]
        threshold: Option<f32>,
        /// Filter document, e.g. '{"source": "react"}'
        #[arg(long)]
        filter: Option<String>,
    },
    /// Delete records by id and/or filter
    Delete {
        collection: String,
        #[arg(long = "id")]
        ids: Vec<String>,
        #[arg(long)]
        filter: Option<String>,
    },
    /// Count records in a collection
    Count { collection: String },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn parse_vector(s: &str) -> Result<Vec<f32>> {
    s.split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .with_context(|| format!("invalid vector component '{}'", part.trim()))
        })
        .collect()
}

fn parse_filter(s: &str) -> Result<Filter> {
    let value: serde_json::Value = serde_json::from_str(s).context("filter is not valid JSON")?;
    Ok(Filter::from_json(&value)?)
}

fn load_config(cli: &Cli) -> Result<StoreConfig> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::from_toml_file(path)?,
        None => StoreConfig::default(),
    };
    if let Some(mode) = &cli.mode {
        config.mode = mode.clone();
    }
    if let Some(path) = &cli.persist_path {
        config.embedded.persist_path = Some(path.clone());
    }
    Ok(config)
}

async fn run(store: &dyn VectorStore, command: Commands) -> Result<()> {
    match command {
        Commands::Collections => {
            let names = store.list_collections().await?;
            if names.is_empty() {
                println!("No collections");
            } else {
                for name in names {
                    println!("{}", name);
                }
            }
        }
        Commands::Create {
            name,
            dimension,
            metric,
        } => {
            let metric: DistanceMetric = metric.parse()?;
            store.create_collection(&name, dimension, metric).await?;
            println!("Created collection '{}' ({} dims, {})", name, dimension, metric);
        }
        Commands::Info { name } => {
            let info = store.get_collection_info(&name).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Commands::Drop { name } => {
            store.delete_collection(&name).await?;
            println!("Dropped collection '{}'", name);
        }
        Commands::Upsert {
            collection,
            id,
            vector,
            payload,
        } => {
            let mut record = VectorRecord::new(id.clone(), parse_vector(&vector)?);
            if let Some(payload) = payload {
                let value: serde_json::Value =
                    serde_json::from_str(&payload).context("payload is not valid JSON")?;
                match value {
                    serde_json::Value::Object(map) => record = record.with_payload(map),
                    _ => bail!("payload must be a JSON object"),
                }
            }
            store.upsert(&collection, vec![record]).await?;
            println!("Upserted record with ID: {}", id);
        }
        Commands::Search {
            collection,
            query,
            k,
            threshold,
            filter,
        } => {
            let mut request = SearchRequest::new(parse_vector(&query)?, k);
            if let Some(threshold) = threshold {
                request = request.with_threshold(threshold);
            }
            if let Some(filter) = filter {
                request = request.with_filter(parse_filter(&filter)?);
            }

            let results = store.search(&collection, request).await?;
            if results.is_empty() {
                println!("No results found");
            } else {
                println!("Top {} results:", results.len());
                for (i, result) in results.iter().enumerate() {
                    println!("{}. {} (score: {:.4})", i + 1, result.id, result.score);
                }
            }
        }
        Commands::Delete {
            collection,
            ids,
            filter,
        } => {
            let filter = filter.as_deref().map(parse_filter).transpose()?;
            let ids = (!ids.is_empty()).then_some(ids);
            let removed = store
                .delete(&collection, ids.as_deref(), filter.as_ref())
                .await?;
            println!("Deleted {} record(s)", removed);
        }
        Commands::Count { collection } => {
            println!("{}", store.count(&collection).await?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli)?;
    let store = create_store(&config)?;
    store.initialize().await?;

    let outcome = run(store.as_ref(), cli.command).await;
    store.close().await?;
    outcome
}

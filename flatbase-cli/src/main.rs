use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flatbase_core::logging::{self, LogLevel};
use flatbase_core::query::PredicateTree;
use flatbase_core::store::CollectionStore;
use flatbase_core::{AggregateRequest, Document, EngineConfig, MemoryStore, QueryEngine};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "flatbase")]
#[command(about = "Flatbase CLI - query and aggregate flat-file document collections")]
#[command(version)]
struct Cli {
    /// Data directory (<dir>/<database>/<collection>.json)
    #[arg(long, default_value = "flatbase-data")]
    data: PathBuf,

    /// Log level (ERROR, WARN, INFO, DEBUG, TRACE); overrides FLATBASE_LOG
    #[arg(long)]
    log_level: Option<String>,

    /// Evaluate every predicate by full scan
    #[arg(long)]
    no_index: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append documents from a JSON file (array or single object)
    Import {
        file: PathBuf,
        #[arg(long)]
        db: String,
        #[arg(long)]
        collection: String,
    },
    /// Create or drop an index on a dotted field path
    Index {
        field: String,
        #[arg(long)]
        db: String,
        #[arg(long)]
        collection: String,
        /// Drop the index instead of creating it
        #[arg(long)]
        drop: bool,
    },
    /// Print documents matching a predicate tree read from a JSON file
    Filter {
        predicate: PathBuf,
        #[arg(long)]
        db: String,
        #[arg(long)]
        collection: String,
    },
    /// Run an aggregate request read from a JSON file
    Aggregate { request: PathBuf },
    /// Print the number of documents in a collection
    Count {
        #[arg(long)]
        db: String,
        #[arg(long)]
        collection: String,
    },
    /// List databases, or the collections of one database
    Collections {
        #[arg(long)]
        db: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_from_env();
    if let Some(raw) = &cli.log_level {
        let level = LogLevel::parse(raw).with_context(|| format!("Unknown log level: {}", raw))?;
        logging::set_log_level(level);
    }

    let mut config = EngineConfig::from_env();
    if cli.no_index {
        config = config.with_indexes(false);
    }

    let store = MemoryStore::open_dir(&cli.data)
        .with_context(|| format!("Failed to open data directory: {}", cli.data.display()))?;

    match cli.command {
        Commands::Import { file, db, collection } => {
            import_documents(&store, &file, &db, &collection)?;
            persist(&store, &cli.data)
        }
        Commands::Index {
            field,
            db,
            collection,
            drop,
        } => {
            if drop {
                let existed = store
                    .drop_index(&db, &collection, &field)
                    .with_context(|| format!("Failed to drop index on {}.{}.{}", db, collection, field))?;
                println!(
                    "{} index on '{}' in {}.{}",
                    if existed { "Dropped" } else { "No" },
                    field,
                    db,
                    collection
                );
            } else {
                store
                    .create_index(&db, &collection, &field)
                    .with_context(|| format!("Failed to create index on {}.{}.{}", db, collection, field))?;
                println!("Created index on '{}' in {}.{}", field, db, collection);
            }
            persist(&store, &cli.data)
        }
        Commands::Filter {
            predicate,
            db,
            collection,
        } => {
            let engine = QueryEngine::with_config(Arc::new(store), config);
            run_filter(&engine, &predicate, &db, &collection)
        }
        Commands::Aggregate { request } => {
            let engine = QueryEngine::with_config(Arc::new(store), config);
            run_aggregate(&engine, &request)
        }
        Commands::Count { db, collection } => {
            let count = store
                .entry_count(&db, &collection)
                .with_context(|| format!("Failed to count {}.{}", db, collection))?;
            println!("{}", count);
            Ok(())
        }
        Commands::Collections { db } => list_collections(&store, db.as_deref()),
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in file: {}", path.display()))
}

fn persist(store: &MemoryStore, data: &Path) -> Result<()> {
    store
        .persist_dir(data)
        .with_context(|| format!("Failed to write data directory: {}", data.display()))
}

fn print_documents<I>(documents: I) -> Result<usize>
where
    I: IntoIterator<Item = Document>,
{
    let mut printed = 0;
    for doc in documents {
        let json = serde_json::to_string(&doc).with_context(|| "Failed to serialize document")?;
        println!("{}", json);
        printed += 1;
    }
    Ok(printed)
}

/// Import documents into one collection
/// Format: [documents...] or a single document object
fn import_documents(store: &MemoryStore, file: &Path, db: &str, collection: &str) -> Result<()> {
    let documents = match read_json(file)? {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        _ => anyhow::bail!("{} must contain a document or an array of documents", file.display()),
    };

    let mut imported = 0;
    for (position, json) in documents.into_iter().enumerate() {
        let doc = Document::from_json_value(json)
            .with_context(|| format!("Entry {} of {} is not a document", position, file.display()))?;
        store
            .insert(db, collection, doc)
            .with_context(|| format!("Failed to insert entry {} into {}.{}", position, db, collection))?;
        imported += 1;
    }

    println!("Imported {} documents into {}.{}", imported, db, collection);
    Ok(())
}

fn run_filter(engine: &QueryEngine<MemoryStore>, predicate: &Path, db: &str, collection: &str) -> Result<()> {
    let tree = PredicateTree::from_json(&read_json(predicate)?)
        .with_context(|| format!("Invalid predicate tree in {}", predicate.display()))?;

    let matches = engine
        .evaluate_filter(&tree, db, collection)
        .with_context(|| format!("Failed to filter {}.{}", db, collection))?;
    let printed = print_documents(matches)?;
    eprintln!("{} documents matched", printed);
    Ok(())
}

fn run_aggregate(engine: &QueryEngine<MemoryStore>, request: &Path) -> Result<()> {
    let request = AggregateRequest::from_json(&read_json(request)?)
        .with_context(|| format!("Invalid aggregate request in {}", request.display()))?;

    let results = engine
        .run_pipeline(&request)
        .with_context(|| format!("Failed to aggregate {}.{}", request.database, request.collection))?;
    let json = serde_json::to_string_pretty(&results).with_context(|| "Failed to serialize results")?;
    println!("{}", json);
    Ok(())
}

fn list_collections(store: &MemoryStore, db: Option<&str>) -> Result<()> {
    let databases = match db {
        Some(db) => vec![db.to_string()],
        None => store.list_databases(),
    };

    for db in databases {
        let collections = store
            .list_collections(&db)
            .with_context(|| format!("Failed to list collections of {}", db))?;
        for collection in collections {
            let count = store.entry_count(&db, &collection)?;
            let indexes = store.list_indexes(&db, &collection)?;
            if indexes.is_empty() {
                println!("{}.{} ({} documents)", db, collection, count);
            } else {
                println!("{}.{} ({} documents, indexes: {})", db, collection, count, indexes.join(", "));
            }
        }
    }
    Ok(())
}

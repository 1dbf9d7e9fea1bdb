use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use kvmodel::model::{Contact, ContactKind, Group, GroupKind, User, UserKind};
use kvmodel::{DurabilityMode, EntityKind, FileStore, KvStore, Record, StoreConfig, register_all};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "kvmodel-tool")]
#[command(about = "Developer tooling for kvmodel stores")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List registered entity types and their fields
    Entities,
    /// Print the record stored under a pk
    Get {
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long)]
        pk: String,
    },
    /// Print every entity of one type
    List {
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long, value_enum)]
        kind: Kind,
    },
    /// Take the next value of a counter
    NextId {
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long)]
        key: String,
        #[arg(long)]
        field: String,
        #[arg(long, default_value_t = 1)]
        initial: i64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    User,
    Contact,
    Group,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Entities => list_entities(),
        Command::Get { data_dir, pk } => get_record(&data_dir, &pk).await,
        Command::List { data_dir, kind } => list_kind(&data_dir, kind).await,
        Command::NextId {
            data_dir,
            key,
            field,
            initial,
        } => next_id(&data_dir, &key, &field, initial).await,
    }
}

fn list_entities() -> Result<()> {
    register_all().context("failed to build entity schemas")?;
    for schema in [UserKind::schema()?, ContactKind::schema()?, GroupKind::schema()?] {
        let fields: Vec<&str> = schema.field_names().collect();
        println!("{}: {}", schema.type_name(), fields.join(", "));
    }
    Ok(())
}

fn open_store(data_dir: &Path) -> Result<FileStore> {
    if !data_dir.is_dir() {
        return Err(anyhow!("data dir does not exist: {}", data_dir.display()));
    }
    FileStore::open(data_dir, DurabilityMode::Sync)
        .with_context(|| format!("failed to open store in {}", data_dir.display()))
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn get_record(data_dir: &Path, pk: &str) -> Result<()> {
    let store = open_store(data_dir)?;
    let record = store
        .get(pk)
        .await?
        .ok_or_else(|| anyhow!("no record under pk {}", pk))?;
    print_json(&record.to_json())
}

async fn list_kind(data_dir: &Path, kind: Kind) -> Result<()> {
    let store = open_store(data_dir)?;
    for record in store.scan().await {
        if let Some(json) = external_form(&record, kind)? {
            print_json(&json)?;
        }
    }
    Ok(())
}

fn external_form(record: &Record, kind: Kind) -> Result<Option<serde_json::Value>> {
    let json = match kind {
        Kind::User => User::from_scanned_record(record)?.map(|e| e.to_external()),
        Kind::Contact => Contact::from_scanned_record(record)?.map(|e| e.to_external()),
        Kind::Group => Group::from_scanned_record(record)?.map(|e| e.to_external()),
    };
    Ok(json)
}

async fn next_id(data_dir: &Path, key: &str, field: &str, initial: i64) -> Result<()> {
    let data_dir = std::path::absolute(data_dir)
        .with_context(|| format!("failed to resolve {}", data_dir.display()))?;
    let store = StoreConfig::default()
        .data_dir(&data_dir)
        .durability(DurabilityMode::Sync)
        .open()
        .with_context(|| format!("failed to open store in {}", data_dir.display()))?;
    let id = store
        .atomic_increment(key, field, initial)
        .await
        .with_context(|| format!("failed to increment {}#{}", key, field))?;
    println!("{}", id);
    Ok(())
}

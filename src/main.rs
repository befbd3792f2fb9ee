use std::path::{Path, PathBuf};

use cass_stmt::{
    EngineConfig, KeyQuery, ProtocolVersion, RowDetails, SchemaBuilder, TableMetadata,
    TableSchema, crud, limit_select_query, schema_builder::CreateTableOptions,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Preview the statements generated for table definitions, rows and keys.
#[derive(Parser)]
struct Args {
    /// JSON engine configuration.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a CREATE TABLE from a JSON table description.
    CreateTable {
        input: PathBuf,
        #[arg(long, value_enum, conflicts_with = "release_version")]
        protocol: Option<Protocol>,
        /// Cluster release version, e.g. 3.11.4.
        #[arg(long)]
        release_version: Option<String>,
    },
    /// Render an INSERT for a JSON row.
    Insert {
        #[command(flatten)]
        table: TableArgs,
        row: PathBuf,
        #[arg(long)]
        ttl: Option<u32>,
    },
    /// Render a SELECT for a JSON key query.
    Select {
        #[command(flatten)]
        table: TableArgs,
        key: PathBuf,
        #[arg(long)]
        include_options: bool,
    },
    /// Apply the row cap to a statement.
    Limit {
        statement: String,
        #[arg(long)]
        max: Option<u32>,
    },
}

#[derive(clap::Args)]
struct TableArgs {
    #[arg(long)]
    keyspace: String,
    #[arg(long)]
    table: String,
    /// JSON table metadata (partitionKeys, clusteringKeys, columns).
    #[arg(long)]
    schema: PathBuf,
}

#[derive(Copy, Clone, ValueEnum)]
enum Protocol {
    V2,
    V3,
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let text = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&text)?)
}

async fn load_schema(args: &TableArgs) -> Result<TableSchema, Box<dyn std::error::Error>> {
    let meta: TableMetadata = read_json(&args.schema).await?;
    Ok(meta.into_schema(&args.keyspace, &args.table)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => EngineConfig::load(path).await?,
        None => EngineConfig::default(),
    };
    debug!(page_size = config.page_size, "configuration loaded");

    let output = match args.cmd {
        Command::CreateTable {
            input,
            protocol,
            release_version,
        } => {
            let version = match (protocol, release_version) {
                (Some(Protocol::V2), _) => ProtocolVersion::V2,
                (Some(Protocol::V3), _) => ProtocolVersion::V3,
                (None, Some(release)) => ProtocolVersion::from_release_version(&release),
                (None, None) => ProtocolVersion::V3,
            };
            let opts: CreateTableOptions = read_json(&input).await?;
            SchemaBuilder::new(version).create_table_with_options(&opts)?
        }
        Command::Insert { table, row, ttl } => {
            let schema = load_schema(&table).await?;
            let row: RowDetails = read_json(&row).await?;
            crud::build_insert(&schema, &row, ttl)?.text
        }
        Command::Select {
            table,
            key,
            include_options,
        } => {
            let schema = load_schema(&table).await?;
            let key: KeyQuery = read_json(&key).await?;
            let stmt = crud::build_select_by_key(&schema, &key, include_options, config.page_size)?;
            let bindings = serde_json::to_string(&stmt.bindings)?;
            format!("{}\n{bindings}", stmt.text)
        }
        Command::Limit { statement, max } => {
            limit_select_query(&statement, max.unwrap_or(config.page_size))?
        }
    };
    println!("{output}");
    Ok(())
}

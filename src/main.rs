use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::{json, Value as Json};
use tracing_subscriber::EnvFilter;

use crudsql::ast::{CompiledStatement, StatementBuilder};
use crudsql::model::{
    BatchItem, BatchRequest, CreateRequest, DeleteRequest, Operation, ReadRequest,
    UpdateOperation, UpdateRequest,
};
use crudsql::{Dialect, EngineConfig, SqlEngine};

/// Compile and run JSON CRUD requests against MySQL, PostgreSQL or SQL Server
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Engine configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the SQL and arguments for each request without connecting
    Compile {
        #[arg(long)]
        dialect: Dialect,
        #[arg(long)]
        database: String,
        #[arg(long)]
        fetch_limit: Option<u64>,
        /// Request file, `-` for stdin
        file: PathBuf,
    },
    /// Check connectivity
    Ping,
    /// Describe a table's columns, foreign keys and indexes
    Describe { table: String },
    /// Create the configured database/schema (or NAME) if missing
    CreateDatabase { name: Option<String> },
    /// Run raw statements in one transaction
    Raw {
        #[arg(required = true)]
        statements: Vec<String>,
    },
    /// Run each request in a file
    Exec {
        /// Run all write requests as one transactional batch
        #[arg(long)]
        batch: bool,
        /// Request file, `-` for stdin
        file: PathBuf,
    },
}

/// One request of a request file.
#[derive(Deserialize)]
struct RequestItem {
    #[serde(alias = "col")]
    table: String,
    #[serde(flatten)]
    request: Request,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Request {
    Create(CreateRequest),
    Read(ReadRequest),
    Update(UpdateRequest),
    Delete(DeleteRequest),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("crudsql=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Compile {
            dialect,
            database,
            fetch_limit,
            file,
        } => {
            let builder = StatementBuilder::new(dialect, database).with_fetch_limit(fetch_limit);
            for item in read_requests(&file)? {
                for stmt in compile_item(&builder, &item)? {
                    println!("{}", serde_json::to_string(&statement_json(&stmt))?);
                }
            }
        }
        Command::Ping => {
            let engine = engine(cli.config.as_deref())?;
            if !engine.ping().await {
                bail!("database unreachable");
            }
            println!("ok");
        }
        Command::Describe { table } => {
            let engine = engine(cli.config.as_deref())?;
            let description = engine
                .describe(&table)
                .await
                .with_context(|| format!("describing {}", table))?;
            println!("{}", serde_json::to_string_pretty(&description)?);
        }
        Command::CreateDatabase { name } => {
            let config = load_config(cli.config.as_deref())?;
            let name = name.unwrap_or_else(|| config.database.clone());
            let engine = config.build_engine()?;
            engine.create_database_if_not_exist(&name).await?;
            println!("ok");
        }
        Command::Raw { statements } => {
            let engine = engine(cli.config.as_deref())?;
            engine.raw_batch(&statements).await?;
            println!("ok");
        }
        Command::Exec { batch, file } => {
            let engine = engine(cli.config.as_deref())?;
            let items = read_requests(&file)?;
            if batch {
                run_batch(&engine, items).await?;
            } else {
                for item in &items {
                    println!("{}", serde_json::to_string(&run_item(&engine, item).await?)?);
                }
            }
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let mut config = EngineConfig::load(path).context("loading engine configuration")?;
    config.resolve_password()?;
    Ok(config)
}

fn engine(path: Option<&Path>) -> Result<SqlEngine> {
    Ok(load_config(path)?.build_engine()?)
}

/// A request file holds one request object or an array of them.
fn read_requests(path: &Path) -> Result<Vec<RequestItem>> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
    };
    let value: Json = serde_json::from_str(&content).context("parsing request file")?;
    let items = match value {
        Json::Array(items) => items,
        single => vec![single],
    };
    items
        .into_iter()
        .map(|v| serde_json::from_value(v).context("invalid request"))
        .collect()
}

fn compile_item(builder: &StatementBuilder, item: &RequestItem) -> Result<Vec<CompiledStatement>> {
    let table = item.table.as_str();
    Ok(match &item.request {
        Request::Create(req) => vec![builder.create(table, req)?],
        Request::Read(req) => vec![builder.read(table, req)?],
        Request::Update(req) if req.operation == UpdateOperation::Upsert => {
            let plan = builder.upsert(table, req)?;
            vec![plan.count, plan.insert, plan.update]
        }
        Request::Update(req) => vec![builder.update(table, req)?],
        Request::Delete(req) => vec![builder.delete(table, req)?],
    })
}

fn statement_json(stmt: &CompiledStatement) -> Json {
    json!({ "sql": stmt.sql, "args": stmt.args })
}

async fn run_item(engine: &SqlEngine, item: &RequestItem) -> Result<Json> {
    let table = item.table.as_str();
    Ok(match &item.request {
        Request::Create(req) => json!({ "affected": engine.create(table, req).await? }),
        Request::Read(req) => serde_json::to_value(engine.read(table, req).await?)?,
        Request::Update(req) => json!({ "affected": engine.update(table, req).await? }),
        Request::Delete(req) => json!({ "affected": engine.delete(table, req).await? }),
    })
}

async fn run_batch(engine: &SqlEngine, items: Vec<RequestItem>) -> Result<()> {
    let mut requests = Vec::with_capacity(items.len());
    for item in items {
        let operation = match item.request {
            Request::Create(req) => Operation::Create(req),
            Request::Update(req) => Operation::Update(req),
            Request::Delete(req) => Operation::Delete(req),
            Request::Read(_) => bail!("read requests cannot run inside a batch"),
        };
        requests.push(BatchItem {
            table: item.table,
            operation,
        });
    }

    match engine.batch(&BatchRequest { requests }).await {
        Ok(counts) => {
            println!("{}", json!({ "affected": counts }));
            Ok(())
        }
        Err(failure) => {
            println!("{}", json!({ "affected": failure.counts }));
            Err(failure.error.into())
        }
    }
}

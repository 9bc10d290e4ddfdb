//! taskdb CLI - inspect and maintain a world's task store

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use taskdb::{records, QueryResult, Session, StoreConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "taskdb")]
#[command(about = "Schema-driven task store for game worlds", long_about = None)]
struct Cli {
    /// World directory holding task.db (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    world: PathBuf,

    /// YAML store configuration; relative paths resolve against the world
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log statements as they run
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the store and every registered table
    Init,

    /// Print the registered table descriptors
    Schema {
        /// Print descriptors as YAML instead of DDL
        #[arg(long)]
        yaml: bool,
    },

    /// Execute one SQL statement
    Query {
        /// The statement to execute
        sql: String,

        /// Write changes back to the store file
        #[arg(long)]
        save: bool,
    },

    /// List tables with their row counts
    Tables,

    /// Copy the store to another file
    Backup {
        /// Destination file
        dest: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli.world, cli.config.as_deref())?;

    match cli.command {
        Commands::Init => init_store(config),
        Commands::Schema { yaml } => show_schema(yaml),
        Commands::Query { sql, save } => execute_query(config, &sql, save),
        Commands::Tables => list_tables(config),
        Commands::Backup { dest } => backup_store(config, &dest),
    }
}

fn load_config(world: &Path, file: Option<&Path>) -> anyhow::Result<StoreConfig> {
    let config = match file {
        Some(file) => StoreConfig::load(file)
            .with_context(|| format!("loading {}", file.display()))?
            .resolve(world),
        None => StoreConfig::for_world(world),
    };
    Ok(config)
}

fn open(config: StoreConfig) -> anyhow::Result<Session> {
    let path = config.path.clone();
    let session = Session::open(config, records::registry()?)
        .with_context(|| format!("opening store {}", path.display()))?;
    Ok(session)
}

fn init_store(config: StoreConfig) -> anyhow::Result<()> {
    if let Some(parent) = config.path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let session = open(config)?;
    println!("Store ready at {}", session.path().display());
    for table in session.table_names()? {
        println!("  {}", table);
    }
    session.close()?;
    Ok(())
}

fn show_schema(yaml: bool) -> anyhow::Result<()> {
    let registry = records::registry()?;
    if yaml {
        print!("{}", registry.to_yaml()?);
        return Ok(());
    }
    for sql in taskdb::schema::create::create_statements(registry.tables().cloned())? {
        println!("{};", sql.text);
    }
    Ok(())
}

fn execute_query(config: StoreConfig, sql: &str, save: bool) -> anyhow::Result<()> {
    let session = open(config)?;
    match session.execute_raw(sql)? {
        QueryResult::Rows(rows) => {
            let records: Vec<serde_json::Map<String, serde_json::Value>> = rows
                .rows()
                .map(|row| {
                    row.iter()
                        .map(|(column, value)| Ok((column.to_string(), serde_json::to_value(value)?)))
                        .collect::<Result<_, serde_json::Error>>()
                })
                .collect::<Result<_, _>>()?;
            println!("{}", serde_json::to_string_pretty(&records)?);
            eprintln!("({} row(s))", rows.len());
        }
        QueryResult::Affected(n) => println!("({} row(s) affected)", n),
    }
    if save {
        session.close()?;
    } else {
        session.discard();
    }
    Ok(())
}

fn list_tables(config: StoreConfig) -> anyhow::Result<()> {
    let session = open(config)?;
    for table in session.table_names()? {
        let count = session
            .execute_raw(&format!("SELECT COUNT(*) FROM {}", table))?
            .into_rows()
            .scalar()
            .and_then(taskdb::Value::as_i64)
            .unwrap_or(0);
        println!("{:<20} {:>8}", table, count);
    }
    session.discard();
    Ok(())
}

fn backup_store(config: StoreConfig, dest: &Path) -> anyhow::Result<()> {
    let session = open(config)?;
    session
        .save_to(dest)
        .with_context(|| format!("writing {}", dest.display()))?;
    println!("Backed up {} to {}", session.path().display(), dest.display());
    session.discard();
    Ok(())
}

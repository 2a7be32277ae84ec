use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use oplog::cli::{
    handle_diff, handle_export, handle_history, handle_list, handle_record, handle_show, DiffArgs,
    ExportArgs, ListArgs, PageArgs, RecordArgs,
};
use oplog::config::{OplogPaths, Settings};
use oplog::storage::SqliteStore;

#[derive(Parser)]
#[command(
    name = "oplog",
    version,
    about = "Operation log for REST write paths",
    long_about = "oplog records who created, updated or deleted which object, when, \
                  and which fields changed. This binary initializes the log, \
                  browses and exports it, and records changes from JSON snapshots."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the settings file and database
    Init,

    /// Show current configuration and paths
    Config,

    /// List log entries, newest first
    #[command(alias = "ls")]
    List(ListArgs),

    /// Show one entry with its field changes
    Show {
        /// Entry id or unique prefix (e.g. log-1a2b3c4d)
        id: String,
    },

    /// Show the change history of one object
    History {
        /// Model name
        model: String,
        /// Object id
        object: String,
        #[command(flatten)]
        paging: PageArgs,
    },

    /// Preview the changes between two JSON snapshots
    Diff(DiffArgs),

    /// Log a change from JSON snapshots
    Record(RecordArgs),

    /// Export entries to CSV, JSON or YAML
    Export(ExportArgs),
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let paths = OplogPaths::new()?;
    let settings = Settings::load_or_create(&paths)?;

    match cli.command {
        Some(Commands::Init) => {
            println!("Initializing oplog at: {}", paths.base_dir().display());
            paths.ensure_directories()?;
            if !paths.is_initialized() {
                settings.save(&paths)?;
            }
            SqliteStore::open(paths.database_file())?;
            println!("Initialization complete!");
            println!();
            println!("Settings: {}", paths.settings_file().display());
            println!("Database: {}", paths.database_file().display());
        }
        Some(Commands::Config) => {
            println!("oplog Configuration");
            println!("===================");
            println!("Base directory: {}", paths.base_dir().display());
            println!("Database:       {}", paths.database_file().display());
            println!("JSONL log:      {}", paths.jsonl_file().display());
            println!();
            println!("Settings:");
            println!("  Persistence enabled: {}", settings.persistence.enabled);
            println!("  Database sink:       {}", settings.persistence.database);
            println!("  JSONL sink:          {}", settings.persistence.jsonl);
            println!("  Tracing sink:        {}", settings.persistence.tracing);
            println!("  Delivery:            {:?}", settings.delivery);
            println!("  Missing fields:      {:?}", settings.missing_fields);
            println!("  Suppress empty:      {}", settings.suppress_empty_changes);
            println!("  Configured models:   {}", settings.models.len());
        }
        Some(Commands::List(args)) => {
            let store = open_store(&paths)?;
            handle_list(&store, args)?;
        }
        Some(Commands::Show { id }) => {
            let store = open_store(&paths)?;
            handle_show(&store, &settings, &id)?;
        }
        Some(Commands::History {
            model,
            object,
            paging,
        }) => {
            let store = open_store(&paths)?;
            handle_history(&store, &settings, &model, &object, paging)?;
        }
        Some(Commands::Diff(args)) => handle_diff(&settings, args)?,
        Some(Commands::Record(args)) => handle_record(&paths, &settings, args)?,
        Some(Commands::Export(args)) => {
            let store = open_store(&paths)?;
            handle_export(&store, args)?;
        }
        None => {
            println!("oplog - operation log for REST write paths");
            println!();
            println!("Run 'oplog --help' for usage information.");
        }
    }

    Ok(())
}

fn open_store(paths: &OplogPaths) -> Result<SqliteStore> {
    paths.ensure_directories()?;
    Ok(SqliteStore::open(paths.database_file())?)
}

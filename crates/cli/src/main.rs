use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use cli::{fatal, Store};
use dbimage::{Geometry, DEFAULT_MAX_DATA, DEFAULT_MAX_ROWS};
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "slotdb", version, about = "Fixed-slot address database in a single file")]
struct Cli {
    /// fsync the file after every write
    #[arg(long, global = true)]
    sync: bool,

    /// Database file
    path: PathBuf,

    #[command(subcommand)]
    verb: Verb,
}

#[derive(Subcommand, Debug)]
enum Verb {
    /// Create or truncate the database with every slot empty
    #[command(name = "c", visible_alias = "create")]
    Create {
        /// Bytes per text field, terminator included
        #[arg(long, default_value_t = DEFAULT_MAX_DATA)]
        max_data: u32,
        /// Number of slots
        #[arg(long, default_value_t = DEFAULT_MAX_ROWS)]
        max_rows: u32,
    },
    /// Print one record
    #[command(name = "g", visible_alias = "get")]
    Get { id: u32 },
    /// Store a record in an empty slot
    #[command(name = "s", visible_alias = "set")]
    Set { id: u32, name: String, email: String },
    /// Empty a slot
    #[command(name = "d", visible_alias = "delete")]
    Delete { id: u32 },
    /// Print every occupied slot
    #[command(name = "l", visible_alias = "list")]
    List {
        /// Also report empty slots
        #[arg(short, long)]
        verbose: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .init();
}

fn main() {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            if let Err(err) = e.print() {
                fatal::die(anyhow::Error::from(err).context("failed to print usage"), None)
            }
            // --help / --version
            if !e.use_stderr() {
                return;
            }
            fatal::die(anyhow!("invalid invocation, see --help"), None)
        }
    };

    let mut store = match open(&cli) {
        Ok(store) => store,
        Err(e) => fatal::die(e, None),
    };

    if let Err(e) = run(&mut store, cli.verb) {
        fatal::die(e, Some(store.connection_mut()));
    }
    store.close();
}

fn open(cli: &Cli) -> Result<Store> {
    debug!(path = %cli.path.display(), verb = ?cli.verb, "opening database");
    let store = match cli.verb {
        Verb::Create { max_data, max_rows } => {
            Store::create(&cli.path, Geometry::new(max_data, max_rows)?, cli.sync)?
        }
        _ => Store::open(&cli.path, cli.sync)?,
    };
    Ok(store)
}

fn run(store: &mut Store, verb: Verb) -> Result<()> {
    let mut out = io::stdout().lock();
    match verb {
        // Already created and written by `open`.
        Verb::Create { .. } => {}
        Verb::Get { id } => {
            store.check_id(id)?;
            writeln!(out, "{}", store.get(id)?)?;
        }
        Verb::Set { id, name, email } => {
            store.check_id(id)?;
            store.set(id, &name, &email)?;
        }
        Verb::Delete { id } => {
            store.check_id(id)?;
            store.delete(id)?;
        }
        Verb::List { verbose } => {
            for line in store.list(verbose) {
                writeln!(out, "{}", line)?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

//! Command line front end for the article writer
//!
//! Usage:
//!   mifare-writer readers
//!   mifare-writer write-driver "Alice Johnson"
//!   mifare-writer write-articles "Coffee:2" "Tea:5"
//!   mifare-writer scan --catalog catalog.json 0210462016561 0004859272
//!
//! `RUST_LOG=debug` shows every reader transaction.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use mifare_writer::card::BlockAddress;
use mifare_writer::transport::{CardTransport, MemoryCard, TimedTransport, SIMULATED_READER};
use mifare_writer::{
    read_driver_info, write_articles, write_driver_info, ArticleRecord, CardSession, Inventory,
    WriteResult, WriteSummary, WriterConfig,
};

type Transport = TimedTransport<Box<dyn CardTransport + Send>>;

#[derive(Parser, Debug)]
#[command(name = "mifare-writer", version, about = "Write driver and article data to MIFARE Classic cards", long_about = None)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Reader to use instead of the configured one
    #[arg(short, long, global = true)]
    reader: Option<String>,

    /// Use an in-memory card instead of a reader
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(flatten)]
    Card(CardCommand),
    /// Show or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Commands that talk to a reader
#[derive(Subcommand, Debug)]
enum CardCommand {
    /// List connected readers
    Readers,
    /// Read and print one block
    Read {
        block: BlockAddress,
    },
    /// Print the driver name stored in blocks 1 and 2
    ReadDriver,
    /// Store a driver name (up to 32 characters) in blocks 1 and 2
    WriteDriver {
        name: String,
    },
    /// Write article records, one block each
    WriteArticles {
        /// First block of the article area
        #[arg(short, long)]
        start: Option<BlockAddress>,

        /// Records as name:quantity
        #[arg(required = true)]
        records: Vec<ArticleRecord>,
    },
    /// Resolve scanned tags through a catalog, then write the aggregated articles
    Scan {
        /// JSON object mapping tag to article name
        #[arg(long)]
        catalog: PathBuf,

        /// First block of the article area
        #[arg(short, long)]
        start: Option<BlockAddress>,

        #[arg(required = true)]
        tags: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a default config file
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(WriterConfig::default_path);

    let command = match cli.command {
        Commands::Config { action } => return run_config(&action, &config_path),
        Commands::Card(command) => command,
    };

    let mut config = WriterConfig::load(&config_path);
    if cli.simulate {
        config.reader_name = SIMULATED_READER.to_string();
    }
    if let Some(reader) = &cli.reader {
        config.reader_name = reader.clone();
    }
    config
        .validate()
        .with_context(|| format!("invalid configuration in {}", config_path.display()))?;

    let mut session = open_session(&config, cli.simulate)?;

    match command {
        CardCommand::Readers => {
            let readers = session.available_readers()?;
            if readers.is_empty() {
                println!("No readers found");
            }
            for reader in readers {
                println!("{}", reader);
            }
        }
        CardCommand::Read { block } => {
            session.connect()?;
            println!("Block {}: {}", block, session.read_block_text(block));
        }
        CardCommand::ReadDriver => {
            session.connect()?;
            match read_driver_info(&mut session) {
                Ok(name) => println!("Driver: {}", name),
                Err(e) => bail!("{}", e),
            }
        }
        CardCommand::WriteDriver { name } => {
            session.connect()?;
            if name.chars().count() > mifare_writer::writer::DRIVER_NAME_MAX_CHARS {
                warn!("Driver name longer than 32 characters will be cut");
            }
            if !write_driver_info(&mut session, &name) {
                bail!("driver name was not written completely");
            }
            println!("Driver info written");
        }
        CardCommand::WriteArticles { start, records } => {
            let start = start.unwrap_or(config.start_block);
            warn_if_over_capacity(&config, start, records.len());
            session.connect()?;
            let results = write_articles(&mut session, &records, start);
            report(&results)?;
        }
        CardCommand::Scan {
            catalog,
            start,
            tags,
        } => {
            let catalog = load_catalog(&catalog)?;
            let mut inventory = Inventory::new();
            for tag in &tags {
                if inventory.scan(tag, &catalog).is_none() {
                    println!("Unknown tag: {}", tag.trim());
                }
            }
            if inventory.is_empty() {
                bail!("no known articles scanned");
            }
            info!(
                "{} articles, {} items",
                inventory.unique_count(),
                inventory.total_items()
            );

            let start = start.unwrap_or(config.start_block);
            warn_if_over_capacity(&config, start, inventory.unique_count());
            session.connect()?;
            let results = write_articles(&mut session, &inventory, start);
            report(&results)?;
        }
    }

    session.close();
    Ok(())
}

fn open_session(config: &WriterConfig, simulate: bool) -> Result<CardSession<Transport>> {
    let inner: Box<dyn CardTransport + Send> = if simulate {
        Box::new(MemoryCard::with_layout(SIMULATED_READER, config.layout()))
    } else {
        native_transport(config)?
    };
    let transport = TimedTransport::new(inner, config.timeout())
        .context("failed to start card I/O thread")?;

    Ok(CardSession::new(
        transport,
        config.reader_name.clone(),
        config.authentication_key()?,
    )
    .with_layout(config.layout()))
}

#[cfg(feature = "pcsc")]
fn native_transport(_config: &WriterConfig) -> Result<Box<dyn CardTransport + Send>> {
    Ok(Box::new(mifare_writer::transport::PcscTransport::new()))
}

#[cfg(all(not(feature = "pcsc"), unix))]
fn native_transport(config: &WriterConfig) -> Result<Box<dyn CardTransport + Send>> {
    let library = mifare_writer::LibCard::open(&config.library_path)
        .context("failed to load card library")?;
    Ok(Box::new(library))
}

#[cfg(all(not(feature = "pcsc"), not(unix)))]
fn native_transport(_config: &WriterConfig) -> Result<Box<dyn CardTransport + Send>> {
    bail!("no card transport on this platform; build with --features pcsc")
}

fn warn_if_over_capacity(config: &WriterConfig, start: BlockAddress, records: usize) {
    let capacity = config.layout().writable_from(start);
    if records > capacity {
        warn!(
            "{} articles but only {} data blocks from block {}; the rest will fail",
            records, capacity, start
        );
    }
}

fn load_catalog(path: &Path) -> Result<HashMap<String, String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse catalog {}", path.display()))
}

fn report(results: &[WriteResult]) -> Result<()> {
    for result in results {
        println!("{}", result);
    }
    let summary = WriteSummary::from(results);
    println!("{}", summary);
    if !summary.all_written() {
        bail!("{} of {} articles failed", summary.total - summary.written, summary.total);
    }
    Ok(())
}

fn run_config(action: &ConfigAction, path: &Path) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = WriterConfig::load(path);
            println!("# {}", path.display());
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to replace it)", path.display());
            }
            WriterConfig::default().save(path)?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

mod database;
mod error;
mod extract;
mod fs;
mod ingest;
mod media;
mod resolve;
mod utils;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::database::index::IndexStore;
use crate::extract::{ExtractorRegistry, Metadata};
use crate::fs::{MountSettings, TagFs};
use crate::ingest::Scanner;
use crate::media::{ContentClassifier, InferClassifier};
use crate::resolve::{EntryKind, Resolution, Resolver};
use crate::utils::config::TagFsConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "Browse a directory tree by document metadata", long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index SOURCE and mount the tag tree at MOUNTPOINT
    Mount {
        source: PathBuf,
        mountpoint: PathBuf,
        /// Mount options, comma separated
        #[arg(short = 'o', value_name = "OPTIONS")]
        options: Vec<String>,
        #[arg(long)]
        allow_other: bool,
        #[arg(long)]
        auto_unmount: bool,
    },
    /// Index SOURCE and print what a virtual path denotes
    Query {
        source: PathBuf,
        #[arg(default_value = "/")]
        path: String,
    },
    /// Print the metadata of a single file
    Show { file: PathBuf },
    /// Write metadata into a file; an empty value removes the key
    Set {
        file: PathBuf,
        #[arg(value_name = "KEY=VALUE", required = true)]
        pairs: Vec<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let config = TagFsConfig::load(args.config.as_deref())?;
    let registry = ExtractorRegistry::with_tools(&config.tools);

    match args.command {
        Command::Mount {
            source,
            mountpoint,
            options,
            allow_other,
            auto_unmount,
        } => {
            let source = absolute(&source)?;
            let store = build_index(&source, &registry, &config)?;
            let settings = MountSettings {
                fs_name: config.fs_name.clone(),
                options,
                allow_other,
                auto_unmount,
            };
            fs::mount(TagFs::new(store, &source, config.ttl()), &mountpoint, &settings)
        }
        Command::Query { source, path } => {
            let source = absolute(&source)?;
            let store = build_index(&source, &registry, &config)?;
            print_query(&store, &path)
        }
        Command::Show { file } => {
            for (key, value) in read_metadata(&file, &registry)? {
                println!("{}: {}", key, value);
            }
            Ok(())
        }
        Command::Set { file, pairs } => {
            let mut metadata = read_metadata(&file, &registry)?;
            for pair in &pairs {
                let (key, value) = parse_pair(pair)?;
                if value.is_empty() {
                    metadata.remove(key);
                } else {
                    metadata.insert(key.to_string(), value.to_string());
                }
            }
            let mime = InferClassifier.classify(&file);
            registry
                .apply(&file, &mime, &metadata)
                .with_context(|| format!("Failed to write metadata to {:?}", file))?;
            info!("Updated {} keys in {:?}", pairs.len(), file);
            Ok(())
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(cwd.join(path))
}

fn build_index(source: &Path, registry: &ExtractorRegistry, config: &TagFsConfig) -> Result<IndexStore> {
    if !source.is_dir() {
        bail!("Source {:?} is not a directory", source);
    }
    let mut store = IndexStore::open_in_memory().context("Failed to open index")?;
    let summary = Scanner::new(&InferClassifier, registry, config)
        .scan_directory(source, &mut store)
        .context("Failed to index source")?;
    info!(
        "Indexed {} of {} files, {} links",
        summary.files_indexed,
        summary.files_seen,
        store.link_count()?
    );
    Ok(store)
}

fn print_query(store: &IndexStore, path: &str) -> Result<()> {
    let resolver = Resolver::new(store);
    match resolver.resolve(path)? {
        Resolution::Link(file) => println!("{}", file.real_path.display()),
        Resolution::Root | Resolution::Directory(_) => {
            for entry in resolver.list(path)? {
                match entry.kind {
                    EntryKind::File => {
                        let child = format!("{}/{}", path.trim_end_matches('/'), entry.name);
                        println!("{} -> {}", entry.name, resolver.read_link(&child)?.display());
                    }
                    EntryKind::Attribute | EntryKind::Value => println!("{}/", entry.name),
                }
            }
        }
    }
    Ok(())
}

fn read_metadata(file: &Path, registry: &ExtractorRegistry) -> Result<Metadata> {
    let mime = InferClassifier.classify(file);
    registry
        .extract(file, &mime)
        .with_context(|| format!("Failed to read metadata from {:?} ({})", file, mime))
}

fn parse_pair(pair: &str) -> Result<(&str, &str)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value.trim())),
        _ => bail!("Expected KEY=VALUE, got {:?}", pair),
    }
}

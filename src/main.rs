//! cask CLI - command line interface for blobcask
//!
//! Stores and retrieves blobs against any registered backend. Metadata is
//! handed to the store as raw JSON bytes, so what `meta` prints is exactly
//! what `put --meta` was given.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use blobcask::{IdGenerator, Store, TimeOrderedIds};

#[derive(Parser)]
#[command(name = "cask")]
#[command(about = "A driver-pluggable blob store with an integrity-checked envelope")]
#[command(version)]
struct Cli {
    /// Store location, e.g. file:///var/data/blobs or mem://
    #[arg(short, long, default_value = "file://./blobs")]
    store: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a file (or stdin) as a new blob
    Put {
        /// File to store; reads stdin when omitted
        file: Option<PathBuf>,
        /// Use this id instead of generating one
        #[arg(short, long)]
        id: Option<String>,
        /// Metadata as a JSON document
        #[arg(short, long)]
        meta: Option<String>,
    },

    /// Read a blob's payload
    Get {
        /// The blob id
        id: String,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print a blob's metadata as JSON
    Meta {
        /// The blob id
        id: String,
    },

    /// Print a blob's envelope summary
    Stat {
        /// The blob id
        id: String,
    },

    /// Delete a blob
    Rm {
        /// The blob id
        id: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let store = Store::open_default(&cli.store)?;

    match cli.command {
        Commands::Put { file, id, meta } => {
            let data = match file {
                Some(path) => fs::read(&path)?,
                None => {
                    let mut buf = Vec::new();
                    io::stdin().read_to_end(&mut buf)?;
                    buf
                }
            };
            let meta_bytes = match &meta {
                Some(json) => {
                    // Validate, then store the JSON text itself.
                    serde_json::from_str::<serde_json::Value>(json)?;
                    Some(json.as_bytes())
                }
                None => None,
            };
            let id = match id {
                Some(id) => id,
                None => TimeOrderedIds.generate(),
            };
            let mut wfile = store.create_id_raw(&id, meta_bytes)?;
            wfile.write_all(&data)?;
            wfile.close()?;
            println!(
                "{}",
                serde_json::json!({ "status": "ok", "id": id, "bytes": data.len() })
            );
        }

        Commands::Get { id, output } => {
            let data = store.read_all(&id)?;
            match output {
                Some(path) => fs::write(&path, &data)?,
                None => io::stdout().write_all(&data)?,
            }
        }

        Commands::Meta { id } => {
            let mut rfile = store.open_blob(&id)?;
            if rfile.metadata().is_empty() {
                println!("null");
            } else {
                let value: serde_json::Value = serde_json::from_slice(rfile.metadata())?;
                println!("{value}");
            }
            rfile.close()?;
        }

        Commands::Stat { id } => {
            let mut rfile = store.open_blob(&id)?;
            println!(
                "{}",
                serde_json::json!({
                    "id": id,
                    "data_length": rfile.len(),
                    "metadata_length": rfile.metadata().len(),
                })
            );
            rfile.close()?;
        }

        Commands::Rm { id } => {
            store.remove(&id)?;
            println!("{}", serde_json::json!({ "status": "ok", "id": id }));
        }
    }

    store.close()?;
    Ok(())
}

//! FQ - file-queue CLI
//!
//! Thin wrapper over the library: supplies the database root and invokes
//! the public queue operations. Popped payloads are written raw to
//! stdout so binary items survive a pipe.

use anyhow::Context;
use clap::{Parser, Subcommand};
use file_queue::FileQueue;
use std::io::{Read, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fq")]
#[command(version)]
#[command(about = "Persistent file-backed keyed queue", long_about = None)]
struct Cli {
    /// Database root directory
    #[arg(long, short = 'r')]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Push a payload onto a key (argument, or stdin when omitted)
    Push {
        /// Key name
        key: String,
        /// Payload text; read from stdin when omitted
        payload: Option<String>,
    },
    /// Pop the most recently pushed item and write it to stdout
    Pop {
        /// Key name
        key: String,
    },
    /// Print the number of items stored under a key
    Count {
        /// Key name
        key: String,
    },
    /// Delete a key with all of its items
    Remove {
        /// Key name
        key: String,
    },
    /// Delete every key in the database
    RemoveAll,
    /// List keys present in the database
    Keys,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut queue = FileQueue::new(&cli.root)
        .with_context(|| format!("failed to open queue database at {}", cli.root.display()))?;

    match cli.command {
        Commands::Push { key, payload } => {
            let payload = match payload {
                Some(text) => text.into_bytes(),
                None => {
                    let mut buffer = Vec::new();
                    std::io::stdin().read_to_end(&mut buffer)?;
                    buffer
                }
            };
            queue.push(&key, &payload)?;
        }
        Commands::Pop { key } => match queue.pop(&key)? {
            Some(payload) => std::io::stdout().write_all(&payload)?,
            None => {
                eprintln!("(empty)");
                std::process::exit(1);
            }
        },
        Commands::Count { key } => println!("{}", queue.count(&key)?),
        Commands::Remove { key } => {
            if !queue.remove(&key)? {
                eprintln!("unknown key: {}", key);
                std::process::exit(1);
            }
        }
        Commands::RemoveAll => queue.remove_all()?,
        Commands::Keys => {
            for key in queue.keys() {
                println!("{}", key);
            }
        }
    }

    Ok(())
}

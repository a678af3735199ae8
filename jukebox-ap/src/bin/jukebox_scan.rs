//! Scan a directory tree for mp3 files
//!
//! Without `--db`, prints one line per file found. With `--db`, stores the
//! tags in the catalog, creating the database if needed.

use anyhow::{bail, Context, Result};
use clap::Parser;
use jukebox_common::db::{init_database, Catalog};
use jukebox_common::scan::{scan_mp3s, scan_to_db, track_record};
use jukebox_common::tags::dump_tags;
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "jukebox-scan")]
#[command(about = "Update an mp3 database with tags found under a directory tree")]
#[command(version)]
struct Args {
    /// If set, store data in this database
    #[arg(long, env = "JUKEBOX_DB")]
    db: Option<PathBuf>,

    /// Print out all tag information contained in the files
    #[arg(long)]
    dump: bool,

    /// Directory to scan
    dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jukebox_common=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    if !args.dir.is_dir() {
        bail!("{} is not a directory", args.dir.display());
    }

    match args.db {
        Some(db) => scan_into(&db, &args.dir).await,
        None => {
            list(&args.dir, args.dump);
            Ok(())
        }
    }
}

fn list(dir: &std::path::Path, dump: bool) {
    for path in scan_mp3s(dir) {
        if dump {
            println!("==== {}", path.display());
            match dump_tags(&path) {
                Ok(items) => {
                    for (key, value) in items {
                        println!("{}: {}", key, value);
                    }
                }
                Err(e) => println!("Reading tags failed: {}", e),
            }
            println!();
        } else {
            let record = track_record(&path);
            println!(
                "    {{artist: \"{}\", album: \"{}\", title: \"{}\", path: \"{}\"}},",
                record.artist, record.album, record.title, record.path
            );
        }
    }
}

async fn scan_into(db: &std::path::Path, dir: &std::path::Path) -> Result<()> {
    println!("Will output to database {}", db.display());
    if !db.exists() {
        println!("Creating database");
    }
    let pool = init_database(db, 1)
        .await
        .with_context(|| format!("Error opening database {}", db.display()))?;
    let catalog = Catalog::new(pool);

    let mut last_len = 0;
    let counts = scan_to_db(dir, &catalog, |record, err| {
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "\r{}\r{}", " ".repeat(last_len), record.path);
        if let Some(e) = err {
            let _ = write!(out, "\n  storing failed: {}\n", e);
        }
        let _ = out.flush();
        last_len = record.path.chars().count();
    })
    .await
    .context("Scan failed")?;

    println!("\r{}\r{} stored, {} failed", " ".repeat(last_len), counts.stored, counts.failed);
    catalog.pool().close().await;
    Ok(())
}

//! Query the mp3 catalog from the command line

use anyhow::{Context, Result};
use clap::Parser;
use jukebox_common::db::{open_database, Catalog, Paging, Query};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "jukebox-query")]
#[command(about = "Query the mp3 database")]
#[command(version)]
struct Args {
    /// Database containing mp3 info
    #[arg(long, default_value = "mp3.db", env = "JUKEBOX_DB")]
    db: PathBuf,

    /// Artist search criteria
    #[arg(long, default_value = "")]
    artist: String,

    /// Album search criteria
    #[arg(long, default_value = "")]
    album: String,

    /// Title search criteria
    #[arg(long, default_value = "")]
    title: String,

    /// Only output the specified field (artist, album, title, tracknum or path)
    #[arg(long)]
    field: Option<String>,

    /// The page of results to return. All results when absent.
    #[arg(long)]
    page: Option<u32>,

    /// Size of a page
    #[arg(long, default_value_t = 10)]
    page_size: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let pool = open_database(&args.db, Duration::ZERO, 1)
        .await
        .with_context(|| format!("Error opening database {}", args.db.display()))?;
    let catalog = Catalog::new(pool);

    let mut filter = BTreeMap::new();
    filter.insert("artist".to_string(), args.artist);
    filter.insert("album".to_string(), args.album);
    filter.insert("title".to_string(), args.title);

    let fields = match &args.field {
        Some(field) => vec![field.clone()],
        None => ["artist", "album", "title", "path"].map(String::from).to_vec(),
    };

    let query = Query {
        fields,
        filter,
        order: ["artist", "album", "title"].map(String::from).to_vec(),
        paging: args.page.map(|page| Paging {
            page_size: args.page_size,
            page,
        }),
    };

    let page = catalog.find(&query).await.context("Query failed")?;

    for record in &page.records {
        match &args.field {
            Some(field) => println!("{}", record.get(field).map(String::as_str).unwrap_or("")),
            None => {
                let get = |key: &str| record.get(key).map(String::as_str).unwrap_or("");
                println!(
                    "    {{artist: \"{}\", album: \"{}\", title: \"{}\", path: \"{}\"}},",
                    get("artist"),
                    get("album"),
                    get("title"),
                    get("path")
                );
            }
        }
    }
    if page.eof {
        println!("<final page>");
    }

    catalog.pool().close().await;
    Ok(())
}

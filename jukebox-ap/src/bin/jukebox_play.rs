//! Play one mp3 file from the command line
//!
//! Space (then Enter) toggles pause, `q` quits. Exits when the track ends.

use anyhow::{Context, Result};
use clap::Parser;
use jukebox_ap::audio::NativeBackend;
use jukebox_ap::playback::{Event, Player, PlayerState, DEFAULT_EVENT_CAPACITY};
use jukebox_common::tags::read_tags;
use std::io::Read;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "jukebox-play")]
#[command(about = "Play an mp3 file")]
#[command(version)]
struct Args {
    /// The mp3 file to play
    file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jukebox_ap=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    match read_tags(&args.file) {
        Ok(tags) => {
            println!("Title:    '{}'", tags.title);
            println!("Artist:   '{}'", tags.artist);
            println!("Album:    '{}'", tags.album);
            println!("Tracknum: '{}'", tags.tracknum);
        }
        Err(e) => println!("Reading tags failed: {}", e),
    }

    let (player, mut events) = Player::spawn(Box::new(NativeBackend::new()), DEFAULT_EVENT_CAPACITY)
        .context("Starting player failed")?;

    match player.volume().await {
        Ok(volume) => println!("Volume is {}", volume),
        Err(e) => println!("Getting volume failed: {}", e),
    }

    let size = player
        .load(args.file.to_string_lossy())
        .await
        .context("Loading mp3 failed")?;
    println!("{} samples", size);
    player.play().await.context("Playing failed")?;

    let (key_tx, mut keys) = mpsc::channel(1);
    std::thread::spawn(move || {
        let mut stdin = std::io::stdin();
        let mut b = [0u8; 1];
        while let Ok(1) = stdin.read(&mut b) {
            if key_tx.blocking_send(b[0]).is_err() {
                break;
            }
        }
    });

    let mut playing = true;
    loop {
        tokio::select! {
            key = keys.recv() => {
                match key {
                    Some(b' ') => {
                        if playing {
                            println!("Pause");
                            player.pause().await?;
                        } else {
                            println!("Play");
                            player.play().await?;
                        }
                        playing = !playing;
                    }
                    Some(b'q') | None => break,
                    Some(_) => {}
                }
            }
            event = events.recv() => {
                match event {
                    Some(Event::StateChange(PlayerState::Empty)) | None => break,
                    Some(Event::Error(msg)) => println!("Error: {}", msg),
                    Some(_) => {}
                }
            }
        }
    }

    player.stop().await?;
    Ok(())
}

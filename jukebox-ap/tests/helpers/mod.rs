//! Test helpers for jukebox-ap integration tests
//!
//! - MockBackend: scripted audio backend that needs no sound hardware
//! - Event helpers with timeouts, so a broken worker fails a test instead of
//!   hanging it
//! - TestContext: a full application context over an in-memory catalog

#![allow(dead_code)]

pub mod mock_backend;

pub use mock_backend::{MockBackend, MockScript};

use jukebox_ap::config::Config;
use jukebox_ap::playback::{Event, PlayerState};
use jukebox_ap::AppContext;
use jukebox_common::db::{init_memory_database, Catalog, TrackRecord};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Upper bound for anything a test waits on
pub const LIMIT: Duration = Duration::from_secs(5);

/// Next event, failing the test after [`LIMIT`]
pub async fn next_event(rx: &mut mpsc::Receiver<Event>) -> Event {
    timeout(LIMIT, rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event stream closed")
}

/// Next state change, skipping other events
pub async fn next_state(rx: &mut mpsc::Receiver<Event>) -> PlayerState {
    loop {
        if let Event::StateChange(state) = next_event(rx).await {
            return state;
        }
    }
}

/// Every event that arrives within `quiet`
pub async fn drain_events(rx: &mut mpsc::Receiver<Event>, quiet: Duration) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(Some(event)) = timeout(quiet, rx.recv()).await {
        events.push(event);
    }
    events
}

/// Poll `check` until it returns true, failing the test after [`LIMIT`]
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let waited = timeout(LIMIT, async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "condition not met in time");
}

pub const PREFIX: &str = "/music";

/// A running application context over an in-memory catalog
pub struct TestContext {
    pub ctx: AppContext,
    pub script: Arc<Mutex<MockScript>>,
    /// Holds the scan database
    pub dir: TempDir,
}

pub fn track(path: &str, artist: &str, album: &str, title: &str, tracknum: i64) -> TrackRecord {
    TrackRecord {
        path: path.to_string(),
        artist: artist.to_string(),
        album: album.to_string(),
        title: title.to_string(),
        tracknum,
    }
}

/// Start a context whose catalog holds `tracks`
pub async fn start_context(script: MockScript, tracks: &[TrackRecord]) -> TestContext {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        db_path: dir.path().join("scan.db"),
        prefix: PREFIX.to_string(),
        ..Default::default()
    };

    let pool = init_memory_database().await.unwrap();
    let catalog = Catalog::new(pool.clone());
    for t in tracks {
        catalog.upsert(t).await.unwrap();
    }

    let (backend, script) = MockBackend::new(script);
    let ctx = AppContext::start(&config, Box::new(backend), pool).await.unwrap();

    TestContext { ctx, script, dir }
}

/// The catalog used by most context tests
pub fn sample_tracks() -> Vec<TrackRecord> {
    vec![
        track("rock/a.mp3", "Alpha", "First", "One", 1),
        track("rock/b.mp3", "alpha", "First", "Two", 2),
        track("jazz/c.mp3", "Beta", "Second", "Three", 1),
    ]
}

//! Background catalog scans
//!
//! [`ScanService`] owns the "currently scanning" flag, so at most one scan runs
//! at a time. A scan uses its own single-connection pool, separate from the
//! pool serving requests.
//!
//! While scanning, at most one scanned record per second is published on the
//! scan event stream as `Some(record)`, followed by `None` when the scan ends.

use crate::error::{Error, Result};
use jukebox_common::db::{init_database, Catalog, TrackRecord};
use jukebox_common::scan::scan_to_db;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};

/// Minimum interval between two published scan records
const SCAN_EVENT_PERIOD: Duration = Duration::from_secs(1);

enum Command {
    Start {
        dirs: Vec<PathBuf>,
        reply: oneshot::Sender<bool>,
    },
    IsScanning(oneshot::Sender<bool>),
}

/// Handle to the scan worker
#[derive(Clone)]
pub struct ScanService {
    commands: mpsc::Sender<Command>,
}

impl ScanService {
    /// Start the worker. Scans write to the database at `db_path` and publish
    /// progress on `events`.
    pub fn spawn(db_path: PathBuf, events: mpsc::Sender<Option<TrackRecord>>) -> Self {
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(run(rx, db_path, events));
        Self { commands: tx }
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| Error::Internal("scan worker stopped".to_string()))?;
        rx.await
            .map_err(|_| Error::Internal("scan worker dropped the request".to_string()))
    }

    /// Start scanning `dirs` in the background. Returns false, without
    /// starting anything, when a scan is already running.
    pub async fn start(&self, dirs: Vec<PathBuf>) -> Result<bool> {
        self.request(|reply| Command::Start { dirs, reply }).await
    }

    pub async fn is_scanning(&self) -> Result<bool> {
        self.request(Command::IsScanning).await
    }
}

async fn run(
    mut commands: mpsc::Receiver<Command>,
    db_path: PathBuf,
    events: mpsc::Sender<Option<TrackRecord>>,
) {
    let (done_tx, mut done_rx) = mpsc::channel::<()>(1);
    let mut scanning = false;

    loop {
        tokio::select! {
            cmd = commands.recv() => {
                match cmd {
                    Some(Command::Start { dirs, reply }) => {
                        if scanning {
                            info!("Scan requested while one is running, ignoring");
                            let _ = reply.send(false);
                            continue;
                        }
                        scanning = true;
                        let _ = reply.send(true);

                        let db_path = db_path.clone();
                        let events = events.clone();
                        let done = done_tx.clone();
                        tokio::spawn(async move {
                            scan_dirs(&db_path, dirs, &events).await;
                            let _ = events.send(None).await;
                            let _ = done.send(()).await;
                        });
                    }
                    Some(Command::IsScanning(reply)) => {
                        let _ = reply.send(scanning);
                    }
                    None => break,
                }
            }
            Some(()) = done_rx.recv() => {
                scanning = false;
            }
        }
    }
}

async fn scan_dirs(db_path: &std::path::Path, dirs: Vec<PathBuf>, events: &mpsc::Sender<Option<TrackRecord>>) {
    let pool = match init_database(db_path, 1).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Opening database for scan failed: {}", e);
            return;
        }
    };
    let catalog = Catalog::new(pool);

    let mut last_event: Option<Instant> = None;
    for dir in dirs {
        info!("Scanning {}", dir.display());

        let result = scan_to_db(&dir, &catalog, |record, _err| {
            if last_event.map_or(true, |at| at.elapsed() >= SCAN_EVENT_PERIOD) {
                // Progress only: a busy event stream skips this record.
                if events.try_send(Some(record.clone())).is_ok() {
                    last_event = Some(Instant::now());
                }
            }
        })
        .await;

        match result {
            Ok(counts) => info!(
                "Scan of {} complete: {} stored, {} failed",
                dir.display(),
                counts.stored,
                counts.failed
            ),
            Err(e) => error!("Scanning {} failed: {}", dir.display(), e),
        }
    }

    catalog.pool().close().await;
}

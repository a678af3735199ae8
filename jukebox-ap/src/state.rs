//! Application context and player event routing
//!
//! [`AppContext`] owns every long-lived component: the player, the queue,
//! the catalog, the scan service and the three event tees (player events,
//! scan events, repeat-mode changes). Handlers and WebSocket tasks receive a
//! clone of it.
//!
//! The event router is the only reader of the player's event stream. It keeps
//! the current track metadata and the recently played list up to date, then
//! forwards each event into the player events tee.

use crate::audio::AudioBackend;
use crate::config::Config;
use crate::error::Result;
use crate::playback::{Event, Player, PlayerState, PlayerStatus, Queue, Recent, RepeatMode};
use crate::prefix::Prefix;
use crate::scanner::ScanService;
use jukebox_common::db::{Catalog, Record, TrackRecord};
use jukebox_common::Tee;
use serde::Serialize;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

/// Buffer of the queue's subscription to player events
const QUEUE_EVENT_BUFFER: usize = 16;

/// Composite status sent to WebSocket clients on connect and whenever the
/// loaded track may have changed
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FullStatus {
    #[serde(flatten)]
    pub status: PlayerStatus,
    pub meta: Option<Record>,
    pub queue: Vec<Record>,
    pub recent: Vec<Record>,
    pub repeat_mode: String,
}

pub struct Inner {
    pub player: Player,
    pub queue: Queue,
    pub catalog: Catalog,
    pub prefix: Prefix,
    pub scanner: ScanService,
    /// Directories scanned by a full scan
    pub dirs: Vec<PathBuf>,

    /// Player and queue events, after routing
    pub player_events: Tee<Event>,
    /// `Some(record)` while scanning, `None` when a scan completes
    pub scan_events: Tee<Option<TrackRecord>>,
    /// The new mode, whenever it is set
    pub repeat_events: Tee<RepeatMode>,
    repeat_input: mpsc::Sender<RepeatMode>,

    /// Catalog metadata and decoder info of the loaded track
    pub meta: RwLock<Option<Record>>,
    pub repeat_mode: RwLock<RepeatMode>,
    pub recent: RwLock<Recent>,
}

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext(Arc<Inner>);

impl std::ops::Deref for AppContext {
    type Target = Inner;

    fn deref(&self) -> &Inner {
        &self.0
    }
}

impl AppContext {
    /// Start the player, queue, scan service and event router.
    ///
    /// `pool` serves requests; scans open their own connection to
    /// `config.db_path`.
    pub async fn start(config: &Config, backend: Box<dyn AudioBackend>, pool: SqlitePool) -> Result<Self> {
        let (player, player_rx) = Player::spawn(backend, config.event_capacity)?;

        let (player_events, player_events_in) = Tee::new();
        let queue_events = player_events.subscribe(QUEUE_EVENT_BUFFER).await;
        let queue = Queue::spawn(player.clone(), queue_events);

        let (scan_events, scan_events_in) = Tee::new();
        let scanner = ScanService::spawn(config.db_path.clone(), scan_events_in);

        let (repeat_events, repeat_input) = Tee::new();

        let ctx = AppContext(Arc::new(Inner {
            player,
            queue,
            catalog: Catalog::new(pool),
            prefix: Prefix::new(config.prefix.clone()),
            scanner,
            dirs: config.dirs.clone(),
            player_events,
            scan_events,
            repeat_events,
            repeat_input,
            meta: RwLock::new(None),
            repeat_mode: RwLock::new(RepeatMode::default()),
            recent: RwLock::new(Recent::new(config.max_recent)),
        }));

        tokio::spawn(route_player_events(ctx.clone(), player_rx, player_events_in));

        info!("Application context started");
        Ok(ctx)
    }

    /// Change the repeat mode, configure the player for it and notify
    /// subscribers
    pub async fn set_repeat_mode(&self, mode: RepeatMode) -> Result<()> {
        *self.repeat_mode.write().await = mode;
        self.player.set_repeat(mode.player_repeat()).await?;
        if self.repeat_input.send(mode).await.is_err() {
            warn!("Repeat mode tee is closed");
        }
        Ok(())
    }

    /// Catalog metadata for a playable path, with the prefix applied to the
    /// returned path. Unknown tracks get "?" placeholders.
    pub async fn lookup(&self, path: &str) -> Record {
        let catalog_path = self.prefix.remove(path);
        match self.catalog.find_by_path(&catalog_path).await {
            Ok(Some(track)) => {
                let mut record = track.to_record();
                record.insert("path".to_string(), self.prefix.apply(&track.path));
                record
            }
            Ok(None) => unknown_record(path),
            Err(e) => {
                error!("Looking up {} failed: {}", path, e);
                unknown_record(path)
            }
        }
    }

    /// Queue entries with catalog metadata and their `queueId`
    pub async fn queue_listing(&self) -> Result<Vec<Record>> {
        let mut listing = Vec::new();
        for elem in self.queue.list().await? {
            let mut record = self.lookup(&elem.filename).await;
            record.insert("queueId".to_string(), elem.id.to_string());
            listing.push(record);
        }
        Ok(listing)
    }

    /// Recently played tracks with catalog metadata, most recent first
    pub async fn recent_listing(&self) -> Vec<Record> {
        let paths = self.recent.read().await.paths();
        let mut listing = Vec::with_capacity(paths.len());
        for path in paths {
            listing.push(self.lookup(&path).await);
        }
        listing
    }

    pub async fn full_status(&self) -> Result<FullStatus> {
        let status = self.player.status().await?;
        Ok(FullStatus {
            status,
            meta: self.meta.read().await.clone(),
            queue: self.queue_listing().await?,
            recent: self.recent_listing().await,
            repeat_mode: self.repeat_mode.read().await.to_string(),
        })
    }

    /// Refresh `meta` for the track the player has loaded
    async fn refresh_meta(&self) -> Result<()> {
        let status = self.player.status().await?;
        debug!("Player changed to paused. Status is {:?}", status);

        let mut meta = if status.path.is_empty() {
            Record::new()
        } else {
            let catalog_path = self.prefix.remove(&status.path);
            match self.catalog.find_by_path(&catalog_path).await? {
                Some(track) => {
                    let mut record = track.to_record();
                    record.insert("path".to_string(), self.prefix.apply(&track.path));
                    record
                }
                None => {
                    error!("Loaded {}, but it is not in the catalog", status.path);
                    Record::new()
                }
            }
        };

        match self.player.info().await? {
            Some(info) => {
                meta.insert("bitrate".to_string(), info.bit_rate.to_string());
                meta.insert("rate".to_string(), info.sample_rate.to_string());
                meta.insert("duration".to_string(), info.duration.to_string());
                meta.insert("sec_per_sample".to_string(), info.seconds_per_sample.to_string());
            }
            None => error!("Getting loaded mp3 info failed"),
        }

        *self.meta.write().await = Some(meta);
        Ok(())
    }

    async fn track_state_change(&self, state: PlayerState) -> Result<()> {
        match state {
            PlayerState::Playing => {
                let status = self.player.status().await?;
                debug!("Holding '{}' for the recently played list", status.path);
                self.recent.write().await.hold(status.path);
            }
            PlayerState::Paused => self.refresh_meta().await?,
            PlayerState::Empty => {
                let held = self.recent.read().await.held().map(str::to_string);
                // A Load over a loaded track passes through Empty. The player
                // serializes queries behind that Load, so it already holds
                // the new track and the old one must not come back.
                let replaced = self.player.status().await?.state != PlayerState::Empty;
                if replaced {
                    debug!("Track replaced by a new load");
                } else if *self.repeat_mode.read().await == RepeatMode::RepeatAll {
                    if let Some(path) = held {
                        debug!("Repeat all: re-enqueuing {}", path);
                        self.queue.enqueue(path).await?;
                    }
                }
                self.recent.write().await.commit();
                *self.meta.write().await = None;
            }
        }
        Ok(())
    }
}

fn unknown_record(path: &str) -> Record {
    let mut record = Record::new();
    for field in ["artist", "album", "title"] {
        record.insert(field.to_string(), "?".to_string());
    }
    record.insert("path".to_string(), path.to_string());
    record
}

/// Read the player's events, update the context, and forward them into the
/// player events tee
async fn route_player_events(ctx: AppContext, mut events: mpsc::Receiver<Event>, out: mpsc::Sender<Event>) {
    while let Some(event) = events.recv().await {
        if let Event::StateChange(state) = &event {
            if let Err(e) = ctx.track_state_change(*state).await {
                error!("Handling state change to {} failed: {}", state, e);
            }
        }

        if out.send(event).await.is_err() {
            warn!("Player events tee is closed");
            break;
        }
    }

    info!("Player event stream ended");
}

//! Player: command-serialized playback state machine
//!
//! A single worker thread owns the decode/output session. Every query and
//! mutation is a [`Command`] sent over one channel, so commands never run
//! concurrently and each one sees a consistent state.
//!
//! **States:** `Empty` (initial), `Paused`, `Playing`.
//! - `Empty --Load--> Paused`, `Paused --Play--> Playing`,
//!   `Playing --Pause--> Paused`, `{Playing, Paused} --Stop--> Empty`
//! - Natural end of track: `Empty`, or back to sample 0 when repeat is on
//! - `Load` in a loaded state stops the current track first
//!
//! Each state change emits one `StateChange` after the change is complete.
//!
//! While playing, the worker drains all pending commands before decoding and
//! writing each block of audio, so commands never wait behind audio I/O.
//!
//! Events are sent with `try_send`. When the event channel is full the new
//! event is dropped; consumers resynchronize with [`Player::status`].

use crate::audio::{AudioBackend, AudioError, TrackReader, TrackWriter, VolumeTarget};
use crate::error::{Error, Result};
use crate::playback::types::{Event, Info, PlayerState, PlayerStatus};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Minimum interval between two `OffsetChange` events during playback
const OFFSET_EVENT_INTERVAL: Duration = Duration::from_millis(250);

/// Default capacity of the event channel
pub const DEFAULT_EVENT_CAPACITY: usize = 1000;

enum Command {
    Load {
        path: String,
        reply: oneshot::Sender<std::result::Result<i64, AudioError>>,
    },
    Play(oneshot::Sender<std::result::Result<(), AudioError>>),
    Pause,
    Stop,
    Seek {
        sample: i64,
        reply: oneshot::Sender<std::result::Result<(), AudioError>>,
    },
    SetVolume {
        percent: u8,
        target: VolumeTarget,
        reply: oneshot::Sender<std::result::Result<(), AudioError>>,
    },
    SetRepeat(bool),
    GetStatus(oneshot::Sender<PlayerStatus>),
    GetInfo(oneshot::Sender<Option<Info>>),
    GetVolume(oneshot::Sender<std::result::Result<u8, AudioError>>),
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Load { .. } => "Load",
            Command::Play(_) => "Play",
            Command::Pause => "Pause",
            Command::Stop => "Stop",
            Command::Seek { .. } => "Seek",
            Command::SetVolume { .. } => "SetVolume",
            Command::SetRepeat(_) => "SetRepeat",
            Command::GetStatus(_) => "GetStatus",
            Command::GetInfo(_) => "GetInfo",
            Command::GetVolume(_) => "GetVolume",
        }
    }
}

/// Non-blocking sender into the player's event stream.
///
/// The queue publishes `QueueChange` through a clone of this, so its events
/// share the player's ordering and drop policy.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
    dropped: Arc<AtomicU64>,
}

impl EventSender {
    /// Send without blocking. A full channel drops `event`.
    pub fn send(&self, event: Event) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                let n = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                debug!("Event channel full, dropped {:?} ({} dropped so far)", event, n);
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    /// Number of events dropped because the channel was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Handle to the player worker. Cheap to clone; all clones drive the same
/// worker, which exits once every handle is dropped.
#[derive(Clone)]
pub struct Player {
    commands: mpsc::Sender<Command>,
    events: EventSender,
}

impl Player {
    /// Start the worker thread.
    ///
    /// Returns the handle and the receiving end of the event stream, which
    /// buffers up to `event_capacity` events.
    pub fn spawn(backend: Box<dyn AudioBackend>, event_capacity: usize) -> Result<(Self, mpsc::Receiver<Event>)> {
        // Capacity 1 keeps callers in lockstep with the worker.
        let (cmd_tx, cmd_rx) = mpsc::channel(1);
        let (event_tx, event_rx) = mpsc::channel(event_capacity.max(1));

        let events = EventSender {
            tx: event_tx,
            dropped: Arc::new(AtomicU64::new(0)),
        };

        let worker_events = events.clone();

        // Readers and writers are not Send, so the worker is built on its own thread.
        std::thread::Builder::new()
            .name("player".to_string())
            .spawn(move || {
                Worker {
                    backend,
                    commands: cmd_rx,
                    events: worker_events,
                    state: PlayerState::Empty,
                    session: None,
                    repeat: false,
                    last_offset: None,
                    last_offset_at: None,
                }
                .run()
            })?;

        Ok((
            Self {
                commands: cmd_tx,
                events,
            },
            event_rx,
        ))
    }

    /// Sender for publishing into this player's event stream
    pub fn event_sender(&self) -> EventSender {
        self.events.clone()
    }

    async fn send(&self, cmd: Command) -> Result<()> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| Error::Player("player worker stopped".to_string()))
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx)).await?;
        rx.await
            .map_err(|_| Error::Player("player worker dropped the request".to_string()))
    }

    /// Load a track, stopping any current one. Leaves the player `Paused`.
    /// Returns the track length in samples.
    pub async fn load(&self, path: impl Into<String>) -> Result<i64> {
        let path = path.into();
        Ok(self.request(|reply| Command::Load { path, reply }).await??)
    }

    /// Start or resume playback. Does nothing when `Empty`.
    pub async fn play(&self) -> Result<()> {
        Ok(self.request(Command::Play).await??)
    }

    pub async fn pause(&self) -> Result<()> {
        self.send(Command::Pause).await
    }

    /// Unload the current track
    pub async fn stop(&self) -> Result<()> {
        self.send(Command::Stop).await
    }

    /// Move the playback position. Does nothing when `Empty`.
    pub async fn seek(&self, sample: i64) -> Result<()> {
        Ok(self.request(|reply| Command::Seek { sample, reply }).await??)
    }

    /// Set the volume of the player's output
    pub async fn set_volume(&self, percent: u8) -> Result<()> {
        Ok(self
            .request(|reply| Command::SetVolume {
                percent,
                target: VolumeTarget::Default,
                reply,
            })
            .await??)
    }

    /// Set the volume of every output
    pub async fn set_volume_all(&self, percent: u8) -> Result<()> {
        Ok(self
            .request(|reply| Command::SetVolume {
                percent,
                target: VolumeTarget::All,
                reply,
            })
            .await??)
    }

    /// Restart the track at its natural end instead of unloading it
    pub async fn set_repeat(&self, repeat: bool) -> Result<()> {
        self.send(Command::SetRepeat(repeat)).await
    }

    pub async fn status(&self) -> Result<PlayerStatus> {
        self.request(Command::GetStatus).await
    }

    /// Facts about the loaded track, `None` when `Empty`
    pub async fn info(&self) -> Result<Option<Info>> {
        self.request(Command::GetInfo).await
    }

    /// Current volume in percent
    pub async fn volume(&self) -> Result<u8> {
        Ok(self.request(Command::GetVolume).await??)
    }
}

/// The loaded track
struct Session {
    path: String,
    reader: Box<dyn TrackReader>,
    /// Closed while paused
    writer: Option<Box<dyn TrackWriter>>,
    info: Info,
    size: i64,
}

struct Worker {
    backend: Box<dyn AudioBackend>,
    commands: mpsc::Receiver<Command>,
    events: EventSender,
    state: PlayerState,
    /// `Some` exactly when `state` is not `Empty`
    session: Option<Session>,
    repeat: bool,
    last_offset: Option<u64>,
    last_offset_at: Option<Instant>,
}

impl Worker {
    fn run(mut self) {
        info!("Player worker started");

        loop {
            if self.state == PlayerState::Playing {
                if !self.drain_commands() {
                    break;
                }
                if self.state == PlayerState::Playing {
                    self.play_block();
                }
            } else {
                match self.commands.blocking_recv() {
                    Some(cmd) => self.handle(cmd),
                    None => break,
                }
            }
        }

        self.stop();
        info!("Player worker exiting");
    }

    /// Handle every pending command without blocking. Stops early when a
    /// command leaves the `Playing` state. Returns false once all handles are
    /// gone.
    fn drain_commands(&mut self) -> bool {
        loop {
            match self.commands.try_recv() {
                Ok(cmd) => {
                    self.handle(cmd);
                    if self.state != PlayerState::Playing {
                        return true;
                    }
                }
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn handle(&mut self, cmd: Command) {
        debug!("player: In state {}, got command {}", self.state, cmd.name());

        match cmd {
            Command::Load { path, reply } => {
                let result = self.load(path);
                let _ = reply.send(result);
            }
            Command::Play(reply) => {
                let result = self.play();
                let _ = reply.send(result);
            }
            Command::Pause => self.pause(),
            Command::Stop => self.stop(),
            Command::Seek { sample, reply } => {
                let result = self.seek(sample);
                let _ = reply.send(result);
            }
            Command::SetVolume {
                percent,
                target,
                reply,
            } => {
                let result = self.set_volume(percent, target);
                let _ = reply.send(result);
            }
            Command::SetRepeat(repeat) => self.repeat = repeat,
            Command::GetStatus(reply) => {
                let status = self.status();
                let _ = reply.send(status);
            }
            Command::GetInfo(reply) => {
                let _ = reply.send(self.session.as_ref().map(|s| s.info));
            }
            Command::GetVolume(reply) => {
                let result = self.backend.volume();
                if let Err(e) = &result {
                    self.report(e);
                }
                let _ = reply.send(result);
            }
        }
    }

    fn set_state(&mut self, state: PlayerState) {
        if self.state != state {
            info!("player: {} -> {}", self.state, state);
            self.state = state;
            self.events.send(Event::StateChange(state));
        }
    }

    fn report(&self, e: &AudioError) {
        warn!("player: {}", e);
        self.events.send(Event::Error(e.to_string()));
    }

    fn load(&mut self, path: String) -> std::result::Result<i64, AudioError> {
        self.stop();
        self.last_offset = None;
        self.last_offset_at = None;

        let reader = self.backend.open(Path::new(&path)).map_err(|e| {
            self.report(&e);
            e
        })?;

        let writer = self.backend.open_output(reader.as_ref()).map_err(|e| {
            self.report(&e);
            e
        })?;

        let info = reader.info().unwrap_or_else(|e| {
            self.report(&e);
            Info::default()
        });

        let size = match reader.length() {
            Ok(n) => n as i64,
            Err(e) => {
                self.report(&e);
                0
            }
        };

        debug!("player: loaded {} ({} samples)", path, size);
        self.session = Some(Session {
            path,
            reader,
            writer: Some(writer),
            info,
            size,
        });
        self.set_state(PlayerState::Paused);
        Ok(size)
    }

    fn play(&mut self) -> std::result::Result<(), AudioError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };

        if session.writer.is_none() {
            match self.backend.open_output(session.reader.as_ref()) {
                Ok(writer) => session.writer = Some(writer),
                Err(e) => {
                    self.report(&e);
                    return Err(e);
                }
            }
        }

        self.set_state(PlayerState::Playing);
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(session) = self.session.as_mut() {
            // Release the device so other applications can use it
            session.writer = None;
            self.set_state(PlayerState::Paused);
        }
    }

    fn stop(&mut self) {
        if self.session.take().is_some() {
            self.set_state(PlayerState::Empty);
        }
    }

    fn seek(&mut self, sample: i64) -> std::result::Result<(), AudioError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };

        let sample = sample.max(0);
        if let Err(e) = session.reader.seek(sample as u64) {
            self.report(&e);
            return Err(e);
        }

        self.last_offset = Some(sample as u64);
        self.last_offset_at = None;
        self.events.send(Event::OffsetChange(sample));
        Ok(())
    }

    fn set_volume(&mut self, percent: u8, target: VolumeTarget) -> std::result::Result<(), AudioError> {
        let percent = percent.min(100);
        match self.backend.set_volume(percent, target) {
            Ok(()) => {
                self.events.send(Event::VolumeChange(percent));
                Ok(())
            }
            Err(e) => {
                self.report(&e);
                Err(e)
            }
        }
    }

    fn status(&mut self) -> PlayerStatus {
        let mut status = PlayerStatus {
            state: self.state,
            ..Default::default()
        };

        if let Some(session) = self.session.as_ref() {
            status.size = session.size;
            status.path = session.path.clone();
            match session.reader.offset() {
                Ok(offset) => status.offset = offset as i64,
                Err(e) => self.report(&e),
            }
        }

        match self.backend.volume() {
            Ok(volume) => status.volume = volume,
            Err(e) => self.report(&e),
        }

        status
    }

    /// Decode and write one block, then maybe publish the offset
    fn play_block(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let block = match session.reader.read_block() {
            Ok(None) => Ok(true),
            Ok(Some(samples)) => {
                if let Some(writer) = session.writer.as_mut() {
                    if let Err(e) = writer.write(samples) {
                        error!("player: {}", e);
                        self.events.send(Event::Error(e.to_string()));
                    }
                }
                Ok(false)
            }
            Err(e) => Err(e),
        };

        let ended = match block {
            Ok(ended) => ended,
            // The rest of the track is unreadable: unload it
            Err(e) => {
                self.report(&e);
                self.stop();
                return;
            }
        };

        if ended {
            self.natural_end();
            return;
        }

        let due = self
            .last_offset_at
            .map_or(true, |at| at.elapsed() > OFFSET_EVENT_INTERVAL);
        if !due {
            return;
        }

        let offset = match self.session.as_ref().map(|s| s.reader.offset()) {
            Some(Ok(offset)) => offset,
            Some(Err(e)) => {
                self.last_offset_at = Some(Instant::now());
                self.report(&e);
                return;
            }
            None => return,
        };

        if self.last_offset != Some(offset) {
            self.last_offset = Some(offset);
            self.last_offset_at = Some(Instant::now());
            self.events.send(Event::OffsetChange(offset as i64));
        }
    }

    fn natural_end(&mut self) {
        debug!("player: end of track, repeat={}", self.repeat);

        if self.repeat {
            if let Some(session) = self.session.as_mut() {
                match session.reader.seek(0) {
                    Ok(()) => {
                        self.last_offset = Some(0);
                        self.last_offset_at = Some(Instant::now());
                        self.events.send(Event::OffsetChange(0));
                        return;
                    }
                    Err(e) => self.report(&e),
                }
            }
        }

        self.stop();
    }
}

//! Play queue
//!
//! An ordered list of pending tracks owned by a single worker task. The
//! worker also listens to the player's events: whenever the player changes
//! state and is `Empty`, the front entry is loaded and played. That is how
//! playback advances to the next track.
//!
//! Every mutation publishes `QueueChange` into the player's event stream,
//! whether or not anything changed.

use crate::error::{Error, Result};
use crate::playback::player::{EventSender, Player};
use crate::playback::types::{Event, PlayerState, QueueElem};
use jukebox_common::Subscriber;
use std::collections::VecDeque;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

enum Command {
    Enqueue(String),
    List(oneshot::Sender<Vec<QueueElem>>),
    Move { indexes: Vec<usize>, delta: i64 },
    MoveToTop(Vec<usize>),
    Remove(Vec<usize>),
    Clear,
}

/// Handle to the queue worker
#[derive(Clone)]
pub struct Queue {
    commands: mpsc::Sender<Command>,
}

impl Queue {
    /// Start the queue worker, feeding `player` and listening on `events` for
    /// its state changes.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(player: Player, events: Subscriber<Event>) -> Self {
        let (tx, rx) = mpsc::channel(1);

        let worker = Worker {
            event_sender: player.event_sender(),
            player,
            files: VecDeque::new(),
            next_id: 0,
        };
        tokio::spawn(worker.run(rx, events));

        Self { commands: tx }
    }

    async fn send(&self, cmd: Command) -> Result<()> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| Error::Queue("queue worker stopped".to_string()))
    }

    /// Append a track. Starts it right away if the player is `Empty`.
    pub async fn enqueue(&self, path: impl Into<String>) -> Result<()> {
        self.send(Command::Enqueue(path.into())).await
    }

    /// Snapshot of the queue, next to play first
    pub async fn list(&self) -> Result<Vec<QueueElem>> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::List(tx)).await?;
        rx.await
            .map_err(|_| Error::Queue("queue worker dropped the request".to_string()))
    }

    /// Shift each entry at `indexes` one place towards the front (`delta < 0`)
    /// or the back (`delta > 0`).
    pub async fn move_entries(&self, indexes: Vec<usize>, delta: i64) -> Result<()> {
        self.send(Command::Move { indexes, delta }).await
    }

    /// Move each entry at `indexes` to the front, highest index first
    pub async fn move_to_top(&self, indexes: Vec<usize>) -> Result<()> {
        self.send(Command::MoveToTop(indexes)).await
    }

    /// Remove the entries at `indexes`
    pub async fn remove(&self, indexes: Vec<usize>) -> Result<()> {
        self.send(Command::Remove(indexes)).await
    }

    /// Remove every entry. Playback is not affected.
    pub async fn clear(&self) -> Result<()> {
        self.send(Command::Clear).await
    }
}

struct Worker {
    player: Player,
    event_sender: EventSender,
    files: VecDeque<QueueElem>,
    next_id: u32,
}

impl Worker {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>, mut events: Subscriber<Event>) {
        let mut events_open = true;

        loop {
            tokio::select! {
                cmd = commands.recv() => {
                    let Some(cmd) = cmd else { break };
                    self.handle(cmd).await;
                }
                event = events.recv(), if events_open => {
                    match event {
                        Some(Event::StateChange(_)) => {
                            self.add_to_player().await;
                            self.event_sender.send(Event::QueueChange);
                        }
                        Some(_) => {}
                        None => {
                            warn!("queue: player event stream closed");
                            events_open = false;
                        }
                    }
                }
            }
        }

        debug!("queue: worker exiting");
    }

    async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::List(reply) => {
                let _ = reply.send(self.files.iter().cloned().collect());
                return;
            }
            Command::Enqueue(filename) => {
                info!("queue: enqueuing {}", filename);
                let id = self.next_id;
                self.next_id = self.next_id.wrapping_add(1);
                self.files.push_back(QueueElem { filename, id });
                self.add_to_player().await;
            }
            Command::Move { indexes, delta } => move_entries(&mut self.files, indexes, delta),
            Command::MoveToTop(indexes) => move_to_top(&mut self.files, indexes),
            Command::Remove(indexes) => remove_entries(&mut self.files, indexes),
            Command::Clear => self.files.clear(),
        }

        self.event_sender.send(Event::QueueChange);
    }

    /// If the player is idle, load and play the front entry. Failures are
    /// already reported as player `Error` events.
    async fn add_to_player(&mut self) {
        if self.files.is_empty() {
            return;
        }

        match self.player.status().await {
            Ok(status) if status.state == PlayerState::Empty => {}
            Ok(_) => return,
            Err(e) => {
                warn!("queue: {}", e);
                return;
            }
        }

        let Some(elem) = self.files.pop_front() else {
            return;
        };

        debug!("queue: starting {}", elem.filename);
        if let Err(e) = self.player.load(elem.filename.as_str()).await {
            warn!("queue: loading {} failed: {}", elem.filename, e);
            return;
        }
        if let Err(e) = self.player.play().await {
            warn!("queue: playing {} failed: {}", elem.filename, e);
        }
    }
}

/// Unit-step shift of the entries at `indexes`. Moving up processes indexes
/// in ascending order and moving down in descending order, so a block of
/// adjacent entries moves together. Shifts past either end are ignored.
fn move_entries(files: &mut VecDeque<QueueElem>, mut indexes: Vec<usize>, delta: i64) {
    indexes.sort_unstable();
    indexes.dedup();

    match delta.signum() {
        -1 => {
            for i in indexes {
                if i >= 1 && i < files.len() {
                    files.swap(i - 1, i);
                }
            }
        }
        1 => {
            for i in indexes.into_iter().rev() {
                if i + 1 < files.len() {
                    files.swap(i, i + 1);
                }
            }
        }
        _ => {}
    }
}

/// Move entries to the front, highest index first. Each move shifts the
/// positions below it, so later indexes address the reordered queue.
fn move_to_top(files: &mut VecDeque<QueueElem>, mut indexes: Vec<usize>) {
    indexes.sort_unstable_by(|a, b| b.cmp(a));

    for i in indexes {
        if let Some(elem) = files.remove(i) {
            files.push_front(elem);
        }
    }
}

fn remove_entries(files: &mut VecDeque<QueueElem>, mut indexes: Vec<usize>) {
    indexes.sort_unstable();
    indexes.dedup();

    // Each removal shifts the later entries down by one.
    for (removed, i) in indexes.into_iter().enumerate() {
        let i = i - removed;
        if i < files.len() {
            files.remove(i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_of(names: &[&str]) -> VecDeque<QueueElem> {
        names
            .iter()
            .enumerate()
            .map(|(id, name)| QueueElem {
                filename: name.to_string(),
                id: id as u32,
            })
            .collect()
    }

    fn names(files: &VecDeque<QueueElem>) -> Vec<&str> {
        files.iter().map(|e| e.filename.as_str()).collect()
    }

    #[test]
    fn test_move_up_ascending() {
        let mut files = queue_of(&["a", "b", "c", "d"]);
        move_entries(&mut files, vec![2, 1], -1);
        assert_eq!(names(&files), vec!["b", "c", "a", "d"]);
    }

    #[test]
    fn test_move_down_descending() {
        let mut files = queue_of(&["a", "b", "c", "d"]);
        move_entries(&mut files, vec![1, 2], 1);
        assert_eq!(names(&files), vec!["a", "d", "b", "c"]);
    }

    #[test]
    fn test_move_any_magnitude_is_one_step() {
        let mut files = queue_of(&["a", "b", "c", "d"]);
        move_entries(&mut files, vec![3], -7);
        assert_eq!(names(&files), vec!["a", "b", "d", "c"]);
    }

    #[test]
    fn test_move_past_ends_is_ignored() {
        let mut files = queue_of(&["a", "b", "c", "d"]);
        move_entries(&mut files, vec![0], -1);
        move_entries(&mut files, vec![3], 1);
        move_entries(&mut files, vec![9], 1);
        move_entries(&mut files, vec![1], 0);
        assert_eq!(names(&files), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_move_to_top_reorders_selected() {
        let mut files = queue_of(&["a", "b", "c", "d"]);
        move_to_top(&mut files, vec![1, 3]);
        // d goes first, then index 1 of [d, a, b, c] which is a.
        assert_eq!(names(&files), vec!["a", "d", "b", "c"]);

        let mut files = queue_of(&["a", "b", "c", "d"]);
        move_to_top(&mut files, vec![2, 3]);
        assert_eq!(names(&files), vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_remove_with_offset() {
        let mut files = queue_of(&["a", "b", "c", "d", "e"]);
        remove_entries(&mut files, vec![3, 1, 1, 10]);
        assert_eq!(names(&files), vec!["a", "c", "e"]);
        let ids: Vec<u32> = files.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![0, 2, 4]);
    }
}

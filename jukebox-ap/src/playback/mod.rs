//! Player, play queue, recently played list and repeat mode

pub mod player;
pub mod queue;
pub mod recent;
pub mod repeat;
pub mod types;

pub use player::{EventSender, Player, DEFAULT_EVENT_CAPACITY};
pub use queue::Queue;
pub use recent::Recent;
pub use repeat::RepeatMode;
pub use types::{Event, Info, PlayerState, PlayerStatus, QueueElem};

//! Recently played list
//!
//! The path of the playing track is held while it plays and committed to the
//! front of the list once playback of it ends.

use std::collections::VecDeque;

/// Length used when the configured maximum is zero
const DEFAULT_MAX: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct Recent {
    paths: VecDeque<String>,
    held: Option<String>,
    max: usize,
}

impl Recent {
    /// `max` of 0 means 10
    pub fn new(max: usize) -> Self {
        Self {
            paths: VecDeque::new(),
            held: None,
            max,
        }
    }

    /// Remember the currently playing path until [`Recent::commit`]
    pub fn hold(&mut self, path: impl Into<String>) {
        let path = path.into();
        self.held = if path.is_empty() { None } else { Some(path) };
    }

    pub fn held(&self) -> Option<&str> {
        self.held.as_deref()
    }

    /// Move the held path to the front of the list and clear the hold
    pub fn commit(&mut self) {
        let Some(path) = self.held.take() else {
            return;
        };

        if let Some(pos) = self.paths.iter().position(|p| *p == path) {
            self.paths.remove(pos);
        }
        self.paths.push_front(path);

        let max = if self.max == 0 { DEFAULT_MAX } else { self.max };
        self.paths.truncate(max);
    }

    /// Most recent first
    pub fn paths(&self) -> Vec<String> {
        self.paths.iter().cloned().collect()
    }
}

//! Repeat mode

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RepeatMode {
    #[default]
    DontRepeat,
    /// Restart the current track when it ends
    RepeatOne,
    /// Re-enqueue each track when it ends
    RepeatAll,
}

impl RepeatMode {
    /// Whether the player itself should restart tracks
    pub fn player_repeat(self) -> bool {
        self == RepeatMode::RepeatOne
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RepeatMode::DontRepeat => "DontRepeat",
            RepeatMode::RepeatOne => "RepeatOne",
            RepeatMode::RepeatAll => "RepeatAll",
        };
        f.write_str(s)
    }
}

impl FromStr for RepeatMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DontRepeat" => Ok(RepeatMode::DontRepeat),
            "RepeatOne" => Ok(RepeatMode::RepeatOne),
            "RepeatAll" => Ok(RepeatMode::RepeatAll),
            other => Err(format!("Invalid RepeatMode {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        for mode in [RepeatMode::DontRepeat, RepeatMode::RepeatOne, RepeatMode::RepeatAll] {
            assert_eq!(mode.to_string().parse::<RepeatMode>(), Ok(mode));
        }
        assert!("repeatall".parse::<RepeatMode>().is_err());
        assert!("".parse::<RepeatMode>().is_err());
    }

    #[test]
    fn test_only_repeat_one_repeats_in_player() {
        assert!(RepeatMode::RepeatOne.player_repeat());
        assert!(!RepeatMode::RepeatAll.player_repeat());
        assert!(!RepeatMode::DontRepeat.player_repeat());
    }
}

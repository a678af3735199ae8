//! mp3 tag reading

use crate::{Error, Result};
use lofty::file::{TaggedFile, TaggedFileExt};
use lofty::prelude::*;
use lofty::probe::Probe;
use serde::Serialize;
use std::path::Path;

/// Text tags of one file. Missing tags are empty strings, `tracknum` 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrackTags {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub tracknum: i64,
}

impl TrackTags {
    /// Replace empty title, artist and album with "Unknown"
    pub fn rectify(&mut self) {
        for field in [&mut self.title, &mut self.artist, &mut self.album] {
            if field.is_empty() {
                *field = "Unknown".to_string();
            }
        }
    }
}

/// Read the primary tag of `path`. Values are trimmed of surrounding spaces.
///
/// A readable file without any tag yields empty [`TrackTags`].
pub fn read_tags(path: &Path) -> Result<TrackTags> {
    let tagged_file = open_tagged(path)?;

    let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) else {
        return Ok(TrackTags::default());
    };

    let text = |value: Option<std::borrow::Cow<'_, str>>| {
        value.map(|s| s.trim_matches(' ').to_string()).unwrap_or_default()
    };

    Ok(TrackTags {
        title: text(tag.title()),
        artist: text(tag.artist()),
        album: text(tag.album()),
        tracknum: tag.track().map(i64::from).unwrap_or(0),
    })
}

/// Every text item of every tag in `path`, as `(tag type / key, value)`
pub fn dump_tags(path: &Path) -> Result<Vec<(String, String)>> {
    let tagged_file = open_tagged(path)?;

    let mut items = Vec::new();
    for tag in tagged_file.tags() {
        for item in tag.items() {
            if let Some(value) = item.value().text() {
                items.push((format!("{:?}/{:?}", tag.tag_type(), item.key()), value.to_string()));
            }
        }
    }
    Ok(items)
}

fn open_tagged(path: &Path) -> Result<TaggedFile> {
    let tags_error = |e: lofty::error::LoftyError| Error::Tags {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    Probe::open(path).map_err(tags_error)?.read().map_err(tags_error)
}

//! Remote media stream descriptors carried by stream added/removed events

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub id: String,
    pub kind: TrackKind,
}

/// A remote media stream and the tracks it carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaStreamInfo {
    pub id: String,
    pub tracks: Vec<TrackInfo>,
}

impl MediaStreamInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tracks: Vec::new(),
        }
    }

    pub fn with_track(mut self, id: impl Into<String>, kind: TrackKind) -> Self {
        self.tracks.push(TrackInfo { id: id.into(), kind });
        self
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &TrackInfo> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &TrackInfo> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Video)
    }
}

//! JSON shapes exchanged with the web page.

use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        session::{PlaybackSession, Transport},
        track::Track,
    },
    storage::plays::PlayCount,
};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct TrackResponse {
    pub id: String,
    pub title: String,
    pub file: String,
    pub cover: String,
    /// Milliseconds since the unix epoch
    pub date: i64,
}

impl TrackResponse {
    pub fn from_domain(track: &Track) -> Self {
        Self {
            id: track.id.to_hex(),
            title: track.title.clone(),
            file: track.file_ref.clone(),
            cover: track.cover_ref.clone(),
            date: track.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PlayCountResponse {
    pub title: String,
    pub plays: u64,
}

impl From<PlayCount> for PlayCountResponse {
    fn from(count: PlayCount) -> Self {
        Self {
            title: count.title,
            plays: count.plays,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionResponse {
    pub state: String,
    pub is_playing: bool,
    pub track: Option<TrackResponse>,
    pub position: f64,
    pub duration: f64,
    pub volume: f64,
    #[serde(rename = "loop")]
    pub loop_enabled: bool,
    pub shuffle: bool,
    pub last_played: Option<String>,
    pub plays: Option<u64>,
    pub error: Option<String>,
}

impl SessionResponse {
    pub fn from_domain(session: &PlaybackSession, plays: Option<u64>) -> Self {
        let state = match session.transport() {
            Transport::Idle => "idle",
            Transport::Loaded => "loaded",
            Transport::Playing => "playing",
            Transport::Paused => "paused",
        };
        Self {
            state: state.to_string(),
            is_playing: session.is_playing(),
            track: session.current_track().map(TrackResponse::from_domain),
            position: session.position_seconds(),
            duration: session.duration_seconds(),
            volume: session.volume(),
            loop_enabled: session.loop_enabled(),
            shuffle: session.shuffle_enabled(),
            last_played: session.last_played_title().map(str::to_string),
            plays,
            error: session.last_error().map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct TitleRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct SeekRequest {
    pub position: f64,
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    pub volume: f64,
}

#[derive(Debug, Deserialize)]
pub struct DurationRequest {
    pub seconds: f64,
}

#[derive(Debug, Deserialize)]
pub struct ErrorReport {
    pub reason: String,
}

//! Session controller: the only owner of the playback session.
//!
//! It looks tracks up in the current catalog, checks that their media can be
//! reached, and records plays. Recording a play never blocks playback.

use std::sync::{Arc, Mutex};

use log::{info, warn};
use rand::{SeedableRng, rngs::StdRng};
use thiserror::Error;

use crate::{
    catalog::CatalogCache,
    config,
    domain::{
        session::{EndAction, PlaybackSession, SessionError, Transport},
        track::Track,
    },
    storage::{error::StorageError, plays::PlayCountStore},
};

pub type SharedCounts = Arc<Mutex<dyn PlayCountStore + Send>>;

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("track '{0}' is not in the catalog")]
    UnknownTrack(String),

    #[error("playback error: {0}")]
    Playback(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Records one play, giving back the new count.
///
/// Failures are logged and swallowed.
pub fn record_play(counts: &SharedCounts, title: &str) -> Option<u64> {
    let result = counts
        .lock()
        .map_err(|e| StorageError::Internal(anyhow::anyhow!("play counts lock poisoned: {e}")))
        .and_then(|mut counts| counts.increment(title));

    match result {
        Ok(plays) => Some(plays),
        Err(err) => {
            warn!("could not record play of '{title}': {err}");
            None
        }
    }
}

pub struct Player {
    catalog: Arc<CatalogCache>,
    counts: SharedCounts,
    session: PlaybackSession,
    rng: StdRng,
    count_loop_replays: bool,
    /// Count returned by the last recorded play of the current track
    plays: Option<u64>,
}

impl Player {
    pub fn new(catalog: Arc<CatalogCache>, counts: SharedCounts, config: &config::Playback) -> Self {
        let rng = match config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self {
            catalog,
            counts,
            session: PlaybackSession::new(),
            rng,
            count_loop_replays: config.count_loop_replays,
            plays: None,
        }
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    /// Play count of the current track as of its last start
    pub fn plays(&self) -> Option<u64> {
        self.plays
    }

    /// Selects a track of the current catalog and starts it.
    pub fn select(&mut self, title: &str) -> Result<&PlaybackSession, PlayerError> {
        let catalog = self.catalog.current();
        let track = catalog
            .find(title)
            .cloned()
            .ok_or_else(|| PlayerError::UnknownTrack(title.to_string()))?;

        self.start_track(track, true)?;
        Ok(&self.session)
    }

    fn start_track(&mut self, track: Track, count_play: bool) -> Result<(), PlayerError> {
        self.session.select_track(track.clone(), count_play);

        if let Err(err) = self.catalog.locate(&track.file_ref) {
            warn!("cannot play '{}': {err}", track.title);
            self.session.fail(err.to_string());
            self.plays = None;
            return Err(PlayerError::Playback(err.to_string()));
        }
        self.session.start()?;
        info!("playing: {}", track.title);

        if count_play {
            match record_play(&self.counts, &track.title) {
                Some(plays) => {
                    self.session.commit_play();
                    self.plays = Some(plays);
                }
                None => self.session.discard_pending_play(),
            }
        }
        Ok(())
    }

    pub fn toggle_play_pause(&mut self) -> Transport {
        self.session.toggle_play_pause()
    }

    pub fn seek(&mut self, position: f64) -> Result<f64, PlayerError> {
        Ok(self.session.seek(position)?)
    }

    pub fn set_duration(&mut self, seconds: f64) -> Result<f64, PlayerError> {
        Ok(self.session.set_duration(seconds)?)
    }

    pub fn set_volume(&mut self, volume: f64) -> f64 {
        self.session.set_volume(volume)
    }

    pub fn toggle_loop(&mut self) -> bool {
        self.session.toggle_loop()
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        self.session.toggle_shuffle()
    }

    /// The client finished the current track.
    pub fn ended(&mut self) -> Result<&PlaybackSession, PlayerError> {
        let catalog = self.catalog.current();
        match self.session.on_ended(catalog.tracks(), &mut self.rng) {
            EndAction::Replay(track) => self.start_track(track, self.count_loop_replays)?,
            EndAction::Advance(track) => self.start_track(track, true)?,
            EndAction::Stop => self.plays = None,
        }
        Ok(&self.session)
    }

    /// The client could not decode or fetch the media.
    pub fn report_error(&mut self, reason: &str) -> &PlaybackSession {
        if let Some(track) = self.session.current_track() {
            warn!("client failed to play '{}': {reason}", track.title);
        }
        self.session.fail(reason);
        self.plays = None;
        &self.session
    }
}

//! Playback session state machine.
//!
//! The session owns the single active track and the transport flags.
//! It never touches storage or the media itself: the player drives it and
//! reports back whether playback could start and whether the play got counted.

use rand::{Rng, seq::IteratorRandom};
use thiserror::Error;

use super::track::Track;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    /// No current track
    #[default]
    Idle,
    /// Track selected, playback not confirmed yet
    Loaded,
    Playing,
    Paused,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no track is loaded")]
    NoActiveTrack,
}

/// What should happen once the current track reached its end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndAction {
    /// Loop is on: start the same track again
    Replay(Track),
    /// Shuffle picked the next track
    Advance(Track),
    /// Nothing left to play, session is idle
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    current_track: Option<Track>,
    transport: Transport,
    position_seconds: f64,
    duration_seconds: f64,
    volume: f64,
    loop_enabled: bool,
    shuffle_enabled: bool,
    last_played_title: Option<String>,
    /// Title whose play count has not been confirmed yet
    pending_play: Option<String>,
    last_error: Option<String>,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self {
            current_track: None,
            transport: Transport::Idle,
            position_seconds: 0.0,
            duration_seconds: 0.0,
            volume: 1.0,
            loop_enabled: false,
            shuffle_enabled: false,
            last_played_title: None,
            pending_play: None,
            last_error: None,
        }
    }
}

impl PlaybackSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current_track.as_ref()
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn is_playing(&self) -> bool {
        self.transport == Transport::Playing
    }

    pub fn position_seconds(&self) -> f64 {
        self.position_seconds
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn loop_enabled(&self) -> bool {
        self.loop_enabled
    }

    pub fn shuffle_enabled(&self) -> bool {
        self.shuffle_enabled
    }

    pub fn last_played_title(&self) -> Option<&str> {
        self.last_played_title.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Makes `track` the current one and rewinds.
    ///
    /// With `count_play` the title becomes the pending play-count increment,
    /// confirmed later by [`PlaybackSession::commit_play`].
    pub fn select_track(&mut self, track: Track, count_play: bool) {
        self.pending_play = count_play.then(|| track.title.clone());
        self.current_track = Some(track);
        self.transport = Transport::Loaded;
        self.position_seconds = 0.0;
        self.duration_seconds = 0.0;
        self.last_error = None;
    }

    /// Media is confirmed playable: `Loaded` or `Paused` becomes `Playing`.
    pub fn start(&mut self) -> Result<(), SessionError> {
        match self.transport {
            Transport::Idle => Err(SessionError::NoActiveTrack),
            _ => {
                self.transport = Transport::Playing;
                Ok(())
            }
        }
    }

    /// `Playing` and `Paused` swap, a loaded track starts, idle stays idle.
    pub fn toggle_play_pause(&mut self) -> Transport {
        self.transport = match self.transport {
            Transport::Idle => Transport::Idle,
            Transport::Loaded | Transport::Paused => Transport::Playing,
            Transport::Playing => Transport::Paused,
        };
        self.transport
    }

    /// Moves the playhead, clamped to the known duration.
    pub fn seek(&mut self, position: f64) -> Result<f64, SessionError> {
        if self.transport == Transport::Idle {
            return Err(SessionError::NoActiveTrack);
        }
        self.position_seconds = clamp_or(position, 0.0, self.duration_seconds, 0.0);
        Ok(self.position_seconds)
    }

    /// Records the media duration once the client knows it.
    pub fn set_duration(&mut self, seconds: f64) -> Result<f64, SessionError> {
        if self.transport == Transport::Idle {
            return Err(SessionError::NoActiveTrack);
        }
        self.duration_seconds = clamp_or(seconds, 0.0, f64::MAX, 0.0);
        self.position_seconds = self.position_seconds.min(self.duration_seconds);
        Ok(self.duration_seconds)
    }

    pub fn set_volume(&mut self, volume: f64) -> f64 {
        self.volume = clamp_or(volume, 0.0, 1.0, self.volume);
        self.volume
    }

    pub fn toggle_loop(&mut self) -> bool {
        self.loop_enabled = !self.loop_enabled;
        self.loop_enabled
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        self.shuffle_enabled = !self.shuffle_enabled;
        self.shuffle_enabled
    }

    /// The pending play got counted.
    pub fn commit_play(&mut self) {
        if let Some(title) = self.pending_play.take() {
            self.last_played_title = Some(title);
        }
    }

    /// The pending play could not be counted, playback goes on regardless.
    pub fn discard_pending_play(&mut self) {
        self.pending_play = None;
    }

    /// Media could not be played: back to idle with the reason kept for display.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.current_track = None;
        self.transport = Transport::Idle;
        self.position_seconds = 0.0;
        self.duration_seconds = 0.0;
        self.pending_play = None;
        self.last_error = Some(reason.into());
    }

    /// Decides what follows the end of the current track.
    ///
    /// Loop wins over shuffle. Shuffle picks uniformly among `catalog` tracks
    /// other than the ended one and the last counted one. When no candidate
    /// is left, or neither flag is set, the session goes idle.
    pub fn on_ended<R: Rng + ?Sized>(&mut self, catalog: &[Track], rng: &mut R) -> EndAction {
        let Some(ended) = self.current_track.clone() else {
            return EndAction::Stop;
        };

        if self.loop_enabled {
            return EndAction::Replay(ended);
        }

        if self.shuffle_enabled {
            let last = self.last_played_title.as_deref();
            let next = catalog
                .iter()
                .filter(|t| t.title != ended.title && Some(t.title.as_str()) != last)
                .choose(rng);
            if let Some(next) = next {
                return EndAction::Advance(next.clone());
            }
        }

        self.stop();
        EndAction::Stop
    }

    fn stop(&mut self) {
        self.current_track = None;
        self.transport = Transport::Idle;
        self.position_seconds = 0.0;
        self.duration_seconds = 0.0;
        self.pending_play = None;
    }
}

/// Clamps `value` into `[min, max]`, NaN falls back to `fallback`.
fn clamp_or(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::domain::hash::TrackId;

    fn track(title: &str) -> Track {
        Track {
            id: TrackId::from_bytes(title.as_bytes()),
            title: title.to_string(),
            file_ref: format!("music/{title}.mp3"),
            cover_ref: "covers/default.jpg".to_string(),
            created_at: 0,
        }
    }

    fn playing(title: &str) -> PlaybackSession {
        let mut session = PlaybackSession::new();
        session.select_track(track(title), true);
        session.start().unwrap();
        session.commit_play();
        session
    }

    #[test]
    fn new_session_is_idle() {
        let session = PlaybackSession::new();
        assert_eq!(session.transport(), Transport::Idle);
        assert!(session.current_track().is_none());
        assert_eq!(session.volume(), 1.0);
        assert!(!session.loop_enabled());
        assert!(!session.shuffle_enabled());
    }

    #[test]
    fn select_loads_and_rewinds() {
        let mut session = playing("Song One");
        session.set_duration(180.0).unwrap();
        session.seek(90.0).unwrap();

        session.select_track(track("Song Two"), true);

        assert_eq!(session.transport(), Transport::Loaded);
        assert_eq!(session.current_track().unwrap().title, "Song Two");
        assert_eq!(session.position_seconds(), 0.0);
        assert_eq!(session.pending_play.as_deref(), Some("Song Two"));
        // not counted yet
        assert_eq!(session.last_played_title(), Some("Song One"));
    }

    #[test]
    fn last_played_only_moves_after_commit() {
        let mut session = PlaybackSession::new();
        session.select_track(track("Song One"), true);
        assert_eq!(session.last_played_title(), None);
        session.commit_play();
        assert_eq!(session.last_played_title(), Some("Song One"));
        assert_eq!(session.pending_play.as_deref(), None);
    }

    #[test]
    fn discarded_play_keeps_last_played() {
        let mut session = playing("Song One");
        session.select_track(track("Song Two"), true);
        session.discard_pending_play();
        assert_eq!(session.last_played_title(), Some("Song One"));
        assert_eq!(session.pending_play.as_deref(), None);
    }

    #[test]
    fn toggle_play_pause_swaps_and_ignores_idle() {
        let mut session = PlaybackSession::new();
        assert_eq!(session.toggle_play_pause(), Transport::Idle);

        let mut session = playing("Song One");
        assert!(session.is_playing());
        assert_eq!(session.toggle_play_pause(), Transport::Paused);
        assert_eq!(session.toggle_play_pause(), Transport::Playing);
    }

    #[test]
    fn seek_clamps_to_duration() {
        let mut session = playing("Song One");
        session.set_duration(180.0).unwrap();

        assert_eq!(session.seek(-5.0), Ok(0.0));
        assert_eq!(session.position_seconds(), 0.0);
        assert_eq!(session.seek(200.0), Ok(180.0));
        assert_eq!(session.position_seconds(), 180.0);
        assert_eq!(session.seek(42.5), Ok(42.5));
    }

    #[test]
    fn seek_requires_a_track() {
        let mut session = PlaybackSession::new();
        assert_eq!(session.seek(3.0), Err(SessionError::NoActiveTrack));
    }

    #[test]
    fn shorter_duration_pulls_position_back() {
        let mut session = playing("Song One");
        session.set_duration(180.0).unwrap();
        session.seek(150.0).unwrap();
        session.set_duration(100.0).unwrap();
        assert_eq!(session.position_seconds(), 100.0);
    }

    #[test]
    fn volume_is_clamped() {
        let mut session = PlaybackSession::new();
        assert_eq!(session.set_volume(1.5), 1.0);
        assert_eq!(session.set_volume(-0.2), 0.0);
        assert_eq!(session.set_volume(0.3), 0.3);
        assert_eq!(session.set_volume(f64::NAN), 0.3);
    }

    #[test]
    fn flags_toggle() {
        let mut session = PlaybackSession::new();
        assert!(session.toggle_loop());
        assert!(!session.toggle_loop());
        assert!(session.toggle_shuffle());
        assert!(!session.toggle_shuffle());
    }

    #[test]
    fn fail_returns_to_idle_with_reason() {
        let mut session = playing("Song One");
        session.fail("media unreachable");
        assert_eq!(session.transport(), Transport::Idle);
        assert!(session.current_track().is_none());
        assert_eq!(session.last_error(), Some("media unreachable"));
    }

    #[test]
    fn ended_without_flags_goes_idle() {
        let catalog = vec![track("A"), track("B")];
        let mut session = playing("A");
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(session.on_ended(&catalog, &mut rng), EndAction::Stop);
        assert_eq!(session.transport(), Transport::Idle);
        assert!(session.current_track().is_none());
    }

    #[test]
    fn ended_with_loop_replays_same_track() {
        let catalog = vec![track("A"), track("B")];
        let mut session = playing("A");
        session.toggle_loop();
        session.toggle_shuffle();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(session.on_ended(&catalog, &mut rng), EndAction::Replay(track("A")));
    }

    #[test]
    fn shuffle_with_single_track_stops() {
        let catalog = vec![track("A")];
        let mut session = playing("A");
        session.toggle_shuffle();
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(session.on_ended(&catalog, &mut rng), EndAction::Stop);
        assert_eq!(session.transport(), Transport::Idle);
    }

    #[test]
    fn ended_while_idle_is_a_stop() {
        let mut session = PlaybackSession::new();
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(session.on_ended(&[track("A")], &mut rng), EndAction::Stop);
    }

    #[test]
    fn shuffle_never_repeats_last_played() {
        for seed in 0..500u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let size = rng.random_range(2..12);
            let catalog = (0..size)
                .map(|i| track(&format!("Track {i}")))
                .collect::<Vec<_>>();
            let current = catalog[rng.random_range(0..size)].title.clone();

            let mut session = playing(&current);
            session.toggle_shuffle();

            match session.on_ended(&catalog, &mut rng) {
                EndAction::Advance(next) => {
                    assert_ne!(next.title, current, "seed {seed} repeated the last track");
                    assert!(catalog.contains(&next));
                }
                other => panic!("seed {seed}: expected an advance, got {other:?}"),
            }
        }
    }

    #[test]
    fn shuffle_skips_both_ended_and_last_counted() {
        let catalog = vec![track("A"), track("B"), track("C")];
        let mut session = playing("A");
        // B is current, but its play was never counted: A stays last played
        session.select_track(track("B"), true);
        session.start().unwrap();
        session.discard_pending_play();
        session.toggle_shuffle();

        for seed in 0..50 {
            let mut ended = session.clone();
            let mut rng = StdRng::seed_from_u64(seed);
            assert_eq!(ended.on_ended(&catalog, &mut rng), EndAction::Advance(track("C")));
        }
    }
}

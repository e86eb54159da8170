//! Track catalog: where tracks come from and the snapshot the rest of the app reads.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
};

use log::{info, warn};

use crate::domain::{
    hash::TrackId,
    track::{MillisSinceUnix, Track, normalize_title},
};

pub mod error;
pub mod fs;
pub mod upload;

use error::CatalogError;

/// One entry as a catalog source reports it, before titles are derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    /// File name including its extension, e.g. `Song_One.mp3`
    pub file_name: String,
    pub file_ref: String,
    pub cover_ref: Option<String>,
    pub created_at: MillisSinceUnix,
    /// Stable id when the source can compute one
    pub id: Option<TrackId>,
}

/// Storage backend that knows which tracks exist.
pub trait CatalogSource {
    /// Enumerates every track, in a deterministic order.
    fn list_tracks(&self) -> Result<Vec<SourceRecord>, CatalogError>;

    /// Resolves a file locator to something playable, failing when the media is gone.
    fn locate(&self, file_ref: &str) -> Result<PathBuf, CatalogError>;
}

/// Immutable snapshot of the tracks of one load.
///
/// Cloning is cheap. A reload never touches existing snapshots.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tracks: Arc<[Track]>,
    generation: u64,
}

impl Catalog {
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Number of the load that produced this snapshot, 0 before the first load.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn find(&self, title: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.title == title)
    }

    pub fn find_by_id(&self, id: &TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| &t.id == id)
    }
}

/// Builds tracks from source records.
///
/// Titles come from the file stem. Records whose title normalizes to nothing
/// are skipped, and when two files share a title the first one wins.
pub fn build_tracks(records: Vec<SourceRecord>, default_cover: &str) -> Vec<Track> {
    let mut seen = HashSet::new();
    let mut tracks = Vec::with_capacity(records.len());

    for record in records {
        let stem = Path::new(&record.file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let title = normalize_title(&stem);

        if title.is_empty() {
            warn!("skipping {}: title is empty", record.file_ref);
            continue;
        }
        if !seen.insert(title.clone()) {
            warn!(
                "skipping {}: title '{}' is already taken by another file",
                record.file_ref, title
            );
            continue;
        }

        let id = record
            .id
            .unwrap_or_else(|| TrackId::from_bytes(title.as_bytes()));

        tracks.push(Track {
            id,
            title,
            file_ref: record.file_ref,
            cover_ref: record
                .cover_ref
                .unwrap_or_else(|| default_cover.to_string()),
            created_at: record.created_at,
        });
    }

    tracks
}

/// Current catalog of the session, rebuilt wholesale on every load.
pub struct CatalogCache {
    source: Box<dyn CatalogSource + Send + Sync>,
    default_cover: String,
    current: RwLock<Catalog>,
}

impl CatalogCache {
    pub fn new(source: Box<dyn CatalogSource + Send + Sync>, default_cover: String) -> Self {
        Self {
            source,
            default_cover,
            current: RwLock::new(Catalog::default()),
        }
    }

    /// Reads the source and swaps in the new catalog.
    ///
    /// The source is read without holding the lock, the last load to finish wins.
    /// On failure the previous catalog stays in place.
    pub fn load(&self) -> Result<Catalog, CatalogError> {
        let records = self.source.list_tracks()?;
        let tracks = build_tracks(records, &self.default_cover);

        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let catalog = Catalog {
            tracks: tracks.into(),
            generation: current.generation + 1,
        };
        *current = catalog.clone();

        info!(
            "catalog loaded: {} tracks (generation {})",
            catalog.len(),
            catalog.generation
        );
        Ok(catalog)
    }

    /// Snapshot of the latest successful load.
    pub fn current(&self) -> Catalog {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn locate(&self, file_ref: &str) -> Result<PathBuf, CatalogError> {
        self.source.locate(file_ref)
    }
}

//! Catalog source backed by a music directory on the local file system

use walkdir::WalkDir;

use std::{
    path::{Component, Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use log::{debug, warn};

use crate::{
    catalog::{CatalogSource, SourceRecord, error::CatalogError},
    config,
    domain::{hash::TrackId, track::normalize_title},
};

pub const MUSIC_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "m4a", "ogg", "aac"];
pub const COVER_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Url prefix under which music files are served
pub const MUSIC_PREFIX: &str = "music";
/// Url prefix under which covers are served
pub const COVERS_PREFIX: &str = "covers";

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| allowed.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

pub fn is_music_file(path: &Path) -> bool {
    has_extension(path, MUSIC_EXTENSIONS)
}

pub fn is_cover_file(path: &Path) -> bool {
    has_extension(path, COVER_EXTENSIONS)
}

/// Best-effort check that a path points to a real, playable music file.
///
/// This does NOT decode audio, but rules out:
/// - missing paths
/// - directories / special files
/// - wrong extensions
/// - empty files
/// - unreadable files
pub fn is_valid_music_path(path: &Path) -> bool {
    let meta = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(_) => return false,
    };

    if !meta.is_file() || !is_music_file(path) || meta.len() == 0 {
        return false;
    }

    std::fs::File::open(path).is_ok()
}

/// Music directory with a sibling covers directory.
///
/// A track `Song_One.mp3` uses the cover `Song_One.<ext>` or, failing that,
/// the cover named after its normalized title (`Song One.<ext>`).
pub struct DirSource {
    music_dir: PathBuf,
    covers_dir: PathBuf,
    recursive: bool,
    follow_symlinks: bool,
}

impl DirSource {
    pub fn new(config: &config::Library) -> Self {
        Self {
            music_dir: config.music_dir.clone(),
            covers_dir: config.covers_dir.clone(),
            recursive: config.recursive,
            follow_symlinks: config.follow_symlinks,
        }
    }

    fn scan_paths(&self) -> Result<Vec<PathBuf>, CatalogError> {
        let root_str = self.music_dir.to_string_lossy();

        let mut walker = WalkDir::new(&self.music_dir)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name();
        if !self.recursive {
            walker = walker.max_depth(1);
        }

        let mut paths = Vec::new();
        for entry in walker {
            match entry {
                Ok(e) => {
                    if e.file_type().is_file() && is_music_file(e.path()) {
                        paths.push(e.path().to_path_buf());
                    }
                }
                Err(err) if err.depth() == 0 => {
                    let source = err
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("library root is a symlink loop"));
                    return Err(CatalogError::LoadFailure {
                        dir: self.music_dir.clone(),
                        source,
                    });
                }
                Err(err) => {
                    warn!("error while scanning dir {root_str}, skipping an entry: {err}");
                }
            }
        }
        Ok(paths)
    }

    fn find_cover(&self, stem: &str) -> Option<String> {
        let title = normalize_title(stem);
        [stem, title.as_str()]
            .iter()
            .flat_map(|name| COVER_EXTENSIONS.iter().map(move |ext| format!("{name}.{ext}")))
            .find(|file| self.covers_dir.join(file).is_file())
            .map(|file| format!("{COVERS_PREFIX}/{file}"))
    }

    fn record_for(&self, path: &Path) -> Result<SourceRecord, CatalogError> {
        let relative = path.strip_prefix(&self.music_dir).unwrap_or(path);
        let file_ref = std::iter::once(MUSIC_PREFIX.to_string())
            .chain(
                relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().to_string()),
            )
            .collect::<Vec<_>>()
            .join("/");

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let modified = std::fs::metadata(path)?.modified()?;

        Ok(SourceRecord {
            file_name,
            file_ref,
            cover_ref: self.find_cover(&stem),
            created_at: system_time_to_millis(modified),
            id: TrackId::from_file(path).ok(),
        })
    }
}

impl CatalogSource for DirSource {
    fn list_tracks(&self) -> Result<Vec<SourceRecord>, CatalogError> {
        let paths = self.scan_paths()?;
        debug!(
            "found {} music files in {}",
            paths.len(),
            self.music_dir.to_string_lossy()
        );

        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            match self.record_for(&path) {
                Ok(record) => records.push(record),
                Err(err) => warn!("skipping {}: {err}", path.to_string_lossy()),
            }
        }
        Ok(records)
    }

    fn locate(&self, file_ref: &str) -> Result<PathBuf, CatalogError> {
        let unreachable = || CatalogError::MediaUnreachable(file_ref.to_string());

        let relative = file_ref
            .strip_prefix(MUSIC_PREFIX)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(unreachable)?;

        // a locator must never escape the music directory
        let escapes = Path::new(relative)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if relative.is_empty() || escapes {
            return Err(unreachable());
        }

        let path = self.music_dir.join(relative);
        if is_valid_music_path(&path) {
            Ok(path)
        } else {
            Err(unreachable())
        }
    }
}

/// converts time to number of milliseconds since unix epoch, clamping times before it to 0
pub fn system_time_to_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

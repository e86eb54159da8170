//! Storing a newly uploaded track and its cover into the library directories.

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::{
    catalog::{
        error::CatalogError,
        fs::{is_cover_file, is_music_file},
    },
    config,
    domain::track::normalize_title,
};

/// One uploaded part: the name the client gave it and its bytes.
#[derive(Debug, Clone, Copy)]
pub struct UploadedFile<'a> {
    pub file_name: Option<&'a str>,
    pub data: &'a [u8],
}

#[derive(Debug, PartialEq, Eq)]
pub struct StoredUpload {
    pub title: String,
    pub music_path: PathBuf,
    pub cover_path: PathBuf,
}

fn lowercase_extension(file: &UploadedFile, part: &str) -> Result<String, CatalogError> {
    file.file_name
        .and_then(|name| Path::new(name).extension())
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .ok_or_else(|| CatalogError::InvalidUpload(format!("{part} has no file extension")))
}

/// Hidden sibling the data is written to before it is renamed into place.
fn staging_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.part"))
}

/// Removes files of `dir` named `<title>.<ext>` for any accepted extension, except `keep`.
fn remove_previous(
    dir: &Path,
    title: &str,
    accepts: fn(&Path) -> bool,
    keep: &Path,
) -> Result<(), CatalogError> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let same_title = path
            .file_stem()
            .is_some_and(|stem| stem.to_string_lossy() == title);

        if same_title && path != keep && path.is_file() && accepts(&path) {
            info!("removing previous file {}", path.to_string_lossy());
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Writes `<Title>.<ext>` into the music directory and the covers directory.
///
/// The title is normalized the same way catalog titles are, so the stored file
/// lists under exactly that title. An existing track with the same title is replaced,
/// whatever the extensions of its files. Both parts are written before anything
/// already in the library is touched.
pub fn store_upload(
    library: &config::Library,
    raw_title: &str,
    music: UploadedFile,
    cover: UploadedFile,
) -> Result<StoredUpload, CatalogError> {
    let title = normalize_title(raw_title);
    if title.is_empty() {
        return Err(CatalogError::InvalidUpload("title is empty".into()));
    }
    if title.contains(['/', '\\']) || title.starts_with('.') {
        return Err(CatalogError::InvalidUpload(format!(
            "title '{title}' is not a valid file name"
        )));
    }

    let music_ext = lowercase_extension(&music, "music file")?;
    let cover_ext = lowercase_extension(&cover, "cover")?;

    let music_path = library.music_dir.join(format!("{title}.{music_ext}"));
    let cover_path = library.covers_dir.join(format!("{title}.{cover_ext}"));

    if !is_music_file(&music_path) {
        return Err(CatalogError::InvalidUpload(format!(
            "unsupported music format '{music_ext}'"
        )));
    }
    if !is_cover_file(&cover_path) {
        return Err(CatalogError::InvalidUpload(format!(
            "unsupported cover format '{cover_ext}'"
        )));
    }
    if music.data.is_empty() || cover.data.is_empty() {
        return Err(CatalogError::InvalidUpload("empty file".into()));
    }

    std::fs::create_dir_all(&library.music_dir)?;
    std::fs::create_dir_all(&library.covers_dir)?;

    let music_staged = staging_path(&music_path);
    let cover_staged = staging_path(&cover_path);

    let staged = std::fs::write(&music_staged, music.data)
        .and_then(|_| std::fs::write(&cover_staged, cover.data));
    if let Err(err) = staged {
        warn!("could not store upload '{title}': {err}");
        let _ = std::fs::remove_file(&music_staged);
        let _ = std::fs::remove_file(&cover_staged);
        return Err(err.into());
    }

    remove_previous(&library.music_dir, &title, is_music_file, &music_path)?;
    remove_previous(&library.covers_dir, &title, is_cover_file, &cover_path)?;

    if music_path.exists() {
        info!("replacing existing track '{title}'");
    }
    std::fs::rename(&cover_staged, &cover_path)?;
    std::fs::rename(&music_staged, &music_path)?;

    info!("track received: {title}");
    Ok(StoredUpload {
        title,
        music_path,
        cover_path,
    })
}

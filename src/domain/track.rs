use super::hash::TrackId;

/// Milliseconds since the unix epoch.
pub type MillisSinceUnix = i64;

/// Represent a music track in the catalog.
///
/// Tracks are never patched in place: a catalog reload builds new ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: TrackId,
    /// Normalized, unique within one catalog load
    pub title: String,
    /// Playable locator, relative to the server root (e.g. `music/Song One.mp3`)
    pub file_ref: String,
    /// Cover locator, or the configured default cover
    pub cover_ref: String,
    pub created_at: MillisSinceUnix,
}

/// Turns a raw file stem or user supplied title into a display title.
///
/// Underscores become spaces, whitespace runs collapse into one space,
/// and every word is lowercased with its first letter capitalized.
pub fn normalize_title(raw: &str) -> String {
    let spaced = raw.replace('_', " ");
    let collapsed = spaced.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut title = String::with_capacity(collapsed.len());
    let mut prev_is_word = false;
    for c in collapsed.chars() {
        let is_word = c.is_alphanumeric();
        if is_word && !prev_is_word {
            title.extend(c.to_uppercase());
        } else {
            title.extend(c.to_lowercase());
        }
        prev_is_word = is_word;
    }
    title
}

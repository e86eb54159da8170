//! Filtered and sorted views over a catalog.

use std::{cmp::Ordering, fmt::Display, str::FromStr};

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use super::track::Track;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    /// Catalog order
    #[default]
    None,
    /// By title
    Alpha,
    /// Newest first
    Recent,
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Ok(SortMode::None),
            "alpha" => Ok(SortMode::Alpha),
            "recent" => Ok(SortMode::Recent),
            other => Err(format!(
                "unknown sort mode '{other}', expected one of: none, alpha, recent"
            )),
        }
    }
}

impl Display for SortMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SortMode::None => "none",
            SortMode::Alpha => "alpha",
            SortMode::Recent => "recent",
        };
        write!(f, "{name}")
    }
}

/// Lowercased title with accents stripped, `Été` and `ete` give the same key.
fn collation_key(title: &str) -> String {
    title
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Orders titles the way a reader expects: ignoring accents and case first,
/// then case-insensitively, then by the exact text so that the order stays total.
pub fn compare_titles(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
        .then_with(|| a.cmp(b))
}

/// Derives the displayed tracks from the catalog.
///
/// Case-insensitive substring filter on the title, an empty filter keeps everything.
/// Sorting is stable, so `Recent` keeps catalog order between tracks of the same age.
pub fn view<'a>(tracks: &'a [Track], filter: &str, sort: SortMode) -> Vec<&'a Track> {
    let needle = filter.to_lowercase();

    let mut shown = tracks
        .iter()
        .filter(|track| needle.is_empty() || track.title.to_lowercase().contains(&needle))
        .collect::<Vec<_>>();

    match sort {
        SortMode::None => {}
        SortMode::Alpha => shown.sort_by(|a, b| compare_titles(&a.title, &b.title)),
        SortMode::Recent => shown.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }

    shown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::hash::TrackId;

    fn track(title: &str, created_at: i64) -> Track {
        Track {
            id: TrackId::from_bytes(title.as_bytes()),
            title: title.to_string(),
            file_ref: format!("music/{title}.mp3"),
            cover_ref: "covers/default.jpg".to_string(),
            created_at,
        }
    }

    fn titles(tracks: &[&Track]) -> Vec<String> {
        tracks.iter().map(|t| t.title.clone()).collect()
    }

    fn sample() -> Vec<Track> {
        vec![
            track("Zebra Song", 10),
            track("alpha tune", 30),
            track("Beta Beat", 20),
            track("Alpha Tune", 20),
        ]
    }

    #[test]
    fn empty_filter_without_sort_keeps_catalog() {
        let tracks = sample();
        let shown = view(&tracks, "", SortMode::None);
        assert_eq!(shown.len(), tracks.len());
        assert_eq!(
            titles(&shown),
            tracks.iter().map(|t| t.title.clone()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn filter_is_case_insensitive_substring() {
        let tracks = sample();
        let shown = view(&tracks, "ALPHA", SortMode::None);
        assert_eq!(titles(&shown), vec!["alpha tune", "Alpha Tune"]);

        let shown = view(&tracks, "be", SortMode::None);
        assert_eq!(titles(&shown), vec!["Beta Beat"]);
    }

    #[test]
    fn filtering_twice_changes_nothing() {
        let tracks = sample();
        let once = view(&tracks, "a", SortMode::None)
            .into_iter()
            .cloned()
            .collect::<Vec<_>>();
        let twice = view(&once, "a", SortMode::None);
        assert_eq!(titles(&twice), once.iter().map(|t| t.title.clone()).collect::<Vec<_>>());
    }

    #[test]
    fn no_match_is_an_empty_view() {
        let tracks = sample();
        assert!(view(&tracks, "nothing like this", SortMode::Alpha).is_empty());
    }

    #[test]
    fn empty_catalog_gives_empty_view() {
        assert!(view(&[], "", SortMode::None).is_empty());
        assert!(view(&[], "", SortMode::Recent).is_empty());
    }

    #[test]
    fn alpha_sorts_case_insensitively_and_is_stable_under_reapplication() {
        let tracks = sample();
        let sorted = view(&tracks, "", SortMode::Alpha);
        assert_eq!(
            titles(&sorted),
            vec!["Alpha Tune", "alpha tune", "Beta Beat", "Zebra Song"]
        );

        let again_input = sorted.into_iter().cloned().collect::<Vec<_>>();
        let again = view(&again_input, "", SortMode::Alpha);
        assert_eq!(
            titles(&again),
            vec!["Alpha Tune", "alpha tune", "Beta Beat", "Zebra Song"]
        );
    }

    #[test]
    fn compare_titles_is_a_total_order() {
        assert_eq!(compare_titles("a", "B"), Ordering::Less);
        assert_eq!(compare_titles("B", "a"), Ordering::Greater);
        assert_eq!(compare_titles("Song", "Song"), Ordering::Equal);
        assert_ne!(compare_titles("Song", "song"), Ordering::Equal);
        assert_ne!(compare_titles("Ete", "Été"), Ordering::Equal);
    }

    #[test]
    fn alpha_places_accented_titles_with_their_base_letter() {
        let tracks = vec![
            track("Zebra", 1),
            track("Été Indien", 2),
            track("Eclipse", 3),
            track("Ça Plane Pour Moi", 4),
            track("Cerise", 5),
        ];
        let sorted = view(&tracks, "", SortMode::Alpha);
        assert_eq!(
            titles(&sorted),
            vec!["Ça Plane Pour Moi", "Cerise", "Eclipse", "Été Indien", "Zebra"]
        );
    }

    #[test]
    fn recent_sorts_newest_first_keeping_ties_in_catalog_order() {
        let tracks = sample();
        let sorted = view(&tracks, "", SortMode::Recent);
        // "Beta Beat" and "Alpha Tune" share created_at = 20
        assert_eq!(
            titles(&sorted),
            vec!["alpha tune", "Beta Beat", "Alpha Tune", "Zebra Song"]
        );
    }

    #[test]
    fn parses_sort_modes() {
        assert_eq!("alpha".parse::<SortMode>(), Ok(SortMode::Alpha));
        assert_eq!("Recent".parse::<SortMode>(), Ok(SortMode::Recent));
        assert_eq!("".parse::<SortMode>(), Ok(SortMode::None));
        assert!("shuffle".parse::<SortMode>().is_err());
    }
}

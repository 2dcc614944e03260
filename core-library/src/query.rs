//! Filter and sort engine for catalog views.
//!
//! Evaluates tri-state tag and rating filters, a free-text query and a
//! single-column sort over an in-memory catalog snapshot. Everything here is
//! synchronous and pure: the presentation layer calls [`apply_filter_sort`]
//! again on every state change.
//!
//! ## Predicates
//!
//! A track is visible when all of the following hold:
//! - it carries every tag set to `Include` and none set to `Exclude`;
//! - its rating equals one of the `Include` ratings (if any) and none of the
//!   `Exclude` ratings;
//! - the query, if non-blank, is a case-insensitive substring of its title,
//!   artist or album.
//!
//! ## Sorting
//!
//! With no active column the snapshot order is kept. Otherwise text columns
//! compare case-insensitively, duration compares numerically, and equal keys
//! fall back to ascending track id whichever direction is active.

use crate::catalog::TrackEntry;
use crate::models::{TagId, Track, MAX_RATING};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

// =============================================================================
// Filter state
// =============================================================================

/// Per-entity filter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TriState {
    #[default]
    Irrelevant,
    Include,
    Exclude,
}

impl TriState {
    /// Next value in the click cycle Irrelevant → Include → Exclude → Irrelevant.
    pub fn cycle(self) -> Self {
        match self {
            TriState::Irrelevant => TriState::Include,
            TriState::Include => TriState::Exclude,
            TriState::Exclude => TriState::Irrelevant,
        }
    }
}

/// Current tag, rating and text filters.
///
/// `Irrelevant` entries are never stored, so two states that filter the same
/// way compare equal regardless of how they were reached.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterState {
    tags: BTreeMap<TagId, TriState>,
    ratings: BTreeMap<u8, TriState>,
    query: String,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag(&self, tag: TagId) -> TriState {
        self.tags.get(&tag).copied().unwrap_or_default()
    }

    pub fn set_tag(&mut self, tag: TagId, state: TriState) {
        match state {
            TriState::Irrelevant => {
                self.tags.remove(&tag);
            }
            state => {
                self.tags.insert(tag, state);
            }
        }
    }

    /// Advance a tag through its click cycle and return the new value.
    pub fn toggle_tag(&mut self, tag: TagId) -> TriState {
        let next = self.tag(tag).cycle();
        self.set_tag(tag, next);
        next
    }

    pub fn rating(&self, rating: u8) -> TriState {
        self.ratings.get(&rating).copied().unwrap_or_default()
    }

    /// Ratings above 5 are ignored.
    pub fn set_rating(&mut self, rating: u8, state: TriState) {
        if rating > MAX_RATING {
            return;
        }
        match state {
            TriState::Irrelevant => {
                self.ratings.remove(&rating);
            }
            state => {
                self.ratings.insert(rating, state);
            }
        }
    }

    pub fn toggle_rating(&mut self, rating: u8) -> TriState {
        let next = self.rating(rating).cycle();
        self.set_rating(rating, next);
        next
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    /// Reset every filter to its neutral value.
    pub fn clear(&mut self) {
        self.tags.clear();
        self.ratings.clear();
        self.query.clear();
    }

    /// Whether any filter constrains the view.
    pub fn is_active(&self) -> bool {
        !self.tags.is_empty() || !self.ratings.is_empty() || !self.query.trim().is_empty()
    }

    /// Drop filters on tags that no longer exist.
    pub fn retain_tags(&mut self, known: impl Fn(TagId) -> bool) {
        self.tags.retain(|tag, _| known(*tag));
    }

    fn matches(&self, entry: &TrackEntry, needle: Option<&str>) -> bool {
        self.matches_tags(entry)
            && self.matches_rating(entry.track.rating)
            && matches_text(&entry.track, needle)
    }

    fn matches_tags(&self, entry: &TrackEntry) -> bool {
        self.tags.iter().all(|(tag, state)| match state {
            TriState::Include => entry.has_tag(*tag),
            TriState::Exclude => !entry.has_tag(*tag),
            TriState::Irrelevant => true,
        })
    }

    fn matches_rating(&self, rating: u8) -> bool {
        let mut any_include = false;
        let mut included = false;

        for (value, state) in &self.ratings {
            match state {
                TriState::Include => {
                    any_include = true;
                    included |= *value == rating;
                }
                TriState::Exclude if *value == rating => return false,
                _ => {}
            }
        }

        !any_include || included
    }
}

fn matches_text(track: &Track, needle: Option<&str>) -> bool {
    let Some(needle) = needle else {
        return true;
    };

    [&track.title, &track.artist, &track.album]
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
}

// =============================================================================
// Sort state
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SortColumn {
    #[default]
    None,
    Title,
    Artist,
    Album,
    Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Active sort column and direction; at most one column is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct SortState {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl SortState {
    pub fn new(column: SortColumn, direction: SortDirection) -> Self {
        Self { column, direction }
    }

    pub fn is_active(&self) -> bool {
        self.column != SortColumn::None
    }

    /// Handle a click on a column header.
    ///
    /// The same column cycles None → Ascending → Descending → None; a different
    /// column starts over at Ascending.
    pub fn click(&mut self, column: SortColumn) {
        if column == SortColumn::None {
            *self = Self::default();
            return;
        }

        *self = if self.column != column {
            Self::new(column, SortDirection::Ascending)
        } else {
            match self.direction {
                SortDirection::Ascending => Self::new(column, SortDirection::Descending),
                SortDirection::Descending => Self::default(),
            }
        };
    }

    fn compare(&self, a: &SortKey, b: &SortKey) -> Ordering {
        let primary = match self.column {
            SortColumn::None => Ordering::Equal,
            SortColumn::Duration => a.duration.cmp(&b.duration),
            _ => a.text.cmp(&b.text),
        };

        let primary = match self.direction {
            SortDirection::Ascending => primary,
            SortDirection::Descending => primary.reverse(),
        };

        primary.then_with(|| a.id.cmp(&b.id))
    }
}

/// Precomputed comparison key so lowercasing happens once per track.
struct SortKey {
    text: String,
    duration: u64,
    id: i64,
}

impl SortKey {
    fn new(column: SortColumn, track: &Track) -> Self {
        let text = match column {
            SortColumn::Title => Track::normalize(&track.title),
            SortColumn::Artist => Track::normalize(&track.artist),
            SortColumn::Album => Track::normalize(&track.album),
            SortColumn::Duration | SortColumn::None => String::new(),
        };

        Self {
            text,
            duration: track.duration_ms,
            id: track.id.0,
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Produce the ordered visible subset of `entries`.
pub fn apply_filter_sort<'a>(
    entries: &'a [TrackEntry],
    filter: &FilterState,
    sort: &SortState,
) -> Vec<&'a TrackEntry> {
    let needle = filter.query.trim().to_lowercase();
    let needle = (!needle.is_empty()).then_some(needle.as_str());

    let visible = entries.iter().filter(|entry| filter.matches(entry, needle));

    if !sort.is_active() {
        return visible.collect();
    }

    let mut keyed: Vec<(SortKey, &TrackEntry)> = visible
        .map(|entry| (SortKey::new(sort.column, &entry.track), entry))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| sort.compare(a, b));
    keyed.into_iter().map(|(_, entry)| entry).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrackId;
    use std::path::PathBuf;

    const ROCK: TagId = TagId(1);
    const JAZZ: TagId = TagId(2);

    fn entry(id: i64, rating: u8, tags: &[TagId]) -> TrackEntry {
        TrackEntry::with_tags(
            Track {
                id: TrackId(id),
                path: PathBuf::from(format!("/music/{}.mp3", id)),
                title: format!("Track {}", id),
                artist: String::new(),
                album: String::new(),
                duration_ms: 1_000,
                fingerprint: format!("fp-{}", id),
                rating,
                created_at: 0,
                updated_at: 0,
            },
            tags.iter().copied(),
        )
    }

    fn titled(id: i64, title: &str, artist: &str, album: &str, duration_ms: u64) -> TrackEntry {
        let mut e = entry(id, 0, &[]);
        e.track.title = title.to_string();
        e.track.artist = artist.to_string();
        e.track.album = album.to_string();
        e.track.duration_ms = duration_ms;
        e
    }

    fn ids(view: &[&TrackEntry]) -> Vec<i64> {
        view.iter().map(|e| e.track.id.0).collect()
    }

    fn sample() -> Vec<TrackEntry> {
        vec![entry(1, 5, &[ROCK]), entry(2, 3, &[]), entry(3, 5, &[JAZZ])]
    }

    #[test]
    fn test_no_filters_keeps_catalog_order() {
        let catalog = sample();
        let view = apply_filter_sort(&catalog, &FilterState::new(), &SortState::default());
        assert_eq!(ids(&view), vec![1, 2, 3]);

        let again = apply_filter_sort(&catalog, &FilterState::new(), &SortState::default());
        assert_eq!(ids(&view), ids(&again));
    }

    #[test]
    fn test_include_rating_then_exclude_tag() {
        let catalog = sample();
        let mut filter = FilterState::new();

        filter.set_rating(5, TriState::Include);
        let view = apply_filter_sort(&catalog, &filter, &SortState::default());
        assert_eq!(ids(&view), vec![1, 3]);

        filter.set_tag(JAZZ, TriState::Exclude);
        let view = apply_filter_sort(&catalog, &filter, &SortState::default());
        assert_eq!(ids(&view), vec![1]);
    }

    #[test]
    fn test_tag_filters_commute() {
        let catalog = vec![
            entry(1, 0, &[ROCK]),
            entry(2, 0, &[ROCK, JAZZ]),
            entry(3, 0, &[JAZZ]),
            entry(4, 0, &[]),
        ];

        let mut first = FilterState::new();
        first.set_tag(ROCK, TriState::Include);
        first.set_tag(JAZZ, TriState::Exclude);

        let mut second = FilterState::new();
        second.set_tag(JAZZ, TriState::Exclude);
        second.set_tag(ROCK, TriState::Include);

        assert_eq!(first, second);
        let a = apply_filter_sort(&catalog, &first, &SortState::default());
        let b = apply_filter_sort(&catalog, &second, &SortState::default());
        assert_eq!(ids(&a), vec![1]);
        assert_eq!(ids(&a), ids(&b));
    }

    #[test]
    fn test_include_tags_are_intersected() {
        let catalog = vec![entry(1, 0, &[ROCK]), entry(2, 0, &[ROCK, JAZZ])];
        let mut filter = FilterState::new();
        filter.set_tag(ROCK, TriState::Include);
        filter.set_tag(JAZZ, TriState::Include);

        let view = apply_filter_sort(&catalog, &filter, &SortState::default());
        assert_eq!(ids(&view), vec![2]);
    }

    #[test]
    fn test_include_ratings_are_unioned() {
        let catalog = vec![entry(1, 3, &[]), entry(2, 4, &[]), entry(3, 5, &[])];
        let mut filter = FilterState::new();
        filter.set_rating(3, TriState::Include);
        filter.set_rating(5, TriState::Include);

        let view = apply_filter_sort(&catalog, &filter, &SortState::default());
        assert_eq!(ids(&view), vec![1, 3]);
    }

    #[test]
    fn test_exclude_rating_only() {
        let catalog = vec![entry(1, 0, &[]), entry(2, 4, &[]), entry(3, 0, &[])];
        let mut filter = FilterState::new();
        filter.set_rating(0, TriState::Exclude);

        let view = apply_filter_sort(&catalog, &filter, &SortState::default());
        assert_eq!(ids(&view), vec![2]);
    }

    #[test]
    fn test_out_of_range_rating_ignored() {
        let mut filter = FilterState::new();
        filter.set_rating(6, TriState::Include);
        assert!(!filter.is_active());
    }

    #[test]
    fn test_text_search_case_insensitive_across_fields() {
        let catalog = vec![
            titled(1, "Blue in Green", "Miles Davis", "Kind of Blue", 1),
            titled(2, "So What", "Miles Davis", "Kind of Blue", 1),
            titled(3, "Paranoid", "Black Sabbath", "Paranoid", 1),
        ];
        let mut filter = FilterState::new();

        filter.set_query("BLUE");
        assert_eq!(ids(&apply_filter_sort(&catalog, &filter, &SortState::default())), vec![1, 2]);

        filter.set_query("sabbath");
        assert_eq!(ids(&apply_filter_sort(&catalog, &filter, &SortState::default())), vec![3]);

        filter.set_query("   ");
        assert_eq!(apply_filter_sort(&catalog, &filter, &SortState::default()).len(), 3);
    }

    #[test]
    fn test_toggle_cycles_and_clear() {
        let mut filter = FilterState::new();
        assert_eq!(filter.toggle_tag(ROCK), TriState::Include);
        assert_eq!(filter.toggle_tag(ROCK), TriState::Exclude);
        assert_eq!(filter.toggle_tag(ROCK), TriState::Irrelevant);
        assert_eq!(filter, FilterState::new());

        filter.toggle_rating(4);
        filter.set_query("x");
        assert!(filter.is_active());
        filter.clear();
        assert!(!filter.is_active());
    }

    #[test]
    fn test_retain_tags_drops_deleted() {
        let mut filter = FilterState::new();
        filter.set_tag(ROCK, TriState::Include);
        filter.set_tag(JAZZ, TriState::Exclude);
        filter.retain_tags(|tag| tag == ROCK);
        assert_eq!(filter.tag(JAZZ), TriState::Irrelevant);
        assert_eq!(filter.tag(ROCK), TriState::Include);
    }

    #[test]
    fn test_sort_click_cycle() {
        let mut sort = SortState::default();

        sort.click(SortColumn::Title);
        assert_eq!(sort, SortState::new(SortColumn::Title, SortDirection::Ascending));
        sort.click(SortColumn::Title);
        assert_eq!(sort, SortState::new(SortColumn::Title, SortDirection::Descending));
        sort.click(SortColumn::Title);
        assert!(!sort.is_active());
        sort.click(SortColumn::Title);
        assert_eq!(sort, SortState::new(SortColumn::Title, SortDirection::Ascending));
    }

    #[test]
    fn test_sort_click_other_column_resets() {
        let mut sort = SortState::default();
        sort.click(SortColumn::Title);
        sort.click(SortColumn::Title);
        sort.click(SortColumn::Artist);
        assert_eq!(sort, SortState::new(SortColumn::Artist, SortDirection::Ascending));
    }

    #[test]
    fn test_sort_text_case_insensitive_with_id_tiebreak() {
        let catalog = vec![
            titled(4, "beta", "", "", 0),
            titled(2, "Alpha", "", "", 0),
            titled(3, "alpha", "", "", 0),
            titled(1, "Gamma", "", "", 0),
        ];

        let asc = SortState::new(SortColumn::Title, SortDirection::Ascending);
        assert_eq!(ids(&apply_filter_sort(&catalog, &FilterState::new(), &asc)), vec![2, 3, 4, 1]);

        let desc = SortState::new(SortColumn::Title, SortDirection::Descending);
        assert_eq!(ids(&apply_filter_sort(&catalog, &FilterState::new(), &desc)), vec![1, 4, 2, 3]);
    }

    #[test]
    fn test_sort_duration_numeric() {
        let catalog = vec![
            titled(1, "", "", "", 90_000),
            titled(2, "", "", "", 9_000),
            titled(3, "", "", "", 900_000),
        ];

        let asc = SortState::new(SortColumn::Duration, SortDirection::Ascending);
        assert_eq!(ids(&apply_filter_sort(&catalog, &FilterState::new(), &asc)), vec![2, 1, 3]);
    }

    #[test]
    fn test_sort_album_and_artist() {
        let catalog = vec![
            titled(1, "", "Zappa", "Apostrophe", 0),
            titled(2, "", "abba", "Waterloo", 0),
        ];

        let by_artist = SortState::new(SortColumn::Artist, SortDirection::Ascending);
        assert_eq!(ids(&apply_filter_sort(&catalog, &FilterState::new(), &by_artist)), vec![2, 1]);

        let by_album = SortState::new(SortColumn::Album, SortDirection::Ascending);
        assert_eq!(ids(&apply_filter_sort(&catalog, &FilterState::new(), &by_album)), vec![1, 2]);
    }

    #[test]
    fn test_filter_and_sort_combined() {
        let mut catalog = sample();
        catalog[0].track.title = "Zeta".to_string();
        catalog[2].track.title = "Alpha".to_string();

        let mut filter = FilterState::new();
        filter.set_rating(5, TriState::Include);
        let sort = SortState::new(SortColumn::Title, SortDirection::Ascending);

        assert_eq!(ids(&apply_filter_sort(&catalog, &filter, &sort)), vec![3, 1]);
    }
}

use std::collections::HashSet;

use pharmap_geo::Candidate;

use crate::coordinator::{Origin, SelectedLocation};

/// The ordered candidate list shown under the search box.
///
/// Visibility is tracked separately from emptiness: an empty result set
/// (list shown, "no results") and a post-selection closed list (list
/// hidden) must render differently.
#[derive(Debug, Default)]
pub struct SuggestionStore {
    candidates: Vec<Candidate>,
    visible: bool,
    failed: bool,
}

impl SuggestionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the visible list with the latest accepted results.
    ///
    /// Duplicate provider entries (same `source_id`) keep only their first
    /// occurrence; provider relevance order is otherwise preserved.
    pub fn replace(&mut self, candidates: Vec<Candidate>) {
        let mut seen = HashSet::new();
        self.candidates = candidates
            .into_iter()
            .filter(|c| seen.insert(c.source_id.clone()))
            .collect();
        self.visible = true;
        self.failed = false;
    }

    /// Record a provider failure: empty list, error flag set so the host
    /// can offer a non-blocking retry.
    pub fn mark_failed(&mut self) {
        self.candidates.clear();
        self.visible = true;
        self.failed = true;
    }

    /// Empty and hide the list.
    pub fn clear(&mut self) {
        self.candidates.clear();
        self.visible = false;
        self.failed = false;
    }

    /// Commit the candidate at `index`, clearing and hiding the list.
    ///
    /// Returns `None` when the index is out of range.
    pub fn select(&mut self, index: usize) -> Option<SelectedLocation> {
        let candidate = self.candidates.get(index)?.clone();
        self.clear();
        Some(SelectedLocation {
            coordinate: candidate.coordinate,
            address: candidate.display_name,
            origin: Origin::TextSearch,
        })
    }

    #[must_use]
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        self.failed
    }
}

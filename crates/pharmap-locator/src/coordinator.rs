use std::fmt;
use std::sync::{Arc, Mutex};

use pharmap_geo::{Candidate, Coordinate, Geocoder, InvalidCoordinate, ADDRESS_UNAVAILABLE};

use crate::search::SearchUpdate;
use crate::suggestions::SuggestionStore;
use crate::viewport::{MapViewport, Marker, FOCUS_ZOOM};

/// Provisional marker label while a click's reverse lookup is in flight.
pub const RESOLVING_ADDRESS: &str = "Resolving address...";

/// How a selection was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    TextSearch,
    MapClick,
    ManualEntry,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TextSearch => "text search",
            Self::MapClick => "map click",
            Self::ManualEntry => "manual entry",
        })
    }
}

/// The single source of truth consumed by the host form.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedLocation {
    pub coordinate: Coordinate,
    pub address: String,
    pub origin: Origin,
}

struct Inner {
    suggestions: SuggestionStore,
    viewport: MapViewport,
    selected: Option<SelectedLocation>,
    /// Bumped on every committed selection. A reverse lookup result only
    /// applies while the sequence it was spawned under is still current.
    selection_seq: u64,
    sender: async_broadcast::Sender<SelectedLocation>,
    /// Kept alive so the channel is never fully closed while the
    /// coordinator exists. Without this, new subscribers would
    /// immediately see `None`.
    _keep_alive: async_broadcast::InactiveReceiver<SelectedLocation>,
}

/// Reduces the three location inputs (suggestion selection, map clicks,
/// manual numeric entry) to one [`SelectedLocation`].
///
/// Whichever entry point fires last wins; a new selection fully supersedes
/// the previous one, and the viewport's active marker is updated under the
/// same lock as the selection itself.
///
/// Cloneable — all clones share the same state.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Mutex<Inner>>,
    geocoder: Arc<dyn Geocoder>,
    executor: Arc<async_executor::Executor<'static>>,
}

impl Coordinator {
    pub fn new(
        executor: Arc<async_executor::Executor<'static>>,
        geocoder: Arc<dyn Geocoder>,
        viewport: MapViewport,
    ) -> Self {
        let (mut sender, receiver) = async_broadcast::broadcast(16);
        sender.set_overflow(true);
        let keep_alive = receiver.deactivate();
        Self {
            inner: Arc::new(Mutex::new(Inner {
                suggestions: SuggestionStore::new(),
                viewport,
                selected: None,
                selection_seq: 0,
                sender,
                _keep_alive: keep_alive,
            })),
            geocoder,
            executor,
        }
    }

    /// Get a new receiver for selection updates.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn subscribe(&self) -> async_broadcast::Receiver<SelectedLocation> {
        self.inner.lock().expect("poisoned").sender.new_receiver()
    }

    /// Feed a search-loop update into the suggestion list.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn apply_search(&self, update: SearchUpdate) {
        let mut inner = self.inner.lock().expect("poisoned");
        match update {
            SearchUpdate::Cleared => inner.suggestions.clear(),
            SearchUpdate::Candidates { candidates, .. } => inner.suggestions.replace(candidates),
            SearchUpdate::Failed { query } => {
                tracing::debug!(%query, "marking suggestions failed");
                inner.suggestions.mark_failed();
            }
        }
    }

    /// Commit the suggestion at `index`.
    ///
    /// Recenters the map on the candidate, places the active marker, hides
    /// the list, and publishes the selection. The host is expected to
    /// clear its search text field on receipt. Returns `None` when the
    /// index does not name a current suggestion.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn select_suggestion(&self, index: usize) -> Option<SelectedLocation> {
        let mut inner = self.inner.lock().expect("poisoned");
        let selected = inner.suggestions.select(index)?;
        tracing::debug!(address = %selected.address, "suggestion selected");
        commit(&mut inner, selected.clone());
        Some(selected)
    }

    /// Handle a raw click on the map surface.
    ///
    /// The marker and selection move immediately; the clicked coordinate
    /// is authoritative. The address resolves in the background and is
    /// published as a second update, or falls back to the sentinel; either
    /// way the coordinate selection stands. A reverse result for a
    /// selection that has since been superseded is dropped.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn map_click(&self, coordinate: Coordinate) -> SelectedLocation {
        let (selected, seq) = {
            let mut inner = self.inner.lock().expect("poisoned");
            let coordinate = inner.viewport.user_click(coordinate);
            let selected = SelectedLocation {
                coordinate,
                address: RESOLVING_ADDRESS.to_owned(),
                origin: Origin::MapClick,
            };
            inner.suggestions.clear();
            commit(&mut inner, selected.clone());
            (selected, inner.selection_seq)
        };
        tracing::debug!(coordinate = %selected.coordinate, "map clicked");

        let geocoder = Arc::clone(&self.geocoder);
        let inner = Arc::clone(&self.inner);
        let coordinate = selected.coordinate;
        self.executor
            .spawn(async move {
                let address = match geocoder.reverse(coordinate).await {
                    Ok(address) => address,
                    Err(e) => {
                        tracing::warn!(coordinate = %coordinate, error = %e, "reverse lookup failed");
                        ADDRESS_UNAVAILABLE.to_owned()
                    }
                };
                apply_resolved_address(&inner, seq, address);
            })
            .detach();

        selected
    }

    /// Commit directly typed latitude/longitude.
    ///
    /// Trusted as-is: no geocoding call is made, and the address is the
    /// formatted coordinate pair until the user edits it.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn manual_entry(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<SelectedLocation, InvalidCoordinate> {
        let coordinate = Coordinate::try_new(latitude, longitude)?;
        let mut inner = self.inner.lock().expect("poisoned");
        let selected = SelectedLocation {
            coordinate,
            address: coordinate.to_string(),
            origin: Origin::ManualEntry,
        };
        inner.suggestions.clear();
        commit(&mut inner, selected.clone());
        Ok(selected)
    }

    /// Replace the static store markers rendered alongside the selection.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_store_markers(&self, markers: Vec<Marker>) {
        self.inner
            .lock()
            .expect("poisoned")
            .viewport
            .set_store_markers(markers);
    }

    /// The current selection, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn selected(&self) -> Option<SelectedLocation> {
        self.inner.lock().expect("poisoned").selected.clone()
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn map_center(&self) -> Coordinate {
        self.inner.lock().expect("poisoned").viewport.center()
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn map_zoom(&self) -> u8 {
        self.inner.lock().expect("poisoned").viewport.zoom()
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn active_marker(&self) -> Option<Marker> {
        self.inner
            .lock()
            .expect("poisoned")
            .viewport
            .active_marker()
            .cloned()
    }

    /// All markers to render.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn markers(&self) -> Vec<Marker> {
        self.inner.lock().expect("poisoned").viewport.markers()
    }

    /// Snapshot of the current suggestions.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn suggestions(&self) -> Vec<Candidate> {
        self.inner
            .lock()
            .expect("poisoned")
            .suggestions
            .candidates()
            .to_vec()
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn suggestions_visible(&self) -> bool {
        self.inner
            .lock()
            .expect("poisoned")
            .suggestions
            .is_visible()
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn suggestions_failed(&self) -> bool {
        self.inner.lock().expect("poisoned").suggestions.is_failed()
    }
}

/// Apply a committed selection: recenter, move the active marker, store,
/// and publish, all within the caller's lock, so the selection and the
/// marker never render inconsistently.
fn commit(inner: &mut Inner, selected: SelectedLocation) {
    inner.selection_seq += 1;
    inner.viewport.recenter(selected.coordinate, FOCUS_ZOOM);
    inner
        .viewport
        .set_active_marker(selected.coordinate, selected.address.clone());
    inner.selected = Some(selected.clone());
    let _ = inner.sender.try_broadcast(selected);
}

/// Late phase of a map click: attach the resolved (or sentinel) address to
/// the selection, unless a newer selection has superseded it.
fn apply_resolved_address(inner: &Arc<Mutex<Inner>>, seq: u64, address: String) {
    let mut inner = inner.lock().expect("poisoned");
    if inner.selection_seq != seq {
        tracing::trace!("dropping reverse result for superseded selection");
        return;
    }
    let updated = match &mut inner.selected {
        Some(selected) => {
            selected.address = address;
            selected.clone()
        }
        None => return,
    };
    inner.viewport.set_active_label(updated.address.clone());
    let _ = inner.sender.try_broadcast(updated);
}

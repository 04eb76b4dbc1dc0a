use pharmap_geo::Coordinate;

/// Zoom used for an uncommitted, country-level view.
pub const DEFAULT_ZOOM: u8 = 5;

/// Zoom applied when a selection commits and the map recenters on it.
pub const FOCUS_ZOOM: u8 = 15;

/// Marker id reserved for the active-selection marker.
const ACTIVE_MARKER_ID: &str = "active";

/// A rendered map marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub id: String,
    pub coordinate: Coordinate,
    pub label: String,
}

/// Map center, zoom, and markers.
///
/// Static store markers (existing pharmacies from the backend) are kept
/// apart from the single active-selection marker, which is replaced, never
/// accumulated.
#[derive(Debug)]
pub struct MapViewport {
    center: Coordinate,
    zoom: u8,
    store_markers: Vec<Marker>,
    active: Option<Marker>,
}

impl MapViewport {
    #[must_use]
    pub fn new(center: Coordinate, zoom: u8) -> Self {
        Self {
            center,
            zoom,
            store_markers: Vec::new(),
            active: None,
        }
    }

    /// Pan and zoom to `center`.
    pub fn recenter(&mut self, center: Coordinate, zoom: u8) {
        self.center = center;
        self.zoom = zoom;
    }

    /// Raw map interaction. The clicked coordinate is passed upward
    /// unresolved; the viewport does not know the address.
    #[must_use]
    pub fn user_click(&self, coordinate: Coordinate) -> Coordinate {
        coordinate
    }

    /// Place the active-selection marker, replacing any prior one.
    pub fn set_active_marker(&mut self, coordinate: Coordinate, label: impl Into<String>) {
        self.active = Some(Marker {
            id: ACTIVE_MARKER_ID.to_owned(),
            coordinate,
            label: label.into(),
        });
    }

    /// Update the active marker's label in place. No-op without an active
    /// marker.
    pub fn set_active_label(&mut self, label: impl Into<String>) {
        if let Some(marker) = &mut self.active {
            marker.label = label.into();
        }
    }

    /// Replace the static store markers.
    pub fn set_store_markers(&mut self, markers: Vec<Marker>) {
        self.store_markers = markers;
    }

    #[must_use]
    pub const fn center(&self) -> Coordinate {
        self.center
    }

    #[must_use]
    pub const fn zoom(&self) -> u8 {
        self.zoom
    }

    #[must_use]
    pub fn store_markers(&self) -> &[Marker] {
        &self.store_markers
    }

    #[must_use]
    pub const fn active_marker(&self) -> Option<&Marker> {
        self.active.as_ref()
    }

    /// All markers to render: store markers followed by the active one.
    #[must_use]
    pub fn markers(&self) -> Vec<Marker> {
        let mut markers = self.store_markers.clone();
        markers.extend(self.active.clone());
        markers
    }
}

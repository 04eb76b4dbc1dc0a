pub mod nominatim;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Sentinel address published when reverse lookup yields nothing usable.
///
/// An unresolved address never blocks a coordinate selection, so this is a
/// display value rather than an error.
pub const ADDRESS_UNAVAILABLE: &str = "Address not available";

/// A point on the map.
///
/// Latitude is bounded to `[-90, 90]`, longitude to `[-180, 180]`.
/// Validated on construction — accessors are infallible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    pub fn try_new(latitude: f64, longitude: f64) -> Result<Self, InvalidCoordinate> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(InvalidCoordinate(format!(
                "latitude must be in [-90, 90], got {latitude}"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(InvalidCoordinate(format!(
                "longitude must be in [-180, 180], got {longitude}"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Panicking constructor. Use when the value is known at compile time.
    ///
    /// # Panics
    ///
    /// Panics if either component is out of range.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self::try_new(latitude, longitude).unwrap_or_else(|e| panic!("{e}"))
    }

    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// Error returned when constructing an invalid [`Coordinate`].
#[derive(Debug, Clone)]
pub struct InvalidCoordinate(String);

impl fmt::Display for InvalidCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid coordinate: {}", self.0)
    }
}

impl std::error::Error for InvalidCoordinate {}

/// One forward-search result from the provider.
///
/// `source_id` is the provider's opaque identifier, used only to
/// de-duplicate results for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub coordinate: Coordinate,
    pub display_name: String,
    pub source_id: String,
}

/// Failure of a geocoder call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The request did not complete within the timeout.
    Timeout,
    /// Transport-level failure.
    Http(String),
    /// The provider answered with a non-success status.
    Status(u16),
    /// The response body did not match the expected shape.
    Payload(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("geocoder request timed out"),
            Self::Http(e) => write!(f, "geocoder request failed: {e}"),
            Self::Status(code) => write!(f, "geocoder returned status {code}"),
            Self::Payload(e) => write!(f, "malformed geocoder response: {e}"),
        }
    }
}

impl std::error::Error for ProviderError {}

/// A geocoding provider.
///
/// Results come back in provider relevance order and are not re-ranked.
pub trait Geocoder: Send + Sync + 'static {
    /// Forward search: resolve a free-text query to at most `limit` candidates.
    fn forward(
        &self,
        query: String,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Candidate>, ProviderError>> + Send + '_>>;

    /// Reverse lookup: resolve a coordinate to a display address.
    ///
    /// A provider "no result" resolves to [`ADDRESS_UNAVAILABLE`] rather
    /// than an error.
    fn reverse(
        &self,
        coordinate: Coordinate,
    ) -> Pin<Box<dyn Future<Output = Result<String, ProviderError>> + Send + '_>>;
}

//! Location-search and map-synchronization engine for the pharmacy
//! store-locator screens.
//!
//! Three independently triggered inputs (free-text search, suggestion
//! selection, raw map clicks) are reduced to one canonical
//! [`SelectedLocation`](coordinator::SelectedLocation) by the
//! [`Coordinator`](coordinator::Coordinator). Forward searches are
//! debounced and fenced by request id in [`search`], so out-of-order
//! provider responses never surface stale suggestions.

pub mod coordinator;
pub mod search;
pub mod stores;
pub mod suggestions;
pub mod viewport;

pub use coordinator::{Coordinator, Origin, SelectedLocation};
pub use search::{SearchController, SearchUpdate};
pub use suggestions::SuggestionStore;
pub use viewport::{MapViewport, Marker};

#[cfg(test)]
pub(crate) mod testutil;

use std::fmt;
use std::time::Duration;

use isahc::prelude::*;
use isahc::Request;

use pharmap_geo::Coordinate;

use crate::viewport::Marker;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Errors returned by the store directory client.
#[derive(Debug)]
pub struct Error(String);

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Error {}

/// An existing pharmacy, rendered as a static map marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Store {
    pub id: u64,
    pub name: String,
    pub coordinate: Coordinate,
}

#[derive(serde::Deserialize)]
struct StoreRecord {
    id: u64,
    name: String,
    latitude: f64,
    longitude: f64,
}

/// Read-only client for the backend's store-listing endpoint.
pub struct Directory {
    base_url: String,
}

impl Directory {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    /// Fetch all stores.
    pub async fn list(&self) -> Result<Vec<Store>, Error> {
        let url = format!("{}/stores", self.base_url);
        let request = Request::get(&url)
            .timeout(TIMEOUT)
            .body(())
            .map_err(|e| Error(format!("build request for {url}: {e}")))?;

        let client = isahc::HttpClient::new().map_err(|e| Error(e.to_string()))?;
        let mut response = client
            .send_async(request)
            .await
            .map_err(|e| Error(format!("fetch {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(Error(format!(
                "store listing returned status {}",
                response.status()
            )));
        }

        let body = response.text().await.map_err(|e| Error(e.to_string()))?;
        parse_stores(&body)
    }
}

fn parse_stores(body: &str) -> Result<Vec<Store>, Error> {
    let records: Vec<StoreRecord> =
        serde_json::from_str(body).map_err(|e| Error(format!("parse store listing: {e}")))?;

    Ok(records
        .into_iter()
        .filter_map(|r| match Coordinate::try_new(r.latitude, r.longitude) {
            Ok(coordinate) => Some(Store {
                id: r.id,
                name: r.name,
                coordinate,
            }),
            Err(e) => {
                tracing::warn!(store = r.id, error = %e, "skipping store with bad coordinates");
                None
            }
        })
        .collect())
}

/// Static markers for the given stores, keyed by backend id so a reload
/// replaces rather than accumulates.
#[must_use]
pub fn markers(stores: &[Store]) -> Vec<Marker> {
    stores
        .iter()
        .map(|s| Marker {
            id: format!("store-{}", s.id),
            coordinate: s.coordinate,
            label: s.name.clone(),
        })
        .collect()
}

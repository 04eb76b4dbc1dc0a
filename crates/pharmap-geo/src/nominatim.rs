use std::fmt::Write as _;
use std::time::Duration;

use isahc::prelude::*;
use isahc::Request;

use super::{Candidate, Coordinate, Geocoder, ProviderError, ADDRESS_UNAVAILABLE};

/// Public Nominatim instance. Self-hosted deployments can point elsewhere
/// via [`Backend::with_base_url`].
pub const DEFAULT_URL: &str = "https://nominatim.openstreetmap.org";

const TIMEOUT: Duration = Duration::from_secs(5);
const USER_AGENT: &str = "pharmap/0.1 (store locator)";

/// Nominatim-compatible geocoding backend.
#[derive(Clone)]
pub struct Backend {
    base_url: String,
}

impl Default for Backend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend {
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }
}

impl Geocoder for Backend {
    fn forward(
        &self,
        query: String,
        limit: usize,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<Candidate>, ProviderError>> + Send + '_>,
    > {
        Box::pin(async move {
            let url = format!(
                "{}/search?format=json&q={}&limit={limit}",
                self.base_url,
                percent_encode(&query)
            );
            let body = fetch(&url).await?;
            parse_search(&body, limit)
        })
    }

    fn reverse(
        &self,
        coordinate: Coordinate,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<String, ProviderError>> + Send + '_>>
    {
        Box::pin(async move {
            let url = format!(
                "{}/reverse?format=json&lat={}&lon={}",
                self.base_url,
                coordinate.latitude(),
                coordinate.longitude()
            );
            let body = fetch(&url).await?;
            parse_reverse(&body)
        })
    }
}

async fn fetch(url: &str) -> Result<String, ProviderError> {
    let request = Request::get(url)
        .timeout(TIMEOUT)
        .header("User-Agent", USER_AGENT)
        .body(())
        .map_err(|e| ProviderError::Http(e.to_string()))?;

    let client = isahc::HttpClient::new().map_err(|e| ProviderError::Http(e.to_string()))?;
    let mut response = client.send_async(request).await.map_err(|e| {
        if matches!(e.kind(), isahc::error::ErrorKind::Timeout) {
            ProviderError::Timeout
        } else {
            ProviderError::Http(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(ProviderError::Status(response.status().as_u16()));
    }

    response
        .text()
        .await
        .map_err(|e| ProviderError::Http(e.to_string()))
}

#[derive(serde::Deserialize)]
struct SearchResult {
    place_id: i64,
    // Nominatim serializes coordinates as strings.
    lat: String,
    lon: String,
    display_name: String,
}

fn parse_search(body: &str, limit: usize) -> Result<Vec<Candidate>, ProviderError> {
    let results: Vec<SearchResult> =
        serde_json::from_str(body).map_err(|e| ProviderError::Payload(e.to_string()))?;

    results
        .into_iter()
        .take(limit)
        .map(|r| {
            let latitude = r
                .lat
                .parse::<f64>()
                .map_err(|e| ProviderError::Payload(format!("lat: {e}")))?;
            let longitude = r
                .lon
                .parse::<f64>()
                .map_err(|e| ProviderError::Payload(format!("lon: {e}")))?;
            let coordinate = Coordinate::try_new(latitude, longitude)
                .map_err(|e| ProviderError::Payload(e.to_string()))?;
            Ok(Candidate {
                coordinate,
                display_name: r.display_name,
                source_id: r.place_id.to_string(),
            })
        })
        .collect()
}

#[derive(serde::Deserialize)]
struct ReverseResult {
    display_name: Option<String>,
    // Present instead of `display_name` when the point resolves to nothing,
    // still with a 200 status.
    error: Option<String>,
}

fn parse_reverse(body: &str) -> Result<String, ProviderError> {
    let result: ReverseResult =
        serde_json::from_str(body).map_err(|e| ProviderError::Payload(e.to_string()))?;
    if result.error.is_some() {
        return Ok(ADDRESS_UNAVAILABLE.to_owned());
    }
    Ok(result
        .display_name
        .unwrap_or_else(|| ADDRESS_UNAVAILABLE.to_owned()))
}

/// Percent-encode a string for use in a URL query parameter.
fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len() * 2);
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    out
}

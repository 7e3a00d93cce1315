//! Server directory: the catalog of measurement endpoints.

use crate::errors::SpeedTestError;
use crate::location::{ClientLocation, Coordinate};
use crate::speedtest::client::Client;
use crate::speedtest::requests::servers::{ServerEntry, ServersRequest};
use log::{debug, info};
use serde::Serialize;
use url::Url;

pub const CUSTOM_SERVER_ID: &str = "custom";

/// A server that can be probed and measured against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Endpoint {
    pub id: String,
    pub name: String,
    pub sponsor: String,
    pub country: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub country_code: String,
    pub lat: f64,
    pub lon: f64,
    /// Upload URL; download and latency resources live next to it.
    pub url: Url,
    pub host: String,
    /// Great-circle distance from the client, unknown for custom URLs.
    #[serde(rename = "distance")]
    pub distance_km: Option<f64>,
}

impl Endpoint {
    /// A synthetic endpoint for a user supplied URL.
    pub fn custom(url: &str) -> Result<Self, SpeedTestError> {
        let url = Url::parse(url).map_err(|e| {
            SpeedTestError::config(format!("invalid custom URL \"{}\"", url))
                .with_source(e)
        })?;

        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(SpeedTestError::config(format!(
                "custom URL must be an http(s) URL with a host, got \"{}\"",
                url
            )));
        }

        let host = match url.port() {
            Some(port) => format!("{}:{}", url.host_str().unwrap_or_default(), port),
            None => url.host_str().unwrap_or_default().to_string(),
        };

        Ok(Endpoint {
            id: CUSTOM_SERVER_ID.to_string(),
            name: host.clone(),
            sponsor: "Custom".to_string(),
            country: String::new(),
            country_code: String::new(),
            lat: 0.0,
            lon: 0.0,
            url,
            host,
            distance_km: None,
        })
    }

    /// Build an endpoint from a catalog entry; `None` for unusable entries.
    fn from_entry(entry: ServerEntry, client: &Coordinate) -> Option<Self> {
        let lat = entry.lat.trim().parse::<f64>().ok()?;
        let lon = entry.lon.trim().parse::<f64>().ok()?;
        let coordinate = Coordinate::new(lat, lon).ok()?;
        let url = Url::parse(&entry.url).ok()?;

        Some(Endpoint {
            id: entry.id,
            name: entry.name,
            sponsor: entry.sponsor,
            country: entry.country,
            country_code: entry.cc,
            lat,
            lon,
            url,
            host: entry.host,
            distance_km: Some(client.distance_km(&coordinate)),
        })
    }

    pub fn upload_url(&self) -> Url {
        self.url.clone()
    }

    pub fn latency_url(&self) -> Url {
        self.sibling("latency.txt")
    }

    /// `random{size}x{size}.jpg` next to the upload script.
    pub fn download_url(&self, size: u32) -> Url {
        self.sibling(&format!("random{}x{}.jpg", size, size))
    }

    fn sibling(&self, name: &str) -> Url {
        let mut url = self.url.clone();
        url.set_query(None);
        url.set_fragment(None);

        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop().push(name);
        }
        url
    }
}

/// Endpoints sorted by ascending distance from the client.
#[derive(Debug, Clone)]
pub struct Directory {
    endpoints: Vec<Endpoint>,
}

impl Directory {
    /// Fetch the remote catalog. Not retried: an unreachable catalog fails
    /// the run.
    pub async fn fetch(
        client: &Client,
        location: &ClientLocation,
    ) -> Result<Self, SpeedTestError> {
        info!("Fetching server list");

        let entries =
            client.send(ServersRequest::default()).await.map_err(|e| {
                SpeedTestError::directory_unavailable(
                    "could not fetch the server list",
                )
                .with_source(e)
            })?;

        Self::from_entries(entries, location)
    }

    pub fn from_entries(
        entries: Vec<ServerEntry>,
        location: &ClientLocation,
    ) -> Result<Self, SpeedTestError> {
        let client = location.coordinate();
        let total = entries.len();

        let mut endpoints: Vec<Endpoint> = entries
            .into_iter()
            .filter_map(|entry| {
                let id = entry.id.clone();
                let endpoint = Endpoint::from_entry(entry, &client);
                if endpoint.is_none() {
                    debug!("Dropping unusable server entry {}", id);
                }
                endpoint
            })
            .collect();

        if endpoints.is_empty() {
            return Err(SpeedTestError::directory_unavailable(format!(
                "the server list had no usable servers ({} entries)",
                total
            )));
        }

        endpoints.sort_by(|a, b| {
            let a = a.distance_km.unwrap_or(f64::INFINITY);
            let b = b.distance_km.unwrap_or(f64::INFINITY);
            a.total_cmp(&b)
        });

        debug!("{} of {} servers usable", endpoints.len(), total);

        Ok(Directory { endpoints })
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Select servers to test.
    ///
    /// With no ids the nearest server is chosen. Otherwise every id must be
    /// in the catalog, and the servers come back in the requested order.
    pub fn find(&self, ids: &[String]) -> Result<Vec<Endpoint>, SpeedTestError> {
        if ids.is_empty() {
            return Ok(self.endpoints.iter().take(1).cloned().collect());
        }

        ids.iter()
            .map(|id| {
                self.endpoints
                    .iter()
                    .find(|endpoint| endpoint.id == *id)
                    .cloned()
                    .ok_or_else(|| SpeedTestError::unknown_identifier(id))
            })
            .collect()
    }
}

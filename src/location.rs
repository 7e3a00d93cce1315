//! Client location and great-circle distance.

use crate::errors::SpeedTestError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Mean equatorial radius used for server distances, in kilometres.
const EARTH_RADIUS_KM: f64 = 6378.137;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self, SpeedTestError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(SpeedTestError::invalid_location(format!(
                "latitude {} is outside of [-90, 90]",
                lat
            )));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(SpeedTestError::invalid_location(format!(
                "longitude {} is outside of [-180, 180]",
                lon
            )));
        }

        Ok(Self { lat, lon })
    }

    /// Haversine distance to `other`, in kilometres.
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();

        let a = (d_lat / 2.0).sin().powi(2)
            + self.lat.to_radians().cos()
                * other.lat.to_radians().cos()
                * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());

        EARTH_RADIUS_KM * c
    }
}

impl FromStr for Coordinate {
    type Err = SpeedTestError;

    /// Parses `"lat,lon"`, whitespace around either part is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            SpeedTestError::invalid_location(format!(
                "expected \"lat,lon\", got \"{}\"",
                s
            ))
        };

        let (lat, lon) = s.split_once(',').ok_or_else(invalid)?;
        let lat = lat.trim().parse::<f64>().map_err(|_| invalid())?;
        let lon = lon.trim().parse::<f64>().map_err(|_| invalid())?;

        Coordinate::new(lat, lon)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.lat, self.lon)
    }
}

/// Where the client is testing from.
#[derive(Debug, Clone, Serialize)]
pub struct ClientLocation {
    #[serde(rename = "IP")]
    pub ip: String,
    #[serde(rename = "Isp")]
    pub isp: String,
    #[serde(rename = "Country", skip_serializing_if = "String::is_empty")]
    pub country: String,
    #[serde(rename = "Lat")]
    pub lat: f64,
    #[serde(rename = "Lon")]
    pub lon: f64,
    /// City label or "Custom" once the location was overridden.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl ClientLocation {
    /// Location used when client info could not be fetched.
    pub fn unknown() -> Self {
        Self {
            ip: String::new(),
            isp: String::new(),
            country: String::new(),
            lat: 0.0,
            lon: 0.0,
            label: None,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate { lat: self.lat, lon: self.lon }
    }

    /// Override with an explicit `"lat,lon"` coordinate.
    ///
    /// On error the current location is left untouched.
    pub fn parse_and_set_location(
        &mut self,
        input: &str,
    ) -> Result<(), SpeedTestError> {
        let coordinate = input.parse::<Coordinate>()?;
        self.set_location("Custom", coordinate);
        Ok(())
    }

    /// Override with one of the [`CITIES`] labels, matched case-insensitively.
    pub fn set_location_by_city(
        &mut self,
        city: &str,
    ) -> Result<(), SpeedTestError> {
        let (label, coordinate) = find_city(city).ok_or_else(|| {
            SpeedTestError::invalid_location(format!(
                "unknown city label \"{}\"",
                city
            ))
            .with_suggestion("Run with --city-list to see the known labels.")
        })?;

        self.set_location(label, coordinate);
        Ok(())
    }

    fn set_location(&mut self, label: &str, coordinate: Coordinate) {
        self.lat = coordinate.lat;
        self.lon = coordinate.lon;
        self.label = Some(label.to_string());
    }
}

impl fmt::Display for ClientLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) [{}]", self.ip, self.isp, self.coordinate())?;
        if let Some(ref label) = self.label {
            write!(f, " {}", label)?;
        }
        Ok(())
    }
}

/// Named locations accepted by `--city`.
pub const CITIES: &[(&str, f64, f64)] = &[
    ("amsterdam", 52.3676, 4.9041),
    ("beijing", 39.9042, 116.4074),
    ("frankfurt", 50.1109, 8.6821),
    ("hongkong", 22.3193, 114.1694),
    ("london", 51.5074, -0.1278),
    ("losangeles", 34.0522, -118.2437),
    ("newyork", 40.7128, -74.0060),
    ("osaka", 34.6952, 135.5006),
    ("paris", 48.8566, 2.3522),
    ("saopaulo", -23.5505, -46.6333),
    ("singapore", 1.3521, 103.8198),
    ("sydney", -33.8688, 151.2093),
    ("tokyo", 35.6762, 139.6503),
];

fn find_city(name: &str) -> Option<(&'static str, Coordinate)> {
    let wanted: String = name
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect();

    CITIES
        .iter()
        .find(|(label, _, _)| *label == wanted)
        .map(|(label, lat, lon)| (*label, Coordinate { lat: *lat, lon: *lon }))
}

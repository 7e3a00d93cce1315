use crate::location::ClientLocation;
use crate::speedtest::requests::{Format, Request};
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL};
use serde::de::{Error, Visitor};
use serde::{Deserialize, Deserializer};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Formatter;

const CONFIG_URL: &str = "https://www.speedtest.net/speedtest-config.php";

/// The `<client .../>` element of the speedtest.net configuration document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientInfo {
    pub ip: String,
    pub lat: f64,
    pub lon: f64,
    pub isp: String,
    pub country: String,
}

impl From<ClientInfo> for ClientLocation {
    fn from(info: ClientInfo) -> Self {
        ClientLocation {
            ip: info.ip,
            isp: info.isp,
            country: info.country,
            lat: info.lat,
            lon: info.lon,
            label: None,
        }
    }
}

pub struct ClientConfigRequest;

impl Request for ClientConfigRequest {
    type Response = ClientInfo;

    const FORMAT: Format = Format::Plain;

    fn url(&self) -> Cow<'_, str> {
        CONFIG_URL.into()
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers
    }
}

impl<'de> Deserialize<'de> for ClientInfo {
    fn deserialize<D>(deserializer: D) -> Result<ClientInfo, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(ClientInfoVisitor)
    }
}

struct ClientInfoVisitor;

impl<'de> Visitor<'de> for ClientInfoVisitor {
    type Value = ClientInfo;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("a configuration document with a <client> element")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: Error,
    {
        let start = v
            .find("<client ")
            .ok_or_else(|| E::custom("missing <client> element"))?;
        let element = &v[start + "<client ".len()..];
        let end = element
            .find('>')
            .ok_or_else(|| E::custom("unterminated <client> element"))?;

        let attributes = parse_attributes(&element[..end]);

        let coordinate = |name: &str| -> Result<f64, E> {
            attributes
                .get(name)
                .ok_or_else(|| E::missing_field("lat/lon"))?
                .parse::<f64>()
                .map_err(|e| E::custom(format!("bad {}: {}", name, e)))
        };

        Ok(ClientInfo {
            ip: attributes.get("ip").cloned().unwrap_or_default(),
            lat: coordinate("lat")?,
            lon: coordinate("lon")?,
            isp: attributes.get("isp").cloned().unwrap_or_default(),
            country: attributes.get("country").cloned().unwrap_or_default(),
        })
    }
}

/// Parses `key="value"` pairs, ignoring anything that does not fit.
fn parse_attributes(raw: &str) -> HashMap<String, String> {
    let mut attributes = HashMap::new();
    let mut rest = raw;

    while let Some(eq) = rest.find("=\"") {
        let key = rest[..eq].trim().trim_start_matches('/').trim();
        let value_start = eq + 2;
        let Some(value_len) = rest[value_start..].find('"') else { break };

        if !key.is_empty() {
            attributes.insert(
                key.to_string(),
                rest[value_start..value_start + value_len].to_string(),
            );
        }
        rest = &rest[value_start + value_len + 1..];
    }

    attributes
}

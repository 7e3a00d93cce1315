use crate::speedtest::requests::Request;
use serde::{Deserialize, Deserializer};
use std::borrow::Cow;

const SERVERS_URL: &str = "https://www.speedtest.net/api/js/servers";

/// One entry of the speedtest.net server catalog.
///
/// The catalog encodes coordinates and ids as strings; both forms are
/// accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerEntry {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub url: String,
    #[serde(deserialize_with = "string_or_number")]
    pub lat: String,
    #[serde(deserialize_with = "string_or_number")]
    pub lon: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub cc: String,
    #[serde(default)]
    pub sponsor: String,
    #[serde(default)]
    pub host: String,
}

pub struct ServersRequest {
    pub limit: usize,
}

impl Default for ServersRequest {
    fn default() -> Self {
        Self { limit: 10 }
    }
}

impl Request for ServersRequest {
    type Response = Vec<ServerEntry>;

    fn url(&self) -> Cow<'_, str> {
        format!("{}?engine=js&limit={}", SERVERS_URL, self.limit).into()
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}

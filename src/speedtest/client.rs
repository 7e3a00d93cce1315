use crate::errors::{SpeedTestError, TransportError};
use crate::speedtest::requests::{Format, Request, DEFAULT_USER_AGENT};
use crate::speedtest::transport::{ChunkStream, Transport, UploadBody};
use futures::{StreamExt, TryStreamExt};
use log::debug;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE,
};
use reqwest::{Body, Client as ReqwestClient, Method, Proxy, RequestBuilder};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;
use url::Url;

/// Header carrying [`EndpointAuth::auth_type`].
pub const AUTH_TYPE_HEADER: &str = "x-auth-type";
/// Header carrying [`EndpointAuth::token`].
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";
/// Auth type sent when only a token is given.
pub const DEFAULT_AUTH_TYPE: &str = "ext_authz";

/// Credentials a custom server checks before it serves test traffic.
///
/// Sent with every ping, download and upload request, never with the
/// speedtest.net setup requests.
#[derive(Clone, PartialEq, Eq)]
pub struct EndpointAuth {
    pub auth_type: String,
    pub token: String,
}

impl EndpointAuth {
    fn headers(&self) -> Result<HeaderMap, SpeedTestError> {
        let value = |name: &str, raw: &str| {
            HeaderValue::from_str(raw).map_err(|e| {
                SpeedTestError::config(format!("invalid {} value", name))
                    .with_source(e)
            })
        };

        let mut token = value("--token", &self.token)?;
        token.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(AUTH_TYPE_HEADER),
            value("--auth-type", &self.auth_type)?,
        );
        headers.insert(HeaderName::from_static(AUTH_TOKEN_HEADER), token);
        Ok(headers)
    }
}

impl fmt::Debug for EndpointAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointAuth")
            .field("auth_type", &self.auth_type)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Transport settings passed through to the HTTP client untouched.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// `http://`, `https://` or `socks5://` proxy for all traffic.
    pub proxy: Option<String>,
    /// Local address to bind, `ip` or `tcp[4|6]://ip`.
    pub source: Option<String>,
    pub user_agent: String,
    pub connect_timeout: Duration,
    /// Limit for each setup request, from connect to the last body byte.
    /// Measurement traffic is bounded by the endpoint deadline instead.
    /// Default: 20s
    pub request_timeout: Duration,
    pub auth: Option<EndpointAuth>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            source: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(20),
            auth: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    client: ReqwestClient,
    request_timeout: Duration,
    /// Empty unless [`TransportConfig::auth`] is set.
    auth_headers: HeaderMap,
}

impl Client {
    pub fn new(config: &TransportConfig) -> Result<Self, SpeedTestError> {
        let mut builder = ReqwestClient::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout);

        if let Some(ref proxy) = config.proxy {
            let proxy = Proxy::all(proxy).map_err(|e| {
                SpeedTestError::config(format!("invalid proxy \"{}\"", proxy))
                    .with_source(e)
            })?;
            builder = builder.proxy(proxy);
        }

        if let Some(ref source) = config.source {
            let address = parse_source(source)?;
            debug!("Binding outgoing connections to {}", address);
            builder = builder.local_address(address);
        }

        let auth_headers = match config.auth {
            Some(ref auth) => auth.headers()?,
            None => HeaderMap::new(),
        };

        let client = builder.build().map_err(|e| {
            SpeedTestError::config("failed to build the HTTP client")
                .with_source(e)
        })?;

        Ok(Client {
            client,
            request_timeout: config.request_timeout,
            auth_headers,
        })
    }

    pub async fn send<R: Request>(
        &self,
        request: R,
    ) -> Result<R::Response, TransportError> {
        let url = request.url();
        debug!("{} {}", R::METHOD, url);

        let response = self
            .client
            .request(R::METHOD, url.as_ref())
            .headers(request.headers())
            .timeout(self.request_timeout)
            .send()
            .await?
            .error_for_status()?;

        let text = response.text().await?;
        decode::<R>(&url, &text)
    }

    /// A ping, download or upload request against a test server.
    fn measurement(&self, method: Method, url: &Url) -> RequestBuilder {
        self.client
            .request(method, cache_busted(url))
            .headers(self.auth_headers.clone())
    }
}

fn decode<R: Request>(
    url: &str,
    text: &str,
) -> Result<R::Response, TransportError> {
    let unexpected = |e: String| {
        TransportError::Other(format!("unexpected response from {}: {}", url, e))
    };

    match R::FORMAT {
        Format::Json => {
            serde_json::from_str(text).map_err(|e| unexpected(e.to_string()))
        }
        Format::Plain => {
            serde_plain::from_str(text).map_err(|e| unexpected(e.to_string()))
        }
    }
}

impl Transport for Client {
    async fn ping(&self, url: &Url) -> Result<(), TransportError> {
        let response = self
            .measurement(Method::GET, url)
            .send()
            .await?
            .error_for_status()?;

        response.bytes().await?;
        Ok(())
    }

    async fn download(&self, url: &Url) -> Result<ChunkStream, TransportError> {
        let response = self
            .measurement(Method::GET, url)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.bytes_stream().map_err(TransportError::from).boxed())
    }

    async fn upload(
        &self,
        url: &Url,
        body: UploadBody,
    ) -> Result<(), TransportError> {
        let content_length = body.content_length();
        let body = match body {
            UploadBody::Full(bytes) => Body::from(bytes),
            UploadBody::Streaming { stream, .. } => Body::wrap_stream(stream),
        };

        let response = self
            .measurement(Method::POST, url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"))
            .header(CONTENT_LENGTH, content_length)
            .body(body)
            .send()
            .await?
            .error_for_status()?;

        response.bytes().await?;
        Ok(())
    }
}

/// Appends a unique query parameter so that no cache answers for the server.
fn cache_busted(url: &Url) -> Url {
    let nonce = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();

    let mut url = url.clone();
    url.query_pairs_mut().append_pair("nocache", &nonce.to_string());
    url
}

/// Parses `--source`: a bare IP or `tcp://ip`, `tcp4://ip`, `tcp6://ip`.
pub fn parse_source(source: &str) -> Result<IpAddr, SpeedTestError> {
    let invalid = || {
        SpeedTestError::config(format!(
            "invalid source interface \"{}\", expected tcp[4|6]://ip",
            source
        ))
    };

    let (scheme, address) = match source.split_once("://") {
        Some((scheme, address)) => (Some(scheme), address),
        None => (None, source),
    };

    let address = address.trim_start_matches('[').trim_end_matches(']');
    let ip: IpAddr = address.parse().map_err(|_| invalid())?;

    match (scheme, ip) {
        (None, _) | (Some("tcp"), _) => Ok(ip),
        (Some("tcp4"), IpAddr::V4(_)) => Ok(ip),
        (Some("tcp6"), IpAddr::V6(_)) => Ok(ip),
        _ => Err(invalid()),
    }
}

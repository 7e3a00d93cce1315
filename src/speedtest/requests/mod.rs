pub mod config;
pub mod servers;

use reqwest::{header::HeaderMap, Method};
use serde::Deserialize;
use std::borrow::Cow;

/// User agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = concat!(
    env!("CARGO_PKG_NAME"),
    "/",
    env!("CARGO_PKG_VERSION"),
    " (compatible; speedtest.net)"
);

/// How a response body is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    /// A single string, handed to the response's `Deserialize` impl.
    Plain,
}

/// A setup request against the speedtest.net API.
///
/// Measurement traffic does not go through this trait, see
/// [`crate::speedtest::transport::Transport`].
pub trait Request {
    type Response: for<'de> Deserialize<'de>;

    const METHOD: Method = Method::GET;

    const FORMAT: Format = Format::Json;

    fn url(&self) -> Cow<'_, str>;

    fn headers(&self) -> HeaderMap {
        HeaderMap::new()
    }
}

impl<R: Request> Request for &R {
    type Response = R::Response;

    const METHOD: Method = R::METHOD;

    const FORMAT: Format = R::FORMAT;

    fn url(&self) -> Cow<'_, str> {
        (**self).url()
    }

    fn headers(&self) -> HeaderMap {
        (**self).headers()
    }
}

//! Streaming endpoint resolution.
//!
//! The socket URL is derived from, in order of precedence: an explicit
//! override, a configured base origin (the deck served from the backend
//! itself), or the fixed local development address. The access token rides
//! along as a query parameter at connection time and is masked whenever a
//! resolved URL is rendered for logs.

use url::Url;

use crate::credential::mask_token;
use crate::error::{Error, Result};

/// The fixed local development socket address.
pub const DEFAULT_DEV_STREAM_URL: &str = "ws://127.0.0.1:8000/api/chat/stream";

/// Path of the streaming chat socket on any origin.
pub const STREAM_PATH: &str = "/api/chat/stream";

/// Query parameter name carrying the access token.
const TOKEN_PARAM: &str = "token";

/// Resolves the streaming chat socket URL.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StreamEndpoint {
    override_url: Option<Url>,
    base_origin: Option<Url>,
}

impl StreamEndpoint {
    /// Creates an endpoint resolver with no override and no base origin,
    /// which resolves to the local development address.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an explicit socket URL that wins over everything else.
    pub fn with_override(mut self, url: Url) -> Self {
        self.override_url = Some(url);
        self
    }

    /// Parses and sets an explicit socket URL.
    pub fn with_override_str(self, url: &str) -> Result<Self> {
        let parsed = Url::parse(url)?;
        Ok(self.with_override(parsed))
    }

    /// Sets the backend origin the deck is served from; the socket lives at
    /// [`STREAM_PATH`] on that origin, with `http(s)` mapped to `ws(s)`.
    pub fn with_base_origin(mut self, origin: Url) -> Self {
        self.base_origin = Some(origin);
        self
    }

    /// Resolves the socket URL, attaching the token when one is supplied.
    pub fn resolve(&self, token: Option<&str>) -> Result<Url> {
        let mut url = if let Some(override_url) = &self.override_url {
            override_url.clone()
        } else if let Some(origin) = &self.base_origin {
            let mut url = origin.clone();
            let scheme = match origin.scheme() {
                "http" | "ws" => "ws",
                "https" | "wss" => "wss",
                other => {
                    return Err(Error::url(
                        format!("unsupported base origin scheme: {other}"),
                        None,
                    ));
                }
            };
            url.set_scheme(scheme)
                .map_err(|_| Error::url("failed to set socket scheme", None))?;
            url.set_path(STREAM_PATH);
            url.set_query(None);
            url
        } else {
            Url::parse(DEFAULT_DEV_STREAM_URL)?
        };
        if let Some(token) = token {
            url.query_pairs_mut().append_pair(TOKEN_PARAM, token);
        }
        Ok(url)
    }

    /// Renders a resolved URL for logging with the token value masked.
    pub fn redacted(url: &Url) -> String {
        if !url.query_pairs().any(|(key, _)| key == TOKEN_PARAM) {
            return url.to_string();
        }
        let mut masked = url.clone();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(key, value)| {
                if key == TOKEN_PARAM {
                    (key.into_owned(), mask_token(&value))
                } else {
                    (key.into_owned(), value.into_owned())
                }
            })
            .collect();
        masked.set_query(None);
        {
            let mut serializer = masked.query_pairs_mut();
            for (key, value) in &pairs {
                serializer.append_pair(key, value);
            }
        }
        masked.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_dev_address() {
        let endpoint = StreamEndpoint::new();
        let url = endpoint.resolve(None).unwrap();
        assert_eq!(url.as_str(), DEFAULT_DEV_STREAM_URL);
    }

    #[test]
    fn override_wins() {
        let endpoint = StreamEndpoint::new()
            .with_base_origin(Url::parse("https://deck.example.com").unwrap())
            .with_override_str("wss://elsewhere.example.com/chat")
            .unwrap();
        let url = endpoint.resolve(None).unwrap();
        assert_eq!(url.as_str(), "wss://elsewhere.example.com/chat");
    }

    #[test]
    fn base_origin_maps_scheme_and_path() {
        let endpoint =
            StreamEndpoint::new().with_base_origin(Url::parse("https://deck.example.com").unwrap());
        let url = endpoint.resolve(None).unwrap();
        assert_eq!(url.as_str(), "wss://deck.example.com/api/chat/stream");

        let endpoint =
            StreamEndpoint::new().with_base_origin(Url::parse("http://10.0.0.5:8000").unwrap());
        let url = endpoint.resolve(None).unwrap();
        assert_eq!(url.as_str(), "ws://10.0.0.5:8000/api/chat/stream");
    }

    #[test]
    fn token_rides_as_query_parameter() {
        let endpoint = StreamEndpoint::new();
        let url = endpoint.resolve(Some("AIzaSyExampleExample")).unwrap();
        assert_eq!(
            url.as_str(),
            "ws://127.0.0.1:8000/api/chat/stream?token=AIzaSyExampleExample"
        );
    }

    #[test]
    fn redaction_masks_token_only() {
        let endpoint = StreamEndpoint::new();
        let url = endpoint.resolve(Some("AIzaSyExampleExample")).unwrap();
        let rendered = StreamEndpoint::redacted(&url);
        assert!(!rendered.contains("AIzaSyExampleExample"));
        assert!(rendered.contains("token=AIza"));
        assert!(rendered.starts_with("ws://127.0.0.1:8000/api/chat/stream?"));
    }

    #[test]
    fn redaction_without_token_is_identity() {
        let url = Url::parse(DEFAULT_DEV_STREAM_URL).unwrap();
        assert_eq!(StreamEndpoint::redacted(&url), DEFAULT_DEV_STREAM_URL);
    }
}

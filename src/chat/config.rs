//! Configuration types for the console.
//!
//! This module provides CLI argument parsing via `arrrg` and the resolved
//! configuration for a console session.

use std::path::PathBuf;
use std::time::Duration;

use arrrg_derive::CommandLine;
use url::Url;

use crate::endpoint::StreamEndpoint;
use crate::error::Result;
use crate::retry::RetryPolicy;
use crate::session::SessionConfig;

/// Default credential file name, placed in the home directory when one is
/// available and the working directory otherwise.
const CREDENTIAL_FILE_NAME: &str = ".agentdeck-credential.json";

/// Command-line arguments for the agentdeck-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct DeckArgs {
    /// Explicit streaming socket URL; wins over --origin.
    #[arrrg(optional, "Streaming socket URL override", "URL")]
    pub stream_url: Option<String>,

    /// Backend origin the deck talks to.
    #[arrrg(optional, "Backend origin, e.g. https://deck.example.com", "ORIGIN")]
    pub origin: Option<String>,

    /// Where the access token is persisted.
    #[arrrg(optional, "Credential file path", "PATH")]
    pub credential_file: Option<String>,

    /// Reconnect delay.
    #[arrrg(optional, "Reconnect delay in milliseconds (default: 3000)", "MILLIS")]
    pub reconnect_ms: Option<u32>,

    /// Idle-stream watchdog.
    #[arrrg(optional, "Idle stream timeout in seconds (default: off)", "SECONDS")]
    pub stream_timeout: Option<u32>,
}

/// Resolved configuration for a console session.
#[derive(Debug, Clone)]
pub struct DeckConfig {
    /// The session configuration (endpoint, retry policy, watchdog).
    pub session: SessionConfig,

    /// Backend origin for the REST endpoints, when one was given.
    pub rest_base: Option<String>,

    /// Path of the credential file.
    pub credential_file: PathBuf,
}

impl DeckConfig {
    /// Resolves command-line arguments into a configuration.
    pub fn from_args(args: DeckArgs) -> Result<Self> {
        let mut endpoint = StreamEndpoint::new();
        if let Some(origin) = args.origin.as_deref() {
            endpoint = endpoint.with_base_origin(Url::parse(origin)?);
        }
        if let Some(stream_url) = args.stream_url.as_deref() {
            endpoint = endpoint.with_override_str(stream_url)?;
        }

        let retry = match args.reconnect_ms {
            Some(millis) => RetryPolicy::fixed(Duration::from_millis(u64::from(millis))),
            None => RetryPolicy::default(),
        };

        let session = SessionConfig::new()
            .with_endpoint(endpoint)
            .with_retry(retry)
            .with_stream_timeout(
                args.stream_timeout
                    .map(|secs| Duration::from_secs(u64::from(secs))),
            );

        let credential_file = match args.credential_file {
            Some(path) => PathBuf::from(path),
            None => default_credential_file(),
        };

        Ok(Self {
            session,
            rest_base: args.origin,
            credential_file,
        })
    }
}

fn default_credential_file() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(CREDENTIAL_FILE_NAME),
        None => PathBuf::from(CREDENTIAL_FILE_NAME),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_default_args() {
        let config = DeckConfig::from_args(DeckArgs::default()).unwrap();
        assert_eq!(config.session.retry, RetryPolicy::default());
        assert!(config.session.stream_timeout.is_none());
        let url = config.session.endpoint.resolve(None).unwrap();
        assert_eq!(url.as_str(), crate::endpoint::DEFAULT_DEV_STREAM_URL);
    }

    #[test]
    fn config_from_custom_args() {
        let args = DeckArgs {
            stream_url: Some("wss://deck.example.com/chat".to_string()),
            origin: None,
            credential_file: Some("/tmp/deck-credential.json".to_string()),
            reconnect_ms: Some(500),
            stream_timeout: Some(30),
        };
        let config = DeckConfig::from_args(args).unwrap();
        assert_eq!(
            config.session.retry,
            RetryPolicy::fixed(Duration::from_millis(500))
        );
        assert_eq!(
            config.session.stream_timeout,
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            config.credential_file,
            PathBuf::from("/tmp/deck-credential.json")
        );
        let url = config.session.endpoint.resolve(None).unwrap();
        assert_eq!(url.as_str(), "wss://deck.example.com/chat");
    }

    #[test]
    fn config_rejects_bad_url() {
        let args = DeckArgs {
            stream_url: Some("not a url".to_string()),
            ..DeckArgs::default()
        };
        assert!(DeckConfig::from_args(args).is_err());
    }
}

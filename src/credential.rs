//! Credential storage for the deck's access token.
//!
//! The backend authenticates the streaming socket with a single opaque
//! token. The session controller never owns the token; it holds a read
//! reference to a [`CredentialStore`] so it is constructible and testable
//! without any particular persistence mechanism.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::{from_reader, to_writer_pretty};

use crate::error::{Error, Result};

/// Minimum token length accepted when the token lacks the well-known prefix.
const MIN_TOKEN_LEN: usize = 20;

/// Prefix carried by tokens issued by the hosted backend.
const TOKEN_PREFIX: &str = "AI";

/// Holds at most one opaque access token.
///
/// Implementations must be safe to share across the session controller and
/// whatever configures the token (a settings UI, a CLI command).
pub trait CredentialStore: Send + Sync {
    /// Returns the configured token, if any.
    fn get(&self) -> Option<String>;

    /// Validates and stores a token, replacing any previous one.
    fn set(&self, token: &str) -> Result<()>;

    /// Removes the stored token.
    fn clear(&self) -> Result<()>;

    /// Returns true if a token is configured.
    fn is_configured(&self) -> bool {
        self.get().is_some()
    }
}

/// Validates a candidate token before it is stored.
///
/// A token passes when it is non-blank and either carries the issuer prefix
/// or is long enough to plausibly be a token from another issuer.
pub fn validate_token(token: &str) -> Result<&str> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(
            "access token must not be empty",
            Some("token".to_string()),
        ));
    }
    if !trimmed.starts_with(TOKEN_PREFIX) && trimmed.len() < MIN_TOKEN_LEN {
        return Err(Error::validation(
            "access token does not look like a valid key",
            Some("token".to_string()),
        ));
    }
    Ok(trimmed)
}

/// Masks a token for display or logging.
///
/// Long tokens keep their first and last four characters; anything short
/// enough that those would overlap is masked entirely.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "\u{2022}".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}{}{tail}", "\u{2022}".repeat(chars.len() - 8))
}

/// An in-memory credential store, useful for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryCredentialStore {
    token: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store preloaded with a token, bypassing validation.
    ///
    /// Intended for tests and for tokens sourced from the environment that
    /// were validated elsewhere.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<String> {
        self.token.lock().ok().and_then(|guard| guard.clone())
    }

    fn set(&self, token: &str) -> Result<()> {
        let trimmed = validate_token(token)?;
        if let Ok(mut guard) = self.token.lock() {
            *guard = Some(trimmed.to_string());
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if let Ok(mut guard) = self.token.lock() {
            *guard = None;
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct CredentialFile {
    version: u8,
    token: String,
}

impl CredentialFile {
    fn new(token: &str) -> Self {
        Self {
            version: 1,
            token: token.to_string(),
        }
    }
}

/// A credential store persisted to a JSON file, durable across restarts.
pub struct FileCredentialStore {
    path: PathBuf,
    cached: Mutex<Option<String>>,
}

impl FileCredentialStore {
    /// Opens a store backed by the given path, loading any existing token.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let cached = match File::open(&path) {
            Ok(file) => {
                let reader = BufReader::new(file);
                let contents: CredentialFile = from_reader(reader).map_err(|err| {
                    Error::serialization("failed to parse credential file", Some(Box::new(err)))
                })?;
                Some(contents.token)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => return Err(Error::io("failed to open credential file", err)),
        };
        Ok(Self {
            path,
            cached: Mutex::new(cached),
        })
    }

    /// Returns the backing path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Option<String> {
        self.cached.lock().ok().and_then(|guard| guard.clone())
    }

    fn set(&self, token: &str) -> Result<()> {
        let trimmed = validate_token(token)?;
        let file = File::create(&self.path)
            .map_err(|err| Error::io("failed to create credential file", err))?;
        let writer = BufWriter::new(file);
        to_writer_pretty(writer, &CredentialFile::new(trimmed)).map_err(|err| {
            Error::serialization("failed to serialize credential file", Some(Box::new(err)))
        })?;
        if let Ok(mut guard) = self.cached.lock() {
            *guard = Some(trimmed.to_string());
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(Error::io("failed to remove credential file", err)),
        }
        if let Ok(mut guard) = self.cached.lock() {
            *guard = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_lifecycle() {
        let store = MemoryCredentialStore::new();
        assert!(!store.is_configured());

        store.set("AIzaSyExampleExample").unwrap();
        assert!(store.is_configured());
        assert_eq!(store.get().as_deref(), Some("AIzaSyExampleExample"));

        store.clear().unwrap();
        assert!(!store.is_configured());
    }

    #[test]
    fn set_trims_whitespace() {
        let store = MemoryCredentialStore::new();
        store.set("  AIzaSyExampleExample  ").unwrap();
        assert_eq!(store.get().as_deref(), Some("AIzaSyExampleExample"));
    }

    #[test]
    fn validation_rejects_blank() {
        assert!(validate_token("   ").is_err());
    }

    #[test]
    fn validation_rejects_short_unprefixed() {
        assert!(validate_token("abc123").is_err());
    }

    #[test]
    fn validation_accepts_prefixed_or_long() {
        assert!(validate_token("AIzaSy").is_ok());
        assert!(validate_token("sk-0123456789abcdef0123").is_ok());
    }

    #[test]
    fn masking_hides_middle() {
        let masked = mask_token("AIzaSyExampleExample");
        assert!(masked.starts_with("AIza"));
        assert!(masked.ends_with("mple"));
        assert!(!masked.contains("SyExample"));
        assert_eq!(masked.chars().count(), 20);
    }

    #[test]
    fn masking_hides_short_tokens_entirely() {
        assert_eq!(mask_token("secret"), "\u{2022}".repeat(6));
    }

    #[test]
    fn file_store_round_trip() {
        let path = std::env::temp_dir().join(format!(
            "agentdeck-credential-test-{}.json",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        let store = FileCredentialStore::open(&path).unwrap();
        assert!(!store.is_configured());
        store.set("AIzaSyExampleExample").unwrap();

        // A second store opened on the same path sees the persisted token.
        let reopened = FileCredentialStore::open(&path).unwrap();
        assert_eq!(reopened.get().as_deref(), Some("AIzaSyExampleExample"));

        reopened.clear().unwrap();
        let emptied = FileCredentialStore::open(&path).unwrap();
        assert!(!emptied.is_configured());

        let _ = std::fs::remove_file(&path);
    }
}

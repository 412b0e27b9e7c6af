//! Persistence of access token material, one record per service name.

pub mod file;
pub mod memory;

pub use file::FileTokenStore;
pub use memory::MemoryTokenStore;

use serde::{Deserialize, Serialize};

use crate::{StoreError, StoreResult, TokenPair};

/// The persisted shape: `{"accessToken": string|null, "accessTokenSecret": string|null}`.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedTokenRecord {
    pub access_token: Option<String>,
    pub access_token_secret: Option<String>,
}

impl PersistedTokenRecord {
    pub fn new<TToken, TSecret>(access_token: TToken, access_token_secret: TSecret) -> Self
    where
        TToken: Into<String>,
        TSecret: Into<String>,
    {
        PersistedTokenRecord {
            access_token: Some(access_token.into()),
            access_token_secret: Some(access_token_secret.into()),
        }
    }

    /// Both fields are present.
    pub fn is_complete(&self) -> bool {
        self.access_token.is_some() && self.access_token_secret.is_some()
    }

    /// Both fields are null, the shape written by `clear`.
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.access_token_secret.is_none()
    }

    pub fn token_pair(&self) -> Option<TokenPair> {
        match (&self.access_token, &self.access_token_secret) {
            (Some(token), Some(secret)) => Some(TokenPair::new(token.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

impl From<&TokenPair> for PersistedTokenRecord {
    fn from(pair: &TokenPair) -> Self {
        PersistedTokenRecord::new(pair.token.as_str(), pair.secret.as_str())
    }
}

impl std::fmt::Debug for PersistedTokenRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedTokenRecord")
            .field("access_token", &self.access_token)
            .field(
                "access_token_secret",
                &self.access_token_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Load/save/clear contract for persisted token records.
///
/// `load` never fails: a missing, unreadable, corrupt or cleared record is
/// reported as `None`. `save` writes the whole record in one step.
pub trait TokenStore: Send + Sync {
    fn load(&self, service: &str) -> Option<PersistedTokenRecord>;

    fn save(&self, service: &str, record: &PersistedTokenRecord) -> StoreResult<()>;

    /// Write a record with both fields null. Clearing twice is fine.
    fn clear(&self, service: &str) -> StoreResult<()> {
        self.save(service, &PersistedTokenRecord::default())
    }
}

pub(crate) fn validate_service(service: &str) -> StoreResult<()> {
    let invalid = service.is_empty()
        || service == "."
        || service == ".."
        || service.contains(|c: char| c == '/' || c == '\\' || c.is_control());
    if invalid {
        Err(StoreError::InvalidService(service.to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serializes_with_camel_case_and_nulls() {
        let record = PersistedTokenRecord::new("at1", "ats1");
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"accessToken":"at1","accessTokenSecret":"ats1"}"#
        );
        assert_eq!(
            serde_json::to_string(&PersistedTokenRecord::default()).unwrap(),
            r#"{"accessToken":null,"accessTokenSecret":null}"#
        );
    }

    #[test]
    fn record_completeness() {
        let partial = PersistedTokenRecord {
            access_token: Some("at1".into()),
            access_token_secret: None,
        };
        assert!(!partial.is_complete());
        assert!(!partial.is_empty());
        assert_eq!(partial.token_pair(), None);
        assert!(PersistedTokenRecord::default().is_empty());
        assert_eq!(
            PersistedTokenRecord::new("at1", "ats1").token_pair(),
            Some(TokenPair::new("at1", "ats1"))
        );
    }

    #[test]
    fn record_debug_redacts_secret() {
        let printed = format!("{:?}", PersistedTokenRecord::new("at1", "ats1"));
        assert!(printed.contains("at1"));
        assert!(!printed.contains("ats1"));
    }

    #[test]
    fn service_names_are_validated() {
        assert!(validate_service("twitter").is_ok());
        assert!(validate_service("").is_err());
        assert!(validate_service("..").is_err());
        assert!(validate_service("a/b").is_err());
        assert!(validate_service("a\\b").is_err());
    }
}

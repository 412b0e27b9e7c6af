use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use url::Url;

use crate::{
    ConsumerCredentials, Error, FileTokenStore, MemoryTokenStore, OAuthParameters, Result,
    RetryPolicy, TokenStore,
};

fn default_callback() -> Option<String> {
    Some("oob".to_string())
}

/// The three handshake endpoints of a service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceEndpoints {
    pub request_token: Url,
    pub authorize: Url,
    pub access_token: Url,
}

impl ServiceEndpoints {
    pub fn new(request_token: &str, authorize: &str, access_token: &str) -> Result<Self> {
        Ok(ServiceEndpoints {
            request_token: Url::parse(request_token)?,
            authorize: Url::parse(authorize)?,
            access_token: Url::parse(access_token)?,
        })
    }
}

/// Everything needed to build a [`crate::Client`].
///
/// Deserializable from JSON:
///
/// ```json
/// {
///   "service": "twitter",
///   "consumer_key": "[CONSUMER_KEY]",
///   "consumer_secret": "[CONSUMER_SECRET]",
///   "endpoints": {
///     "request_token": "https://api.twitter.com/oauth/request_token",
///     "authorize": "https://api.twitter.com/oauth/authorize",
///     "access_token": "https://api.twitter.com/oauth/access_token"
///   },
///   "store_dir": "/home/me/.config/my-app",
///   "retry": { "interval": 1000, "deadline": 300000 }
/// }
/// ```
#[derive(Clone, Deserialize)]
pub struct ClientConfig {
    pub service: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub endpoints: ServiceEndpoints,
    /// `oauth_callback` sent with the request token; `oob` unless set.
    #[serde(default = "default_callback")]
    pub callback: Option<String>,
    /// Send `oauth_version=1.0`.
    #[serde(default)]
    pub version: bool,
    /// Directory of the persisted token files. Tokens stay in memory when unset.
    #[serde(default)]
    pub store_dir: Option<PathBuf>,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl ClientConfig {
    pub fn new<TService, TKey, TSecret>(
        service: TService,
        consumer_key: TKey,
        consumer_secret: TSecret,
        endpoints: ServiceEndpoints,
    ) -> Self
    where
        TService: Into<String>,
        TKey: Into<String>,
        TSecret: Into<String>,
    {
        ClientConfig {
            service: service.into(),
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            endpoints,
            callback: default_callback(),
            version: false,
            store_dir: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&contents)
    }

    pub fn callback<T: Into<String>>(self, callback: Option<T>) -> Self {
        ClientConfig {
            callback: callback.map(Into::into),
            ..self
        }
    }

    pub fn version(self, version: bool) -> Self {
        ClientConfig { version, ..self }
    }

    pub fn store_dir(self, store_dir: impl Into<PathBuf>) -> Self {
        ClientConfig {
            store_dir: Some(store_dir.into()),
            ..self
        }
    }

    pub fn retry(self, retry: RetryPolicy) -> Self {
        ClientConfig { retry, ..self }
    }

    pub fn consumer(&self) -> ConsumerCredentials {
        ConsumerCredentials::new(self.consumer_key.as_str(), self.consumer_secret.as_str())
    }

    pub fn oauth_parameters(&self) -> OAuthParameters {
        let parameters = OAuthParameters::new().version(self.version);
        match self.callback {
            Some(ref callback) => parameters.callback(callback.as_str()),
            None => parameters,
        }
    }

    /// A file store under `store_dir`, or an in-memory one.
    pub fn token_store(&self) -> Arc<dyn TokenStore> {
        match self.store_dir {
            Some(ref dir) => Arc::new(FileTokenStore::new(dir)),
            None => Arc::new(MemoryTokenStore::new()),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("service", &self.service)
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .field("endpoints", &self.endpoints)
            .field("callback", &self.callback)
            .field("version", &self.version)
            .field("store_dir", &self.store_dir)
            .field("retry", &self.retry)
            .finish()
    }
}

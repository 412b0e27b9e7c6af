use std::fmt;

/// Identifies the calling application to the remote service.
#[derive(Clone, PartialEq, Eq)]
pub struct ConsumerCredentials {
    key: String,
    secret: String,
}

impl ConsumerCredentials {
    pub fn new<TKey, TSecret>(key: TKey, secret: TSecret) -> Self
    where
        TKey: Into<String>,
        TSecret: Into<String>,
    {
        ConsumerCredentials {
            key: key.into(),
            secret: secret.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for ConsumerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerCredentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// The pair of secrets forming the HMAC key.
///
/// `token_secret` is empty while requesting a token, holds the request token
/// secret during the exchange, and the access token secret afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct Accessor {
    consumer_secret: String,
    token_secret: String,
}

impl Accessor {
    pub fn new<T: Into<String>>(consumer_secret: T) -> Self {
        Accessor {
            consumer_secret: consumer_secret.into(),
            token_secret: String::new(),
        }
    }

    pub fn with_token_secret<T: Into<String>>(mut self, token_secret: T) -> Self {
        self.token_secret = token_secret.into();
        self
    }

    pub fn consumer_secret(&self) -> &str {
        &self.consumer_secret
    }

    pub fn token_secret(&self) -> &str {
        &self.token_secret
    }

    pub(crate) fn set_token_secret(&mut self, token_secret: &str) {
        self.token_secret.clear();
        self.token_secret.push_str(token_secret);
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("consumer_secret", &"<redacted>")
            .field("token_secret", &"<redacted>")
            .finish()
    }
}

/// A token together with its secret, either a request token or an access token.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub token: String,
    pub secret: String,
}

impl TokenPair {
    pub fn new<TToken, TSecret>(token: TToken, secret: TSecret) -> Self
    where
        TToken: Into<String>,
        TSecret: Into<String>,
    {
        TokenPair {
            token: token.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("token", &self.token)
            .field("secret", &"<redacted>")
            .finish()
    }
}

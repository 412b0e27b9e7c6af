use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;
pub type SignResult<T> = std::result::Result<T, SignError>;
pub type TokenReaderResult<T> = std::result::Result<T, TokenReaderError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum Error {
    /// No response was received at all.
    #[error("request failed : {0}")]
    Transport(#[from] reqwest::Error),
    /// The service answered with a status outside of 200-299.
    #[error("service responded with status {status} : {body}")]
    Protocol { status: u16, body: String },
    #[error("no access token is available, authorize first")]
    NotAuthorized,
    #[error("precondition violated : {0}")]
    Precondition(&'static str),
    #[error("interactive authorization was abandoned before a verifier was received")]
    Abandoned,
    #[error("request was still waiting for authorization after {0:?}")]
    PendingTimeout(Duration),
    #[error("token acquisition failed : {0}")]
    TokenReader(#[from] TokenReaderError),
    #[error("OAuth sign failed : {0}")]
    Signer(#[from] SignError),
    #[error("token persistence failed : {0}")]
    Store(#[from] StoreError),
    #[error("invalid url : {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("invalid configuration : {0}")]
    Config(String),
    #[error("response body could not be decoded : {0}")]
    Decode(#[from] serde_json::Error),
}

impl Error {
    /// HTTP status carried by a protocol failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Protocol { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignError {
    #[error("url {0} cannot be used as a signature base url")]
    UnsupportedUrl(String),
    #[error("signing key rejected : {0}")]
    InvalidKey(String),
    #[error("parameters could not be serialized : {0}")]
    Serialize(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenReaderError {
    #[error("response has malformed format: not found {0} in {1}")]
    TokenKeyNotFound(&'static str, String),
    #[error("response has malformed format: {0} is empty in {1}")]
    EmptyTokenValue(&'static str, String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("service name {0:?} cannot be used as a record name")]
    InvalidService(String),
    #[error("serialization error : {0}")]
    Serialization(String),
    #[error("backend failure : {0}")]
    Backend(String),
}

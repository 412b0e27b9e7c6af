use std::borrow::Cow;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use http::Method;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha1::Sha1;
use url::Url;

use crate::{
    Accessor, Message, SignError, SignResult, OAUTH_CALLBACK_KEY, OAUTH_KEY_PREFIX,
    OAUTH_NONCE_KEY, OAUTH_SIGNATURE_KEY, OAUTH_SIGNATURE_METHOD_KEY, OAUTH_TIMESTAMP_KEY,
    OAUTH_VERSION_KEY, REALM_KEY,
};

/// Everything except the RFC 3986 unreserved characters `ALPHA / DIGIT / - . _ ~`.
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const NONCE_LENGTH: usize = 32;

/// Percent-encode `input` as OAuth 1.0a requires (RFC 5849 section 3.6).
///
/// Spaces become `%20`, never `+`, and hex digits are uppercase.
pub fn percent_encode(input: &str) -> Cow<'_, str> {
    utf8_percent_encode(input, OAUTH_ENCODE_SET).into()
}

/// Build the normalized parameter string: every key and value encoded,
/// pairs sorted by encoded key then encoded value, joined with `&`.
///
/// An empty value still produces `key=`.
pub fn normalize_parameters<'a, I>(parameters: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut encoded = parameters
        .into_iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>();
    encoded.sort();
    encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// The base string uri: scheme, authority and path, without query or fragment.
pub fn base_url(url: &Url) -> SignResult<String> {
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(SignError::UnsupportedUrl(url.to_string()));
    }
    let mut base = url.clone();
    base.set_query(None);
    base.set_fragment(None);
    // neither call can fail once the url has a host
    let _ = base.set_username("");
    let _ = base.set_password(None);
    Ok(base.to_string())
}

/// Compose `METHOD&encoded-base-url&encoded-parameter-string`.
///
/// Query parameters already present on `url` are part of the signed set.
pub fn signature_base_string(
    method: &Method,
    url: &Url,
    parameters: &[(String, String)],
) -> SignResult<String> {
    let base = base_url(url)?;
    let query = url.query_pairs().collect::<Vec<_>>();
    let normalized = normalize_parameters(
        query
            .iter()
            .map(|(k, v)| (k.as_ref(), v.as_ref()))
            .chain(parameters.iter().map(|(k, v)| (k.as_str(), v.as_str()))),
    );
    Ok(format!(
        "{}&{}&{}",
        method.as_str().to_ascii_uppercase(),
        percent_encode(&base),
        percent_encode(&normalized)
    ))
}

/// `encode(consumer_secret) & encode(token_secret)`.
pub fn signing_key(accessor: &Accessor) -> String {
    format!(
        "{}&{}",
        percent_encode(accessor.consumer_secret()),
        percent_encode(accessor.token_secret())
    )
}

/// Strategy computing `oauth_signature` from a base string and signing key.
pub trait SignatureMethod {
    /// The value sent as `oauth_signature_method`.
    fn name(&self) -> &'static str;

    fn sign(&self, base_string: &str, signing_key: &str) -> SignResult<String>;
}

/// `HMAC-SHA1`, base64 encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HmacSha1;

impl SignatureMethod for HmacSha1 {
    fn name(&self) -> &'static str {
        "HMAC-SHA1"
    }

    fn sign(&self, base_string: &str, signing_key: &str) -> SignResult<String> {
        let mut mac = Hmac::<Sha1>::new_from_slice(signing_key.as_bytes())
            .map_err(|e| SignError::InvalidKey(e.to_string()))?;
        mac.update(base_string.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }
}

/// Optional protocol parameters applied by the engine on every signing call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OAuthParameters {
    callback: Option<String>,
    nonce: Option<String>,
    timestamp: Option<u64>,
    version: bool,
}

impl OAuthParameters {
    pub fn new() -> Self {
        Default::default()
    }

    /// set the oauth_callback value sent with the request token step
    pub fn callback<T>(self, callback: T) -> Self
    where
        T: Into<String>,
    {
        OAuthParameters {
            callback: Some(callback.into()),
            ..self
        }
    }

    /// set a fixed oauth_nonce value
    ///
    /// # Note
    /// A fixed nonce makes every signature reproducible, which services reject
    /// as a replay. Only useful for checking signatures against known vectors.
    pub fn nonce<T>(self, nonce: T) -> Self
    where
        T: Into<String>,
    {
        OAuthParameters {
            nonce: Some(nonce.into()),
            ..self
        }
    }

    /// set a fixed oauth_timestamp value
    pub fn timestamp<T>(self, timestamp: T) -> Self
    where
        T: Into<u64>,
    {
        OAuthParameters {
            timestamp: Some(timestamp.into()),
            ..self
        }
    }

    /// set the oauth_version value (boolean)
    ///
    /// # Note
    /// When the version has value `true`, oauth_version will be set with "1.0".
    /// Otherwise, oauth_version will not be included in your request.
    pub fn version<T>(self, version: T) -> Self
    where
        T: Into<bool>,
    {
        OAuthParameters {
            version: version.into(),
            ..self
        }
    }

    pub fn get_callback(&self) -> Option<&str> {
        self.callback.as_deref()
    }
}

/// Signs messages: adds nonce, timestamp, method and version, then the signature.
#[derive(Debug, Clone)]
pub struct SignatureEngine<TSignatureMethod = HmacSha1>
where
    TSignatureMethod: SignatureMethod,
{
    method: TSignatureMethod,
    parameters: OAuthParameters,
}

impl Default for SignatureEngine<HmacSha1> {
    fn default() -> Self {
        SignatureEngine {
            method: HmacSha1,
            parameters: OAuthParameters::new(),
        }
    }
}

impl SignatureEngine<HmacSha1> {
    pub fn new() -> Self {
        Default::default()
    }
}

impl<TSignatureMethod> SignatureEngine<TSignatureMethod>
where
    TSignatureMethod: SignatureMethod,
{
    pub fn with_method(method: TSignatureMethod) -> Self {
        SignatureEngine {
            method,
            parameters: OAuthParameters::new(),
        }
    }

    pub fn parameters(self, parameters: OAuthParameters) -> Self {
        SignatureEngine { parameters, ..self }
    }

    pub fn oauth_parameters(&self) -> &OAuthParameters {
        &self.parameters
    }

    pub fn method_name(&self) -> &'static str {
        self.method.name()
    }

    /// Sign `message` with a fresh nonce and the current time.
    pub fn sign(&self, message: &Message, accessor: &Accessor) -> SignResult<SignedParameters> {
        let nonce = self
            .parameters
            .nonce
            .clone()
            .unwrap_or_else(generate_nonce);
        let timestamp = self.parameters.timestamp.unwrap_or_else(unix_timestamp);
        self.sign_with(message, accessor, &nonce, timestamp)
    }

    /// Sign `message` with the given nonce and timestamp. Deterministic.
    ///
    /// Any engine-owned parameter already present on the message is replaced,
    /// so each call carries exactly one nonce, timestamp and signature.
    pub fn sign_with(
        &self,
        message: &Message,
        accessor: &Accessor,
        nonce: &str,
        timestamp: u64,
    ) -> SignResult<SignedParameters> {
        let mut pairs = message
            .parameters()
            .iter()
            .filter(|(k, _)| !is_engine_owned(k))
            .cloned()
            .collect::<Vec<_>>();
        pairs.push((OAUTH_NONCE_KEY.to_string(), nonce.to_string()));
        pairs.push((
            OAUTH_SIGNATURE_METHOD_KEY.to_string(),
            self.method.name().to_string(),
        ));
        pairs.push((OAUTH_TIMESTAMP_KEY.to_string(), timestamp.to_string()));
        if self.parameters.version {
            pairs.push((OAUTH_VERSION_KEY.to_string(), "1.0".to_string()));
        }

        let base_string = signature_base_string(message.method(), message.url(), &pairs)?;
        let signature = self.method.sign(&base_string, &signing_key(accessor))?;
        pairs.push((OAUTH_SIGNATURE_KEY.to_string(), signature));

        Ok(SignedParameters { pairs })
    }

    /// Attach `oauth_callback` when one is configured and the message has none.
    pub(crate) fn apply_callback(&self, message: &mut Message) {
        if let Some(ref callback) = self.parameters.callback {
            if !message
                .parameters()
                .iter()
                .any(|(k, _)| k == OAUTH_CALLBACK_KEY)
            {
                message.push(OAUTH_CALLBACK_KEY, callback);
            }
        }
    }
}

fn is_engine_owned(key: &str) -> bool {
    matches!(
        key,
        OAUTH_NONCE_KEY
            | OAUTH_SIGNATURE_METHOD_KEY
            | OAUTH_TIMESTAMP_KEY
            | OAUTH_VERSION_KEY
            | OAUTH_SIGNATURE_KEY
    )
}

fn generate_nonce() -> String {
    let random = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LENGTH)
        .map(char::from)
        .collect::<String>();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    format!("{:08x}{}", nanos, random)
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// The full parameter set of a signed message, `oauth_signature` included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedParameters {
    pairs: Vec<(String, String)>,
}

impl SignedParameters {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn signature(&self) -> Option<&str> {
        self.get(OAUTH_SIGNATURE_KEY)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// `key=value&...` with both sides percent-encoded, usable as a query
    /// string or an `application/x-www-form-urlencoded` body.
    pub fn to_encoded(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Render the `oauth_*` parameters as an `Authorization` header value.
    pub fn authorization_header(&self, realm: Option<&str>) -> String {
        let realm = realm.map(|r| format!("{}=\"{}\"", REALM_KEY, percent_encode(r)));
        let mut oauth = self
            .iter()
            .filter(|(k, _)| k.starts_with(OAUTH_KEY_PREFIX))
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>();
        oauth.sort();
        let items = realm.into_iter().chain(oauth).collect::<Vec<_>>();
        format!("OAuth {}", items.join(","))
    }

    pub fn into_vec(self) -> Vec<(String, String)> {
        self.pairs
    }
}

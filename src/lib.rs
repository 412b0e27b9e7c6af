/*!
reqwest-oauth1-flow: the whole OAuth 1.0a three-legged dance on top of reqwest.

# Overview

This library obtains, persists and uses OAuth 1.0a access tokens for
[reqwest](https://crates.io/crates/reqwest) based clients. It covers the
request token step, the interactive verifier (PIN) step, the access token
exchange, and signed dispatch of API calls. Calls issued before authorization
completes are held and sent once an access token is available.

# How to use

## Basic usecase 1 - authorizing with a PIN

```rust,no_run
use std::io;
use reqwest_oauth1_flow::{Client, ClientConfig, ServiceEndpoints};

# async fn run() -> reqwest_oauth1_flow::Result<()> {
let endpoints = ServiceEndpoints::new(
    "https://api.twitter.com/oauth/request_token",
    "https://api.twitter.com/oauth/authorize",
    "https://api.twitter.com/oauth/access_token",
)?;
let config = ClientConfig::new("twitter", "[CONSUMER_KEY]", "[CONSUMER_SECRET]", endpoints)
    .store_dir("/home/me/.config/my-app");
let client = Client::new(&config);

client
    .authorize(|url, mut verifier| {
        println!("please access to: {}", url);
        println!("input pin: ");
        let mut user_input = String::new();
        if io::stdin().read_line(&mut user_input).is_ok() {
            verifier.deliver(user_input.trim());
        }
    })
    .await?;
# Ok(())
# }
```

The access token is written to `<store_dir>/twitter.json`; later runs load
it and skip the handshake.

## Basic usecase 2 - calling the API

```rust,no_run
use reqwest_oauth1_flow::{ApiCall, Client, ClientConfig};

# async fn run(config: ClientConfig) -> reqwest_oauth1_flow::Result<()> {
let client = Client::new(&config);

// waits for authorization if it has not completed yet
let resp = client
    .call_api(
        ApiCall::post("https://api.twitter.com/1.1/statuses/update.json")
            .parameter("status", "Hello, Twitter!"),
    )
    .await?;
println!("{}: {}", resp.status, resp.body);

// `:id` is filled from the parameter of the same name
let resp = client
    .call_api(
        ApiCall::get("https://api.twitter.com/1.1/statuses/show/:id.json")
            .parameter("id", "210462857140252672"),
    )
    .await?;
println!("{}", resp.body);
# Ok(())
# }
```

## Driving the flow by hand

[`AuthorizationFlow`] exposes each step on its own, and [`SignatureEngine`]
signs any [`Message`] with any [`Accessor`]:

```rust
use reqwest_oauth1_flow::{Accessor, Message, SignatureEngine};

let message = Message::post("https://photos.example.net/initiate")
    .unwrap()
    .parameter("oauth_consumer_key", "dpf43f3p2l4k3l03")
    .parameter("oauth_callback", "http://printer.example.com/ready");
let signed = SignatureEngine::new()
    .sign_with(&message, &Accessor::new("kd94hf93k423kf44"), "wIjqoS", 137131200)
    .unwrap();
assert_eq!(signed.signature(), Some("74KNZJeDHnMBp0EMJ9ZHt/XKycU="));
```
*/
mod client;
mod config;
mod error;
mod flow;
mod message;
mod queue;
mod request;
mod secrets;
mod signer;
mod store;
mod token_reader;
mod verifier;

// exposed to external program
pub use client::{ApiCall, Client};
pub use config::{ClientConfig, ServiceEndpoints};
pub use error::{
    Error, Result, SignError, SignResult, StoreError, StoreResult, TokenReaderError,
    TokenReaderResult,
};
pub use flow::{AuthorizationFlow, FlowState};
pub use message::Message;
pub use queue::{PendingRequestQueue, RetryPolicy, SharedFlow};
pub use request::{ApiResponse, PreparedRequest, RequestDispatcher};
pub use secrets::{Accessor, ConsumerCredentials, TokenPair};
pub use signer::{
    base_url, normalize_parameters, percent_encode, signature_base_string, signing_key,
    HmacSha1, OAuthParameters, SignatureEngine, SignatureMethod, SignedParameters,
};
pub use store::{FileTokenStore, MemoryTokenStore, PersistedTokenRecord, TokenStore};
pub use token_reader::{TokenReader, TokenResponse};
pub use verifier::{extract_verifier, verifier_channel, VerifierReceiver, VerifierSender};

// exposed constant variables
/// Represents `oauth_callback`.
pub const OAUTH_CALLBACK_KEY: &str = "oauth_callback";
/// Represents `oauth_consumer_key`.
pub const OAUTH_CONSUMER_KEY: &str = "oauth_consumer_key";
/// Represents `oauth_nonce`.
pub const OAUTH_NONCE_KEY: &str = "oauth_nonce";
/// Represents `oauth_signature`.
pub const OAUTH_SIGNATURE_KEY: &str = "oauth_signature";
/// Represents `oauth_signature_method`.
pub const OAUTH_SIGNATURE_METHOD_KEY: &str = "oauth_signature_method";
/// Represents `oauth_timestamp`.
pub const OAUTH_TIMESTAMP_KEY: &str = "oauth_timestamp";
/// Represents `oauth_token`.
pub const OAUTH_TOKEN_KEY: &str = "oauth_token";
/// Represents `oauth_verifier`.
pub const OAUTH_VERIFIER_KEY: &str = "oauth_verifier";
/// Represents `oauth_version`.
pub const OAUTH_VERSION_KEY: &str = "oauth_version";
/// Represents `realm`.
pub const REALM_KEY: &str = "realm";

// crate-private constant variables
pub(crate) const OAUTH_KEY_PREFIX: &str = "oauth_";
/// Parameters an API caller may not set; the flow and engine own them.
pub(crate) const RESERVED_KEYS: &[&str] = &[
    OAUTH_CONSUMER_KEY,
    OAUTH_TOKEN_KEY,
    OAUTH_SIGNATURE_METHOD_KEY,
    OAUTH_TIMESTAMP_KEY,
    OAUTH_NONCE_KEY,
    OAUTH_SIGNATURE_KEY,
    OAUTH_VERSION_KEY,
];

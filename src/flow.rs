//! The three-legged handshake: request token, verifier, access token.

use std::fmt;
use std::sync::Arc;

use http::header::CONTENT_TYPE;
use http::Method;
use reqwest::{Client as ReqwestClient, Response};
use tokio::sync::watch;
use url::Url;

use crate::{
    store::PersistedTokenRecord, Accessor, ConsumerCredentials, Error, HmacSha1, Message, Result,
    SignatureEngine, SignatureMethod, SignedParameters, TokenPair, TokenReader, TokenResponse,
    TokenStore, OAUTH_CONSUMER_KEY, OAUTH_TOKEN_KEY, OAUTH_VERIFIER_KEY, RESERVED_KEYS,
};

pub(crate) const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Where a flow currently stands in the handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowState {
    /// No access token loaded or obtained.
    Unauthenticated,
    /// The request token call is in flight.
    RequestingToken,
    /// A request token is held; waiting for the user's verifier.
    AwaitingVerifier,
    /// A verifier was received; the access token exchange is pending or in flight.
    ExchangingToken,
    /// An access token is held and used for signing.
    Authorized,
}

impl FlowState {
    pub fn is_authorized(self) -> bool {
        self == FlowState::Authorized
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            FlowState::Unauthenticated => "unauthenticated",
            FlowState::RequestingToken => "requesting_token",
            FlowState::AwaitingVerifier => "awaiting_verifier",
            FlowState::ExchangingToken => "exchanging_token",
            FlowState::Authorized => "authorized",
        }
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owns every credential of one service and drives its handshake.
///
/// All steps take `&mut self`, so a flow only advances once the step in
/// flight has completed. Independent flows share nothing.
pub struct AuthorizationFlow<TSignatureMethod = HmacSha1>
where
    TSignatureMethod: SignatureMethod,
{
    service: String,
    consumer: ConsumerCredentials,
    accessor: Accessor,
    engine: SignatureEngine<TSignatureMethod>,
    http: ReqwestClient,
    store: Arc<dyn TokenStore>,
    state: FlowState,
    request_token: Option<TokenPair>,
    verifier: Option<String>,
    access_token: Option<TokenPair>,
    status: watch::Sender<FlowState>,
}

impl AuthorizationFlow<HmacSha1> {
    pub fn new<T>(service: T, consumer: ConsumerCredentials, store: Arc<dyn TokenStore>) -> Self
    where
        T: Into<String>,
    {
        let (status, _) = watch::channel(FlowState::Unauthenticated);
        AuthorizationFlow {
            service: service.into(),
            accessor: Accessor::new(consumer.secret()),
            consumer,
            engine: SignatureEngine::new(),
            http: ReqwestClient::new(),
            store,
            state: FlowState::Unauthenticated,
            request_token: None,
            verifier: None,
            access_token: None,
            status,
        }
    }
}

impl<TSignatureMethod> AuthorizationFlow<TSignatureMethod>
where
    TSignatureMethod: SignatureMethod,
{
    /// Replace the signature engine, possibly with another signature method.
    pub fn with_engine<TOther>(
        self,
        engine: SignatureEngine<TOther>,
    ) -> AuthorizationFlow<TOther>
    where
        TOther: SignatureMethod,
    {
        AuthorizationFlow {
            service: self.service,
            consumer: self.consumer,
            accessor: self.accessor,
            engine,
            http: self.http,
            store: self.store,
            state: self.state,
            request_token: self.request_token,
            verifier: self.verifier,
            access_token: self.access_token,
            status: self.status,
        }
    }

    /// Use a preconfigured `reqwest::Client` for the handshake calls.
    pub fn with_http_client(self, http: ReqwestClient) -> Self {
        AuthorizationFlow { http, ..self }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn consumer(&self) -> &ConsumerCredentials {
        &self.consumer
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    /// Both access token fields are present.
    pub fn is_authorized(&self) -> bool {
        self.state.is_authorized() && self.access_token.is_some()
    }

    /// Watch state transitions as they happen.
    pub fn subscribe(&self) -> watch::Receiver<FlowState> {
        self.status.subscribe()
    }

    pub fn accessor(&self) -> &Accessor {
        &self.accessor
    }

    pub fn request_token(&self) -> Option<&TokenPair> {
        self.request_token.as_ref()
    }

    pub fn access_token(&self) -> Option<&TokenPair> {
        self.access_token.as_ref()
    }

    pub fn verifier(&self) -> Option<&str> {
        self.verifier.as_deref()
    }

    /// Adopt a persisted access token if a complete one exists.
    ///
    /// A missing or corrupt record leaves the flow where it was.
    pub fn load_access_token(&mut self) -> bool {
        match self.store.load(&self.service).and_then(|r| r.token_pair()) {
            Some(pair) => {
                tracing::debug!(service = %self.service, "loaded persisted access token");
                self.adopt_access_token(pair);
            }
            None => {
                tracing::debug!(service = %self.service, "no usable persisted access token");
            }
        }
        self.is_authorized()
    }

    /// Forget the access token and clear its persisted record.
    ///
    /// Safe in every state. A handshake in progress is left untouched.
    pub fn clear_access_token(&mut self) -> Result<()> {
        self.access_token = None;
        if self.state.is_authorized() {
            self.accessor.set_token_secret("");
            self.transition(FlowState::Unauthenticated);
        }
        self.store.clear(&self.service).map_err(|e| {
            tracing::warn!(service = %self.service, error = %e, "failed to clear persisted token");
            Error::from(e)
        })
    }

    /// First leg: obtain a request token from `url`.
    ///
    /// Any access token held in memory is dropped, since a new one is being
    /// negotiated. On failure the flow returns to `Unauthenticated`.
    pub async fn get_request_token(&mut self, url: &str) -> Result<TokenResponse> {
        self.reset_handshake();
        self.access_token = None;
        self.accessor.set_token_secret("");
        self.transition(FlowState::RequestingToken);

        match self.request_request_token(url).await {
            Ok(response) => {
                self.request_token = Some(response.token_pair());
                self.transition(FlowState::AwaitingVerifier);
                Ok(response)
            }
            Err(e) => {
                tracing::warn!(service = %self.service, error = %e, "request token step failed");
                self.transition(FlowState::Unauthenticated);
                Err(e)
            }
        }
    }

    /// The user-authorization url: `authorize_endpoint` plus `oauth_token`.
    pub fn authorization_url(&self, authorize_endpoint: &str) -> Result<Url> {
        let request_token = self
            .request_token
            .as_ref()
            .ok_or(Error::Precondition("authorization url requires a request token"))?;
        let mut url = Url::parse(authorize_endpoint)?;
        url.query_pairs_mut()
            .append_pair(OAUTH_TOKEN_KEY, &request_token.token);
        Ok(url)
    }

    /// Second leg: accept the verifier produced by the interactive step.
    ///
    /// Only a non-blank verifier received while awaiting one advances the
    /// flow; anything else is ignored and `false` returned.
    pub fn deliver_verifier(&mut self, verifier: &str) -> bool {
        let verifier = verifier.trim();
        if verifier.is_empty() || self.state != FlowState::AwaitingVerifier {
            tracing::debug!(service = %self.service, state = %self.state, "verifier ignored");
            return false;
        }
        self.verifier = Some(verifier.to_string());
        self.transition(FlowState::ExchangingToken);
        true
    }

    /// Abandon a handshake in progress without a verifier.
    ///
    /// The next `get_request_token` starts from scratch. Does nothing when
    /// unauthenticated or authorized.
    pub fn abandon(&mut self) {
        match self.state {
            FlowState::RequestingToken
            | FlowState::AwaitingVerifier
            | FlowState::ExchangingToken => {
                self.reset_handshake();
                self.accessor.set_token_secret("");
                self.transition(FlowState::Unauthenticated);
            }
            FlowState::Unauthenticated | FlowState::Authorized => {}
        }
    }

    /// Third leg: exchange the request token and verifier for an access token.
    ///
    /// Without a request token and verifier this fails with
    /// [`Error::Precondition`] and changes nothing. On success the token is
    /// persisted and the flow becomes `Authorized`; on failure it returns to
    /// `Unauthenticated`.
    pub async fn get_access_token(&mut self, url: &str) -> Result<TokenPair> {
        let request_token = self.request_token.clone().ok_or(Error::Precondition(
            "access token exchange requires a request token",
        ))?;
        let verifier = self.verifier.clone().ok_or(Error::Precondition(
            "access token exchange requires a verifier",
        ))?;

        let outcome = match self.create_message(Method::POST, url) {
            Ok(message) => {
                let message = message
                    .parameter(OAUTH_TOKEN_KEY, request_token.token.as_str())
                    .parameter(OAUTH_VERIFIER_KEY, verifier);
                self.accessor.set_token_secret(&request_token.secret);
                self.transition(FlowState::ExchangingToken);
                self.post_signed(message).await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(response) => {
                let access = response.token_pair();
                self.persist(&access);
                self.adopt_access_token(access.clone());
                Ok(access)
            }
            Err(e) => {
                tracing::warn!(service = %self.service, error = %e, "access token exchange failed");
                self.reset_handshake();
                self.accessor.set_token_secret("");
                self.transition(FlowState::Unauthenticated);
                Err(e)
            }
        }
    }

    /// Sign an API call with the access token.
    ///
    /// Caller parameters using a protocol-owned name are dropped; the consumer
    /// key and access token are appended. Returns the message as signed.
    pub fn sign_request(&mut self, message: Message) -> Result<(Message, SignedParameters)> {
        let access = match (&self.access_token, self.state) {
            (Some(access), FlowState::Authorized) => access,
            _ => return Err(Error::NotAuthorized),
        };
        let token = access.token.clone();
        self.accessor.set_token_secret(&access.secret);

        let mut message = message;
        message.remove_where(|k| RESERVED_KEYS.contains(&k));
        message.push(OAUTH_CONSUMER_KEY, self.consumer.key());
        message.push(OAUTH_TOKEN_KEY, &token);
        let signed = self.engine.sign(&message, &self.accessor)?;
        Ok((message, signed))
    }

    fn create_message(&self, method: Method, url: &str) -> Result<Message> {
        Ok(Message::new(method, url)?.parameter(OAUTH_CONSUMER_KEY, self.consumer.key()))
    }

    async fn request_request_token(&self, url: &str) -> Result<TokenResponse> {
        let mut message = self.create_message(Method::POST, url)?;
        self.engine.apply_callback(&mut message);
        self.post_signed(message).await
    }

    async fn post_signed(&self, message: Message) -> Result<TokenResponse> {
        let signed = self.engine.sign(&message, &self.accessor)?;
        let response = self.post_form(message.url().clone(), &signed).await?;
        response.parse_oauth_token().await
    }

    async fn post_form(&self, url: Url, signed: &SignedParameters) -> Result<Response> {
        tracing::debug!(service = %self.service, url = %url, "sending handshake request");
        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(signed.to_encoded())
            .send()
            .await?;
        Ok(response)
    }

    fn persist(&self, access: &TokenPair) {
        if let Err(e) = self
            .store
            .save(&self.service, &PersistedTokenRecord::from(access))
        {
            tracing::warn!(service = %self.service, error = %e, "failed to persist access token");
        }
    }

    fn adopt_access_token(&mut self, pair: TokenPair) {
        self.reset_handshake();
        self.accessor.set_token_secret(&pair.secret);
        self.access_token = Some(pair);
        self.transition(FlowState::Authorized);
    }

    fn reset_handshake(&mut self) {
        self.request_token = None;
        self.verifier = None;
    }

    fn transition(&mut self, next: FlowState) {
        let previous = std::mem::replace(&mut self.state, next);
        if previous != next {
            tracing::debug!(
                service = %self.service,
                from = %previous,
                to = %next,
                "authorization state changed"
            );
        }
        self.status.send_replace(next);
    }
}

impl<TSignatureMethod> fmt::Debug for AuthorizationFlow<TSignatureMethod>
where
    TSignatureMethod: SignatureMethod,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationFlow")
            .field("service", &self.service)
            .field("consumer", &self.consumer)
            .field("state", &self.state)
            .field("request_token", &self.request_token)
            .field("access_token", &self.access_token)
            .finish()
    }
}

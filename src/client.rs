use std::sync::Arc;

use http::Method;
use reqwest::Client as ReqwestClient;
use tokio::sync::Mutex;
use url::Url;

use crate::signer::percent_encode;
use crate::{
    verifier_channel, ApiResponse, AuthorizationFlow, ClientConfig, Error, HmacSha1, Message,
    PendingRequestQueue, RequestDispatcher, Result, ServiceEndpoints, SharedFlow,
    SignatureEngine, SignatureMethod, TokenStore, VerifierSender,
};

/// One service: its authorization flow, persisted token and queued API calls.
#[derive(Debug)]
pub struct Client<TSignatureMethod = HmacSha1>
where
    TSignatureMethod: SignatureMethod,
{
    flow: SharedFlow<TSignatureMethod>,
    queue: PendingRequestQueue<TSignatureMethod>,
    endpoints: ServiceEndpoints,
    // held for a whole `authorize`, verifier wait included
    handshake: Mutex<()>,
}

impl Client<HmacSha1> {
    /// Constructs a new `Client` with the token store described by `config`.
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_store(config, config.token_store())
    }

    /// Constructs a new `Client` persisting tokens in `store`.
    pub fn with_store(config: &ClientConfig, store: Arc<dyn TokenStore>) -> Self {
        Self::with_parts(config, store, ReqwestClient::new())
    }

    /// Constructs a new `Client` with specifying inner `reqwest::Client`.
    pub fn with_parts(
        config: &ClientConfig,
        store: Arc<dyn TokenStore>,
        http: ReqwestClient,
    ) -> Self {
        let engine = SignatureEngine::new().parameters(config.oauth_parameters());
        let flow = AuthorizationFlow::new(config.service.as_str(), config.consumer(), store)
            .with_http_client(http.clone())
            .with_engine(engine);
        Client::from_flow(flow, config.endpoints.clone(), config, http)
    }
}

impl<TSignatureMethod> Client<TSignatureMethod>
where
    TSignatureMethod: SignatureMethod,
{
    /// Wrap an already built flow, e.g. one using another signature method.
    pub fn from_flow(
        flow: AuthorizationFlow<TSignatureMethod>,
        endpoints: ServiceEndpoints,
        config: &ClientConfig,
        http: ReqwestClient,
    ) -> Self {
        let status = flow.subscribe();
        let flow = Arc::new(Mutex::new(flow));
        let queue = PendingRequestQueue::new(
            flow.clone(),
            status,
            RequestDispatcher::with_client(http),
            config.retry,
        );
        Client {
            flow,
            queue,
            endpoints,
            handshake: Mutex::new(()),
        }
    }

    pub fn flow(&self) -> SharedFlow<TSignatureMethod> {
        self.flow.clone()
    }

    pub fn queue(&self) -> &PendingRequestQueue<TSignatureMethod> {
        &self.queue
    }

    pub fn endpoints(&self) -> &ServiceEndpoints {
        &self.endpoints
    }

    /// Reload the persisted token, then report whether one is held.
    pub async fn is_authorized(&self) -> bool {
        self.flow.lock().await.load_access_token()
    }

    /// Forget the access token, in memory and on disk.
    pub async fn clear_access_token(&self) -> Result<()> {
        self.flow.lock().await.clear_access_token()
    }

    /// Make sure an access token is held, running the handshake if needed.
    ///
    /// A persisted token is used when present. Otherwise a request token is
    /// fetched and `present` receives the user-authorization url together with
    /// the sender that must eventually deliver the verifier (or be dropped to
    /// abandon).
    ///
    /// Concurrent calls run one after another; a later call finds the token
    /// obtained by the earlier one and returns without presenting anything.
    ///
    /// # Errors
    ///
    /// [`Error::Abandoned`] when the sender is dropped without a verifier,
    /// [`Error::Precondition`] when the handshake was restarted or abandoned
    /// through [`Client::flow`] while the verifier was pending, or whatever the
    /// request token or access token step failed with.
    pub async fn authorize<F>(&self, present: F) -> Result<()>
    where
        F: FnOnce(Url, VerifierSender),
    {
        let _handshake = self.handshake.lock().await;
        let (request_token, authorize_url) = {
            let mut flow = self.flow.lock().await;
            if flow.load_access_token() {
                return Ok(());
            }
            let response = flow
                .get_request_token(self.endpoints.request_token.as_str())
                .await?;
            match flow.authorization_url(self.endpoints.authorize.as_str()) {
                Ok(url) => (response.oauth_token, url),
                Err(e) => {
                    flow.abandon();
                    return Err(e);
                }
            }
        };

        let (sender, receiver) = verifier_channel();
        present(authorize_url, sender);
        let received = receiver.await;

        let mut flow = self.flow.lock().await;
        let still_ours = flow
            .request_token()
            .map_or(false, |pair| pair.token == request_token);
        if !still_ours {
            tracing::warn!(
                service = %flow.service(),
                "handshake replaced while awaiting the verifier"
            );
            return Err(Error::Precondition(
                "handshake was replaced while awaiting the verifier",
            ));
        }
        let verifier = match received {
            Ok(verifier) => verifier,
            Err(e) => {
                tracing::debug!("interactive authorization abandoned");
                flow.abandon();
                return Err(e);
            }
        };
        if !flow.deliver_verifier(&verifier) {
            return Err(Error::Precondition(
                "flow stopped awaiting a verifier before one arrived",
            ));
        }
        flow.get_access_token(self.endpoints.access_token.as_str())
            .await?;
        Ok(())
    }

    /// Submit a message through the pending queue.
    pub async fn send(&self, message: Message) -> Result<ApiResponse> {
        self.queue.submit(message).await
    }

    /// Expand an endpoint template and submit it through the pending queue.
    pub async fn call_api(&self, call: ApiCall) -> Result<ApiResponse> {
        let message = call.into_message()?;
        self.queue.submit(message).await
    }
}

/// An API call against an endpoint template.
///
/// A `:name` segment in the template is replaced by the parameter called
/// `name`, which is then no longer sent as a parameter. Segments without a
/// matching parameter are left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCall {
    method: Method,
    template: String,
    parameters: Vec<(String, String)>,
}

impl ApiCall {
    pub fn new<T: Into<String>>(method: Method, template: T) -> Self {
        ApiCall {
            method,
            template: template.into(),
            parameters: Vec::new(),
        }
    }

    pub fn get<T: Into<String>>(template: T) -> Self {
        Self::new(Method::GET, template)
    }

    pub fn post<T: Into<String>>(template: T) -> Self {
        Self::new(Method::POST, template)
    }

    pub fn parameter<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.parameters.push((key.into(), value.into()));
        self
    }

    /// Substitute the template, then build the message to sign.
    pub fn into_message(self) -> Result<Message> {
        let mut parameters = self.parameters;
        let url = substitute(&self.template, &mut parameters);
        let message = parameters
            .into_iter()
            .fold(Message::new(self.method, &url)?, |message, (k, v)| {
                message.parameter(k, v)
            });
        Ok(message)
    }
}

fn substitute(template: &str, parameters: &mut Vec<(String, String)>) -> String {
    let is_terminator = |c: char| matches!(c, '/' | '.' | '?' | '&' | '#' | ':');
    let mut expanded = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find(':') {
        expanded.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let end = after.find(is_terminator).unwrap_or(after.len());
        let name = &after[..end];
        let matched = if name.is_empty() {
            None
        } else {
            parameters.iter().position(|(k, _)| k == name)
        };
        match matched {
            Some(index) => {
                let (_, value) = parameters.remove(index);
                expanded.push_str(&percent_encode(&value));
            }
            None => {
                expanded.push(':');
                expanded.push_str(name);
            }
        }
        rest = &after[end..];
    }
    expanded.push_str(rest);
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_segments_are_substituted_and_removed() {
        let message = ApiCall::get("https://api.twitter.com/1/statuses/show/:id.json")
            .parameter("id", "12345678")
            .parameter("trim_user", "true")
            .into_message()
            .unwrap();
        assert_eq!(
            message.url().as_str(),
            "https://api.twitter.com/1/statuses/show/12345678.json"
        );
        assert_eq!(
            message.parameters(),
            &[("trim_user".to_string(), "true".to_string())]
        );
    }

    #[test]
    fn unmatched_segments_and_ports_stay() {
        let message = ApiCall::post("http://127.0.0.1:8080/:user/lists/:list_id/members.json")
            .parameter("user", "mogya")
            .into_message()
            .unwrap();
        assert_eq!(
            message.url().as_str(),
            "http://127.0.0.1:8080/mogya/lists/:list_id/members.json"
        );
        assert!(message.parameters().is_empty());
        assert_eq!(message.method(), &Method::POST);
    }

    #[test]
    fn substituted_values_are_encoded() {
        let mut parameters = vec![("name".to_string(), "a b/c".to_string())];
        assert_eq!(
            substitute("https://x.example/:name", &mut parameters),
            "https://x.example/a%20b%2Fc"
        );
        assert!(parameters.is_empty());
    }
}

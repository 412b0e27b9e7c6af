use http::header::CONTENT_TYPE;
use http::Method;
use reqwest::Client as ReqwestClient;
use serde::de::DeserializeOwned;
use url::Url;

use crate::flow::FORM_CONTENT_TYPE;
use crate::{AuthorizationFlow, Message, Result, SignatureMethod, SignedParameters, TokenReader};

/// A successful (2xx) response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// [`crate::Error::Decode`] when the body is not JSON of the expected shape.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// A signed request ready to go on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    method: Method,
    url: Url,
    body: Option<String>,
}

impl PreparedRequest {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The form-encoded body, absent for `GET`.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

/// Signs API calls with the flow's access token and sends them.
#[derive(Debug, Clone, Default)]
pub struct RequestDispatcher {
    http: ReqwestClient,
}

impl RequestDispatcher {
    /// Constructs a new `RequestDispatcher`.
    ///
    /// This method calls reqwest::Client::new() internally.
    pub fn new() -> Self {
        Default::default()
    }

    /// Constructs a new `RequestDispatcher` with specifying inner `reqwest::Client`.
    pub fn with_client(client: ReqwestClient) -> Self {
        RequestDispatcher { http: client }
    }

    /// Sign `message` and lay it out for sending.
    ///
    /// `GET` carries every signed parameter in the query string and has no
    /// body. Other methods carry them as a form body and keep the url as given.
    ///
    /// # Errors
    ///
    /// [`crate::Error::NotAuthorized`] when the flow holds no access token;
    /// nothing is sent in that case.
    pub fn prepare<TSignatureMethod>(
        &self,
        flow: &mut AuthorizationFlow<TSignatureMethod>,
        message: Message,
    ) -> Result<PreparedRequest>
    where
        TSignatureMethod: SignatureMethod,
    {
        let (message, signed) = flow.sign_request(message)?;
        let (method, mut url, _) = message.into_parts();
        let body = if method == Method::GET {
            append_query(&mut url, &signed);
            None
        } else {
            Some(signed.to_encoded())
        };
        Ok(PreparedRequest { method, url, body })
    }

    /// Send a prepared request and classify the outcome.
    ///
    /// # Errors
    ///
    /// [`crate::Error::Transport`] when no response arrived,
    /// [`crate::Error::Protocol`] with status and body outside 200-299.
    pub async fn execute(&self, request: PreparedRequest) -> Result<ApiResponse> {
        tracing::debug!(method = %request.method, url = %request.url, "dispatching signed request");
        let mut builder = self.http.request(request.method, request.url);
        if let Some(body) = request.body {
            builder = builder.header(CONTENT_TYPE, FORM_CONTENT_TYPE).body(body);
        }
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.successful_text().await.map_err(|e| {
            tracing::debug!(status, error = %e, "signed request failed");
            e
        })?;
        Ok(ApiResponse { status, body })
    }

    /// Sign and send in one go.
    pub async fn send<TSignatureMethod>(
        &self,
        flow: &mut AuthorizationFlow<TSignatureMethod>,
        message: Message,
    ) -> Result<ApiResponse>
    where
        TSignatureMethod: SignatureMethod,
    {
        let prepared = self.prepare(flow, message)?;
        self.execute(prepared).await
    }
}

fn append_query(url: &mut Url, signed: &SignedParameters) {
    let encoded = signed.to_encoded();
    let query = match url.query() {
        None | Some("") => encoded,
        Some(existing) => format!("{}&{}", existing, encoded),
    };
    url.set_query(Some(&query));
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        ConsumerCredentials, Error, MemoryTokenStore, PersistedTokenRecord, TokenStore,
        OAUTH_SIGNATURE_KEY,
    };

    fn authorized_flow() -> AuthorizationFlow {
        let store = MemoryTokenStore::new();
        store
            .save("twitter", &PersistedTokenRecord::new("at1", "ats1"))
            .unwrap();
        let mut flow = AuthorizationFlow::new(
            "twitter",
            ConsumerCredentials::new("consumer-key", "consumer-secret"),
            Arc::new(store),
        );
        flow.load_access_token();
        flow
    }

    #[test]
    fn get_puts_everything_in_the_query() {
        let mut flow = authorized_flow();
        let message = Message::get("https://api.example.com/1/search.json?lang=en")
            .unwrap()
            .parameter("q", "hello world");
        let prepared = RequestDispatcher::new().prepare(&mut flow, message).unwrap();

        assert_eq!(prepared.method(), &Method::GET);
        assert_eq!(prepared.body(), None);
        let query = prepared.url().query().unwrap();
        assert!(query.starts_with("lang=en&"));
        assert!(query.contains("q=hello%20world"));
        assert!(query.contains("oauth_token=at1"));
        assert!(query.contains(OAUTH_SIGNATURE_KEY));
    }

    #[test]
    fn post_puts_everything_in_the_body() {
        let mut flow = authorized_flow();
        let message = Message::post("https://api.example.com/1/statuses/update.json")
            .unwrap()
            .parameter("status", "a+b c");
        let prepared = RequestDispatcher::new().prepare(&mut flow, message).unwrap();

        assert_eq!(
            prepared.url().as_str(),
            "https://api.example.com/1/statuses/update.json"
        );
        let body = prepared.body().unwrap();
        assert!(body.starts_with("status=a%2Bb%20c&oauth_consumer_key=consumer-key&"));
        assert!(body.contains("oauth_signature="));
    }

    #[test]
    fn unauthorized_flow_prepares_nothing() {
        let mut flow = AuthorizationFlow::new(
            "twitter",
            ConsumerCredentials::new("consumer-key", "consumer-secret"),
            Arc::new(MemoryTokenStore::new()),
        );
        let message = Message::get("https://api.example.com/1/search.json").unwrap();
        assert!(matches!(
            RequestDispatcher::new().prepare(&mut flow, message),
            Err(Error::NotAuthorized)
        ));
    }
}

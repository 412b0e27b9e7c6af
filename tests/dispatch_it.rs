// std
use std::{sync::Arc, time::Duration};
// crates.io
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use httpmock::prelude::*;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use sha1::Sha1;
// self
use reqwest_oauth1_flow::{
    ApiCall, AuthorizationFlow, Client, ClientConfig, ConsumerCredentials, Error, FlowState,
    MemoryTokenStore, Message, OAuthParameters, PersistedTokenRecord, RequestDispatcher,
    RetryPolicy, ServiceEndpoints, SignatureEngine, TokenStore,
};

const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, PartialEq, Eq, Deserialize)]
struct Status {
    id: u64,
    text: String,
}

fn enc(input: &str) -> String {
    utf8_percent_encode(input, UNRESERVED).to_string()
}

fn authorized_store() -> MemoryTokenStore {
    let store = MemoryTokenStore::new();

    store
        .save("twitter", &PersistedTokenRecord::new("at1", "ats1"))
        .expect("Memory store should accept the record.");

    store
}

fn build_config(server: &MockServer) -> ClientConfig {
    let endpoints = ServiceEndpoints::new(
        &server.url("/oauth/request_token"),
        &server.url("/oauth/authorize"),
        &server.url("/oauth/access_token"),
    )
    .expect("Mock endpoints should parse successfully.");

    ClientConfig::new("twitter", "ck", "cs", endpoints).retry(
        RetryPolicy::default()
            .interval(Duration::from_millis(20))
            .deadline(Some(Duration::from_secs(10))),
    )
}

#[tokio::test]
async fn get_call_carries_a_verifiable_signature_in_the_query() {
    let server = MockServer::start_async().await;
    let url = server.url("/1/search.json");
    let base_string = format!(
        "GET&{}&{}",
        enc(&url),
        enc(
            "oauth_consumer_key=ck&oauth_nonce=kllo9940pd9333jh&oauth_signature_method=HMAC-SHA1\
             &oauth_timestamp=1191242096&oauth_token=at1&q=hello%20world"
        )
    );
    let mut mac = Hmac::<Sha1>::new_from_slice(b"cs&ats1").expect("Any key length is accepted.");

    mac.update(base_string.as_bytes());

    let expected = BASE64.encode(mac.finalize().into_bytes());
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/1/search.json")
                .query_param("q", "hello world")
                .query_param("oauth_token", "at1")
                .query_param("oauth_nonce", "kllo9940pd9333jh")
                .query_param("oauth_signature", expected.as_str());
            then.status(200).body("{\"statuses\":[]}");
        })
        .await;
    let engine = SignatureEngine::new()
        .parameters(OAuthParameters::new().nonce("kllo9940pd9333jh").timestamp(1191242096u64));
    let mut flow = AuthorizationFlow::new(
        "twitter",
        ConsumerCredentials::new("ck", "cs"),
        Arc::new(authorized_store()),
    )
    .with_engine(engine);

    assert!(flow.load_access_token());

    let dispatcher = RequestDispatcher::new();
    let message = Message::get(&url)
        .expect("Mock url should parse.")
        .parameter("q", "hello world");
    let prepared = dispatcher
        .prepare(&mut flow, message)
        .expect("Authorized flow should sign.");

    assert!(prepared.url().query().unwrap_or_default().contains("q=hello%20world"));
    assert_eq!(prepared.body(), None);

    let response = dispatcher.execute(prepared).await.expect("Signed call should succeed.");

    mock.assert_calls_async(1).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.body, "{\"statuses\":[]}");
}

#[tokio::test]
async fn post_call_is_form_encoded() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/1/statuses/update.json")
                .header("content-type", "application/x-www-form-urlencoded");
            then.status(200).body("{\"id\":1,\"text\":\"Hello\"}");
        })
        .await;
    let mut flow = AuthorizationFlow::new(
        "twitter",
        ConsumerCredentials::new("ck", "cs"),
        Arc::new(authorized_store()),
    );

    flow.load_access_token();

    let message = Message::post(&server.url("/1/statuses/update.json"))
        .expect("Mock url should parse.")
        .parameter("status", "Hello Ladies + Gentlemen, a signed OAuth request!");
    let response = RequestDispatcher::new()
        .send(&mut flow, message)
        .await
        .expect("Signed post should succeed.");

    mock.assert_calls_async(1).await;

    assert_eq!(response.body, "{\"id\":1,\"text\":\"Hello\"}");

    let status = response.json::<Status>().expect("Body should decode as a status.");

    assert_eq!(status, Status { id: 1, text: "Hello".into() });
    assert!(matches!(response.json::<Vec<Status>>(), Err(Error::Decode(_))));
}

#[tokio::test]
async fn error_status_surfaces_with_body() {
    let server = MockServer::start_async().await;
    let _mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/1/account/verify_credentials.json");
            then.status(401).body("{\"errors\":[{\"code\":89}]}");
        })
        .await;
    let client = Client::with_store(&build_config(&server), Arc::new(authorized_store()));
    let err = client
        .send(
            Message::get(&server.url("/1/account/verify_credentials.json"))
                .expect("Mock url should parse."),
        )
        .await
        .expect_err("A 401 should be reported.");

    match err {
        Error::Protocol { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "{\"errors\":[{\"code\":89}]}");
        }
        other => panic!("Unexpected error: {other:?}."),
    }
    assert!(client.flow().lock().await.is_authorized());
}

#[tokio::test]
async fn unreachable_api_is_a_transport_error_and_keeps_authorization() {
    let mut flow = AuthorizationFlow::new(
        "twitter",
        ConsumerCredentials::new("ck", "cs"),
        Arc::new(authorized_store()),
    );

    assert!(flow.load_access_token());

    let message = Message::get("http://127.0.0.1:1/1/search.json")
        .expect("Url should parse.")
        .parameter("q", "rust");
    let err = RequestDispatcher::new()
        .send(&mut flow, message)
        .await
        .expect_err("Nothing listens on port 1.");

    assert!(matches!(err, Error::Transport(_)));
    assert_eq!(err.status(), None);
    assert!(flow.is_authorized());
    assert_eq!(flow.state(), FlowState::Authorized);
}

#[tokio::test]
async fn calls_wait_for_authorization_then_dispatch_once() {
    let server = MockServer::start_async().await;
    let request_token = server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/request_token");
            then.status(200).body("oauth_token=rt1&oauth_token_secret=rts1");
        })
        .await;
    let access_token = server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/access_token");
            then.status(200).body("oauth_token=at1&oauth_token_secret=ats1");
        })
        .await;
    let api = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/1/statuses/show/42.json")
                .query_param("oauth_token", "at1")
                .query_param("trim_user", "true");
            then.status(200).body("{\"id\":42}");
        })
        .await;
    let config = build_config(&server);
    let client = Client::with_store(&config, Arc::new(MemoryTokenStore::new()));
    let queue = client.queue().clone();
    let call = ApiCall::get(server.url("/1/statuses/show/:id.json"))
        .parameter("id", "42")
        .parameter("trim_user", "true");
    let pending = tokio::spawn(async move {
        queue.submit(call.into_message().expect("Template should expand.")).await
    });

    tokio::time::sleep(Duration::from_millis(150)).await;
    api.assert_calls_async(0).await;
    assert!(!pending.is_finished());

    {
        let flow = client.flow();
        let mut flow = flow.lock().await;

        flow.get_request_token(config.endpoints.request_token.as_str())
            .await
            .expect("Request token step should succeed.");

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(flow.deliver_verifier("123456"));
        flow.get_access_token(config.endpoints.access_token.as_str())
            .await
            .expect("Access token exchange should succeed.");
    }

    let response = pending
        .await
        .expect("Queued task should not panic.")
        .expect("Queued call should be dispatched.");

    request_token.assert_calls_async(1).await;
    access_token.assert_calls_async(1).await;
    api.assert_calls_async(1).await;

    assert_eq!(response.body, "{\"id\":42}");
}

#[tokio::test]
async fn queued_call_times_out_without_authorization() {
    let server = MockServer::start_async().await;
    let api = server
        .mock_async(|when, then| {
            when.method(GET).path("/1/search.json");
            then.status(200).body("{}");
        })
        .await;
    let config = build_config(&server).retry(
        RetryPolicy::default()
            .interval(Duration::from_millis(10))
            .deadline(Some(Duration::from_millis(80))),
    );
    let client = Client::with_store(&config, Arc::new(MemoryTokenStore::new()));
    let err = client
        .call_api(ApiCall::get(server.url("/1/search.json")).parameter("q", "rust"))
        .await
        .expect_err("The call should give up.");

    assert!(matches!(err, Error::PendingTimeout(_)));
    api.assert_calls_async(0).await;
}

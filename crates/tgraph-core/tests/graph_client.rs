//! Graph client behavior against a mock Graph endpoint.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{Duration, Utc};
use tgraph_core::graph::{format_messages, format_profile};
use tgraph_core::{
    AccessToken, CachedCredential, CoreError, DirectTokenCredential, GraphClient, Token,
    get_graph_client,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path, query_param},
};

fn counting_token(calls: Arc<AtomicUsize>) -> Token {
    Token::from_fn(move || {
        let calls = Arc::clone(&calls);
        async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(AccessToken::new(
                format!("token-{n}"),
                Utc::now() + Duration::minutes(30),
            ))
        }
    })
}

fn client_for(server: &MockServer, token: Token) -> GraphClient {
    let credential = DirectTokenCredential::new(token, Some("graph".to_string()));
    GraphClient::with_http_client(reqwest::Client::new(), Arc::new(credential))
        .with_base_url(format!("{}/v1.0/", server.uri()))
}

#[tokio::test]
async fn profile_uses_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me"))
        .and(header("authorization", "Bearer literal-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "user-1",
            "displayName": "Ada Lovelace",
            "userPrincipalName": "ada@contoso.com",
            "mail": "ada@contoso.com",
            "jobTitle": "Engineer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = get_graph_client("literal-token", Some("graph".to_string()))
        .expect("client")
        .with_base_url(format!("{}/v1.0", server.uri()));
    assert_eq!(client.connection_name(), Some("graph"));

    let user = client.me().await.expect("profile");
    assert_eq!(user.display_name.as_deref(), Some("Ada Lovelace"));

    let rendered = format_profile(&user);
    assert!(rendered.contains("**Name:** Ada Lovelace"));
    assert!(rendered.contains("**Department:** N/A"));
}

#[tokio::test]
async fn messages_select_fields_and_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me/messages"))
        .and(query_param("$select", "subject,from,receivedDateTime"))
        .and(query_param("$top", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [
                {
                    "id": "m1",
                    "subject": "Quarterly review",
                    "from": { "emailAddress": { "name": "Grace Hopper", "address": "grace@contoso.com" } },
                    "receivedDateTime": "2024-03-01T09:30:00Z"
                },
                { "id": "m2" }
            ]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, Token::literal("literal-token"));
    let messages = client.messages(3).await.expect("messages");
    assert_eq!(messages.len(), 2);

    let rendered = format_messages(&messages);
    assert!(rendered.contains("**1.** Quarterly review"));
    assert!(rendered.contains("**From:** Grace Hopper"));
    assert!(rendered.contains("**Received:** 2024-03-01 09:30"));
    assert!(rendered.contains("**2.** No Subject"));
    assert!(rendered.contains("**From:** Unknown"));
}

#[tokio::test]
async fn unauthorized_maps_to_sign_in_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me"))
        .respond_with(ResponseTemplate::new(401).set_body_string("InvalidAuthenticationToken"))
        .mount(&server)
        .await;

    let err = client_for(&server, Token::literal("stale"))
        .me()
        .await
        .expect_err("401");
    assert!(matches!(err, CoreError::Unauthorized(_)));
    assert!(err.requires_sign_in());
}

#[tokio::test]
async fn server_errors_map_to_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me/presence"))
        .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
        .mount(&server)
        .await;

    let err = client_for(&server, Token::literal("t"))
        .presence()
        .await
        .expect_err("503");
    match err {
        CoreError::Api(message) => assert!(message.contains("503")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn provider_token_is_resolved_per_request() {
    let server = MockServer::start().await;
    for n in 1..=2 {
        Mock::given(method("GET"))
            .and(path("/v1.0/me/joinedTeams"))
            .and(header("authorization", format!("Bearer token-{n}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [{ "id": "team-1", "displayName": "Platform" }]
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let client = client_for(&server, counting_token(Arc::clone(&calls)));

    let teams = client.joined_teams().await.expect("first call");
    assert_eq!(teams[0].display_name.as_deref(), Some("Platform"));
    client.joined_teams().await.expect("second call");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn expired_provider_token_never_reaches_graph() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let token = Token::from_fn(|| async {
        Ok(AccessToken::new("old", Utc::now() - Duration::seconds(5)))
    });
    let err = client_for(&server, token).me().await.expect_err("expired");
    assert!(matches!(err, CoreError::TokenExpired { .. }));
}

#[tokio::test]
async fn cached_credential_reuses_token_across_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me/presence"))
        .and(header("authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "user-1",
            "availability": "Busy",
            "activity": "InACall"
        })))
        .expect(3)
        .mount(&server)
        .await;

    let calls = Arc::new(AtomicUsize::new(0));
    let direct = DirectTokenCredential::new(counting_token(Arc::clone(&calls)), None);
    let client = GraphClient::with_http_client(
        reqwest::Client::new(),
        Arc::new(CachedCredential::new(direct)),
    )
    .with_base_url(format!("{}/v1.0", server.uri()));

    for _ in 0..3 {
        client.presence().await.expect("presence");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

//! Token service clients against a mock token service.

use std::sync::Arc;

use tgraph_core::oauth::{
    ExchangeUserTokenParams, GetBotSignInUrlParams, GetUserAadTokenParams, GetUserTokenParams,
    GetUserTokenStatusParams, SignOutUserParams, TokenExchangeRequest, TokenExchangeState,
};
use tgraph_core::{
    ApiClient, ApiClientSettings, CoreError, DirectTokenCredential, GraphClient, UserTokenProvider,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path, query_param},
};

fn api_client(server: &MockServer) -> ApiClient {
    let settings = ApiClientSettings::merge(None, Some(server.uri()));
    ApiClient::new(reqwest::Client::new(), settings).with_bot_token("bot-token")
}

fn token_params(connection_name: &str) -> GetUserTokenParams {
    GetUserTokenParams {
        user_id: "29:user".to_string(),
        connection_name: connection_name.to_string(),
        channel_id: "msteams".to_string(),
        code: None,
    }
}

#[tokio::test]
async fn get_token_sends_camel_case_query_and_bot_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/usertoken/GetToken"))
        .and(query_param("userId", "29:user"))
        .and(query_param("connectionName", "graph"))
        .and(query_param("channelId", "msteams"))
        .and(header("authorization", "Bearer bot-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "channelId": "msteams",
            "connectionName": "graph",
            "token": "user-token",
            "expiration": "2099-01-01T00:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = api_client(&server)
        .user_token()
        .get(&token_params("graph"))
        .await
        .expect("token");
    assert_eq!(response.token, "user-token");
    assert_eq!(response.expiration.as_deref(), Some("2099-01-01T00:00:00Z"));
}

#[tokio::test]
async fn missing_token_reports_not_signed_in() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/usertoken/GetToken"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = api_client(&server)
        .user_token()
        .get(&token_params("graph"))
        .await
        .expect_err("404");
    match err {
        CoreError::TokenResolution(message) => assert!(message.contains("not signed in")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn aad_tokens_post_resource_urls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/usertoken/GetAadTokens"))
        .and(query_param("connectionName", "graph"))
        .and(body_json(serde_json::json!({
            "resourceUrls": ["https://graph.microsoft.com"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "https://graph.microsoft.com": { "connectionName": "graph", "token": "aad-token" }
        })))
        .mount(&server)
        .await;

    let tokens = api_client(&server)
        .user_token()
        .get_aad(&GetUserAadTokenParams {
            user_id: "29:user".to_string(),
            connection_name: "graph".to_string(),
            channel_id: "msteams".to_string(),
            resource_urls: vec!["https://graph.microsoft.com".to_string()],
        })
        .await
        .expect("aad tokens");
    assert_eq!(tokens["https://graph.microsoft.com"].token, "aad-token");
}

#[tokio::test]
async fn status_sign_out_and_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/usertoken/GetTokenStatus"))
        .and(query_param("include", "graph"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "connectionName": "graph", "hasToken": true, "serviceProviderDisplayName": "Azure Active Directory v2" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/usertoken/SignOut"))
        .and(query_param("userId", "29:user"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/usertoken/exchange"))
        .and(body_json(serde_json::json!({ "token": "sso-token" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "connectionName": "graph",
            "token": "exchanged"
        })))
        .mount(&server)
        .await;

    let client = api_client(&server).user_token();

    let status = client
        .get_status(&GetUserTokenStatusParams {
            user_id: "29:user".to_string(),
            channel_id: "msteams".to_string(),
            include_filter: Some("graph".to_string()),
        })
        .await
        .expect("status");
    assert_eq!(status.len(), 1);
    assert!(status[0].has_token);

    client
        .sign_out(&SignOutUserParams {
            user_id: "29:user".to_string(),
            connection_name: "graph".to_string(),
            channel_id: "msteams".to_string(),
        })
        .await
        .expect("sign out");

    let exchanged = client
        .exchange(&ExchangeUserTokenParams {
            user_id: "29:user".to_string(),
            connection_name: "graph".to_string(),
            channel_id: "msteams".to_string(),
            exchange_request: TokenExchangeRequest {
                uri: None,
                token: Some("sso-token".to_string()),
            },
        })
        .await
        .expect("exchange");
    assert_eq!(exchanged.token, "exchanged");
}

#[tokio::test]
async fn sign_in_url_and_resource() {
    let server = MockServer::start().await;
    let state = TokenExchangeState::new("graph", "19:conv", "msteams", "app-id")
        .encode()
        .expect("state");

    Mock::given(method("GET"))
        .and(path("/api/botsignin/GetSignInUrl"))
        .and(query_param("state", state.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string("https://login.example/sign-in"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/botsignin/GetSignInResource"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "signInLink": "https://login.example/sign-in",
            "tokenExchangeResource": { "id": "r1", "uri": "api://app-id" }
        })))
        .mount(&server)
        .await;

    let client = api_client(&server).bot_sign_in();
    let params = GetBotSignInUrlParams {
        state,
        ..GetBotSignInUrlParams::default()
    };

    let url = client.get_url(&params).await.expect("url");
    assert_eq!(url, "https://login.example/sign-in");

    let resource = client.get_resource(&params).await.expect("resource");
    assert_eq!(
        resource
            .token_exchange_resource
            .and_then(|r| r.uri)
            .as_deref(),
        Some("api://app-id")
    );
}

#[tokio::test]
async fn user_token_provider_feeds_graph_client() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/usertoken/GetToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "connectionName": "graph",
            "token": "user-token",
            "expiration": "2099-01-01T00:00:00Z"
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me"))
        .and(header("authorization", "Bearer user-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "user-1",
            "displayName": "Ada Lovelace"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let provider = UserTokenProvider::new(api_client(&server).user_token(), token_params("graph"));
    assert_eq!(provider.connection_name(), "graph");

    let credential = DirectTokenCredential::new(provider.into_token(), Some("graph".to_string()));
    let graph = GraphClient::with_http_client(reqwest::Client::new(), Arc::new(credential))
        .with_base_url(format!("{}/v1.0", server.uri()));

    for _ in 0..2 {
        let user = graph.me().await.expect("profile");
        assert_eq!(user.display_name.as_deref(), Some("Ada Lovelace"));
    }
}

#[tokio::test]
async fn empty_token_from_service_is_a_resolution_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/usertoken/GetToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "connectionName": "graph",
            "token": ""
        })))
        .mount(&server)
        .await;

    let token = UserTokenProvider::new(api_client(&server).user_token(), token_params("graph"))
        .into_token();
    let err = token.resolve().await.expect_err("empty token");
    assert!(matches!(err, CoreError::TokenResolution(_)));
}

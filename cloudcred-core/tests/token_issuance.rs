//! Integration tests for token issuance against mocked token services.
//!
//! These tests verify that the IAM and CP4D authenticators:
//! - Send the expected token request shape
//! - Attach the issued token once it arrives
//! - Leave the token unset and retry after a failed request
//! - Compute the refresh deadline from the response

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use cloudcred_core::authenticator::{CloudPakForDataAuthenticator, IamAuthenticator};
use cloudcred_core::token::refresh_deadline_millis;
use cloudcred_core::{
    AuthError, AuthType, Authenticator, PropertyMap, ReqwestTransport, TokenError, TokenStatus,
};
use reqwest::header::{AUTHORIZATION, HeaderMap};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string_contains, header, method, path},
};

fn jwt(iat: i64, exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(json!({ "iat": iat, "exp": exp, "sub": "admin" }).to_string());
    format!("{}.{}.signature", header, payload)
}

async fn mount_iam_success(server: &MockServer, access_token: &str) {
    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .and(body_string_contains("grant_type=urn%3Aibm%3Aparams%3Aoauth%3Agrant-type%3Aapikey"))
        .and(body_string_contains("apikey=my-apikey"))
        .and(body_string_contains("response_type=cloud_iam"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access_token,
            "refresh_token": "unused",
            "token_type": "Bearer",
            "expires_in": 3600,
            "expiration": 1_900_003_600
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_iam_token_is_issued_and_attached() {
    let server = MockServer::start().await;
    mount_iam_success(&server, "iam-access-token").await;

    let authenticator = IamAuthenticator::builder()
        .apikey("my-apikey")
        .url(format!("{}/identity/token", server.uri()))
        .build()
        .unwrap();

    let token = authenticator.ready().await.unwrap();
    assert_eq!(token.access_token.expose(), "iam-access-token");
    assert_eq!(
        token.expires_at_millis,
        refresh_deadline_millis(1_900_000_000, 3600)
    );
    assert_eq!(authenticator.status(), TokenStatus::Ready);

    let authenticator = Authenticator::from(authenticator);
    assert!(authenticator.can_authenticate());

    let mut headers = HeaderMap::new();
    authenticator.authenticate(&mut headers).unwrap();
    assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer iam-access-token");
}

#[tokio::test]
async fn test_iam_client_credentials_sent_as_basic_auth() {
    let server = MockServer::start().await;
    let expected = format!("Basic {}", STANDARD.encode("my-client:my-secret"));

    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .and(header("authorization", expected.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "client-token",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let properties = PropertyMap::new()
        .with("AUTH_TYPE", "iam")
        .with("APIKEY", "my-apikey")
        .with("CLIENT_ID", "my-client")
        .with("CLIENT_SECRET", "my-secret")
        .with("AUTH_URL", format!("{}/identity/token", server.uri()));
    let authenticator =
        Authenticator::from_properties_with_transport(&properties, ReqwestTransport::shared()).unwrap();

    assert_eq!(authenticator.auth_type(), AuthType::Iam);
    let token = authenticator.access_token().await.unwrap().unwrap();
    assert_eq!(token.access_token.expose(), "client-token");
}

#[tokio::test]
async fn test_iam_failure_is_retried_on_next_check() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "errorCode": "BXNIM0415E",
            "errorMessage": "Provided API key could not be found"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_iam_success(&server, "second-try").await;

    let properties = PropertyMap::new()
        .with("APIKEY", "my-apikey")
        .with("AUTH_URL", format!("{}/identity/token", server.uri()));
    let authenticator = Authenticator::from_properties(&properties).unwrap();

    // The construction-time request fails with 401.
    let err = authenticator.ready().await.unwrap_err();
    assert!(matches!(err, TokenError::Status { status: 401, .. }));

    let mut headers = HeaderMap::new();
    assert_eq!(
        authenticator.authenticate(&mut headers),
        Err(AuthError::TokenUnavailable { auth_type: AuthType::Iam })
    );
    assert!(headers.get(AUTHORIZATION).is_none());

    // The failed check above fired a new request.
    authenticator.ready().await.unwrap();
    authenticator.authenticate(&mut headers).unwrap();
    assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer second-try");
}

#[tokio::test]
async fn test_iam_can_authenticate_polls_without_blocking() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "slow-token", "expires_in": 3600 }))
                .set_delay(std::time::Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let authenticator = IamAuthenticator::builder()
        .apikey("my-apikey")
        .url(format!("{}/identity/token", server.uri()))
        .build()
        .unwrap();

    // Repeated checks while the request is outstanding do not fire more
    // requests.
    assert!(!authenticator.can_authenticate());
    assert!(!authenticator.can_authenticate());
    assert_eq!(authenticator.status(), TokenStatus::AwaitingToken);

    let mut attempts = 0;
    while !authenticator.can_authenticate() {
        attempts += 1;
        assert!(attempts < 200, "token never arrived");
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(authenticator.token().unwrap().access_token.expose(), "slow-token");
}

#[tokio::test]
async fn test_cp4d_token_is_issued_from_jwt() {
    let server = MockServer::start().await;
    let iat = chrono::Utc::now().timestamp();
    let access_token = jwt(iat, iat + 43_200);
    let expected = format!("Basic {}", STANDARD.encode("admin:password"));

    Mock::given(method("GET"))
        .and(path("/v1/preauth/validateAuth"))
        .and(header("authorization", expected.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "username": "admin",
            "role": "Admin",
            "permissions": ["administrator"],
            "sub": "admin",
            "iss": "KNOXSSO",
            "aud": "DSX",
            "uid": "999",
            "authenticator": "default",
            "accessToken": access_token,
            "_messageCode_": "success",
            "message": "success"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let authenticator =
        CloudPakForDataAuthenticator::new(format!("{}/", server.uri()), "admin", "password").unwrap();

    let token = authenticator.ready().await.unwrap();
    assert_eq!(token.access_token.expose(), access_token);
    assert_eq!(
        token.expires_at_millis,
        refresh_deadline_millis(iat, 43_200)
    );
    assert_eq!(authenticator.status(), TokenStatus::Ready);
}

#[tokio::test]
async fn test_cp4d_token_past_deadline_is_not_used() {
    let server = MockServer::start().await;
    let access_token = jwt(1_700_000_000, 1_700_043_200);

    Mock::given(method("GET"))
        .and(path("/v1/preauth/validateAuth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accessToken": access_token })))
        .mount(&server)
        .await;

    let authenticator = CloudPakForDataAuthenticator::new(server.uri(), "admin", "password").unwrap();

    // A token issued long ago arrives already past its refresh deadline.
    assert!(authenticator.ready().await.is_err());
    assert_eq!(authenticator.last_error(), None);
    assert!(authenticator.token().is_none());
}

#[tokio::test]
async fn test_cp4d_rejects_token_without_claims() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/preauth/validateAuth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accessToken": "opaque" })))
        .mount(&server)
        .await;

    let properties = PropertyMap::new()
        .with("AUTH_TYPE", "CP4D")
        .with("AUTH_URL", server.uri())
        .with("USERNAME", "admin")
        .with("PASSWORD", "password");
    let authenticator = Authenticator::from_properties(&properties).unwrap();

    let err = authenticator.ready().await.unwrap_err();
    assert!(matches!(err, TokenError::InvalidJwt { .. }));
    assert!(!authenticator.can_authenticate());
}

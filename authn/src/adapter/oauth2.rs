//! OAuth2 bearer token authentication (RFC 6750).
//!
//! Token issuance is out of scope. The adapter only consumes a
//! [`ResourceServer`], the verification half of an OAuth2 server, and turns
//! its verdict into an identity, a guest, or a terminal error response.

use axum::http::{header, HeaderValue, StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{AuthOutcome, AuthenticationAdapter};
use crate::context::{AuthContext, AuthResponse, AuthenticationResult};
use crate::credentials::{self, access_token, AuthorizationHeader};
use crate::error::{AuthnError, Result};
use crate::identity::{AuthenticatedIdentity, Identity};
use crate::request::AuthRequest;

/// Data a resource server holds about a valid access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
}

impl TokenData {
    /// The name an identity built from this token takes.
    pub fn subject(&self) -> Option<&str> {
        self.user_id.as_deref().or(self.client_id.as_deref())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }
}

/// A failed verification, in OAuth2 error-response terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuth2Failure {
    pub status: StatusCode,
    /// OAuth2 error code; empty when the server gave none.
    pub error: String,
    pub description: String,
}

impl OAuth2Failure {
    pub fn new(status: StatusCode, error: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            description: description.into(),
        }
    }

    pub fn invalid_token(description: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "invalid_token", description)
    }

    pub fn insufficient_scope(description: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "insufficient_scope", description)
    }

    /// Whether the failure should be reported to the client as-is. Anything
    /// else degrades to a guest.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
            && !self.error.is_empty()
    }
}

/// Verification contract of an OAuth2 resource server.
pub trait ResourceServer: Send + Sync + Debug {
    fn verify(&self, access_token: &str) -> std::result::Result<TokenData, OAuth2Failure>;
}

/// Resource server over a fixed token table.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenServer {
    tokens: HashMap<String, TokenData>,
}

impl StaticTokenServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, access_token: impl Into<String>, data: TokenData) {
        self.tokens.insert(access_token.into(), data);
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl ResourceServer for StaticTokenServer {
    fn verify(&self, access_token: &str) -> std::result::Result<TokenData, OAuth2Failure> {
        let data = self
            .tokens
            .get(access_token)
            .ok_or_else(|| OAuth2Failure::invalid_token("The access token provided is invalid"))?;
        if data.is_expired(Utc::now()) {
            return Err(OAuth2Failure::invalid_token("The access token provided has expired"));
        }
        Ok(data.clone())
    }
}

/// Adapter for bearer tokens in the header, a form body or the query string.
#[derive(Debug)]
pub struct OAuth2Adapter {
    name: String,
    realm: String,
    server: Arc<dyn ResourceServer>,
}

impl OAuth2Adapter {
    /// An adapter providing the `oauth2` type.
    pub fn new(realm: impl Into<String>, server: Arc<dyn ResourceServer>) -> Self {
        Self {
            name: credentials::OAUTH2_TYPE.to_string(),
            realm: realm.into(),
            server,
        }
    }

    /// Provides `name` instead of `oauth2`.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    fn header_value(value: String) -> Result<HeaderValue> {
        HeaderValue::from_str(&value).map_err(|e| AuthnError::Adapter {
            adapter: credentials::OAUTH2_TYPE.to_string(),
            message: format!("cannot encode WWW-Authenticate: {e}"),
        })
    }

    fn error_response(&self, failure: &OAuth2Failure) -> Result<AuthResponse> {
        let reason = failure.status.canonical_reason().unwrap_or("Unauthorized");
        let mut response = AuthResponse::with_status(failure.status, reason);
        let challenge = format!(
            "Bearer realm=\"{}\", error=\"{}\", error_description=\"{}\"",
            self.realm,
            failure.error,
            failure.description.replace('"', "'")
        );
        response.append_header(header::WWW_AUTHENTICATE, Self::header_value(challenge)?);
        response.append_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        response.set_body(json!({
            "type": "https://datatracker.ietf.org/doc/html/rfc6750#section-3.1",
            "title": failure.error,
            "status": failure.status.as_u16(),
            "detail": failure.description,
        }));
        Ok(response)
    }
}

impl AuthenticationAdapter for OAuth2Adapter {
    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn provides(&self) -> Vec<String> {
        vec![self.name.clone()]
    }

    fn type_from_request(&self, request: &AuthRequest) -> Option<String> {
        let bearer = matches!(
            credentials::authorization_header(request),
            AuthorizationHeader::Scheme { ref scheme, .. } if scheme == "bearer"
        );
        (bearer || access_token(request).is_some()).then(|| self.name.clone())
    }

    fn pre_auth(
        &self,
        _request: &AuthRequest,
        response: &mut AuthResponse,
    ) -> Result<Option<AuthResponse>> {
        response.set_status(StatusCode::UNAUTHORIZED, "Unauthorized");
        let challenge = Self::header_value(format!("Bearer realm=\"{}\"", self.realm))?;
        response.append_header(header::WWW_AUTHENTICATE, challenge);
        Ok(None)
    }

    fn authenticate(
        &self,
        request: &AuthRequest,
        context: &mut AuthContext,
    ) -> Result<AuthOutcome> {
        let Some((token, source)) = access_token(request) else {
            debug!("No access token on request");
            context.set_authentication_result(AuthenticationResult::failure("Missing access token"));
            return Ok(AuthOutcome::Failed);
        };

        match self.server.verify(&token) {
            Ok(data) => {
                let subject = data.subject().map(str::to_string);
                info!(subject = ?subject, source = ?source, "OAuth2 token accepted");
                let payload = serde_json::to_value(&data).map_err(|e| AuthnError::Adapter {
                    adapter: self.name.clone(),
                    message: format!("cannot serialize token data: {e}"),
                })?;
                let mut identity = AuthenticatedIdentity::new(payload);
                if let Some(subject) = subject {
                    context.set_authentication_result(AuthenticationResult::success(subject.clone()));
                    identity = identity.with_name(subject);
                } else {
                    context.set_authentication_result(AuthenticationResult::success(
                        identity.name().to_string(),
                    ));
                }
                Ok(AuthOutcome::Identity(Identity::authenticated(identity)))
            }
            Err(failure) => {
                warn!(
                    status = failure.status.as_u16(),
                    error = %failure.error,
                    "OAuth2 token rejected"
                );
                context.set_authentication_result(AuthenticationResult::failure(
                    failure.description.clone(),
                ));
                if failure.is_terminal() {
                    Ok(AuthOutcome::Response(self.error_response(&failure)?))
                } else {
                    Ok(AuthOutcome::Failed)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use chrono::Duration;

    #[derive(Debug)]
    struct UnavailableServer;

    impl ResourceServer for UnavailableServer {
        fn verify(&self, _access_token: &str) -> std::result::Result<TokenData, OAuth2Failure> {
            Err(OAuth2Failure::new(StatusCode::SERVICE_UNAVAILABLE, "temporarily_unavailable", ""))
        }
    }

    fn server() -> Arc<StaticTokenServer> {
        let mut server = StaticTokenServer::new();
        server.insert(
            "good",
            TokenData {
                user_id: Some("alice".into()),
                client_id: Some("cli".into()),
                scope: Some("read".into()),
                expires: None,
            },
        );
        server.insert(
            "client-only",
            TokenData {
                user_id: None,
                client_id: Some("batch".into()),
                scope: None,
                expires: None,
            },
        );
        server.insert(
            "stale",
            TokenData {
                user_id: Some("bob".into()),
                client_id: None,
                scope: None,
                expires: Some(Utc::now() - Duration::minutes(5)),
            },
        );
        Arc::new(server)
    }

    fn bearer(token: &str) -> AuthRequest {
        AuthRequest::new(Method::GET, "/users")
            .with_header("Authorization", &format!("Bearer {token}"))
            .unwrap()
    }

    #[test]
    fn test_provides_and_claims() {
        let adapter = OAuth2Adapter::new("api", server());
        assert_eq!(adapter.provides(), vec!["oauth2"]);
        assert_eq!(adapter.type_from_request(&bearer("x")), Some("oauth2".into()));

        let query = AuthRequest::new(Method::GET, "/users?access_token=x");
        assert_eq!(adapter.type_from_request(&query), Some("oauth2".into()));

        let basic = AuthRequest::new(Method::GET, "/")
            .with_header("Authorization", "Basic abc")
            .unwrap();
        assert_eq!(adapter.type_from_request(&basic), None);

        let basic_with_query = AuthRequest::new(Method::GET, "/users?access_token=x")
            .with_header("Authorization", "Basic abc")
            .unwrap();
        assert_eq!(adapter.type_from_request(&basic_with_query), None);

        let renamed = OAuth2Adapter::new("api", server()).with_name("partner");
        assert!(renamed.matches("partner"));
        assert!(!renamed.matches("oauth2"));
    }

    #[test]
    fn test_valid_token_names_identity_after_user() {
        let adapter = OAuth2Adapter::new("api", server());
        let mut context = AuthContext::new();
        let outcome = adapter.authenticate(&bearer("good"), &mut context).unwrap();

        let AuthOutcome::Identity(identity) = outcome else {
            panic!("expected an identity");
        };
        assert_eq!(identity.role_id(), "alice");
        assert_eq!(identity.payload().unwrap()["scope"], "read");
        assert!(context.authentication_result().unwrap().is_valid());
    }

    #[test]
    fn test_client_credentials_token_named_after_client() {
        let adapter = OAuth2Adapter::new("api", server());
        let mut context = AuthContext::new();
        let outcome = adapter
            .authenticate(&bearer("client-only"), &mut context)
            .unwrap();
        let AuthOutcome::Identity(identity) = outcome else {
            panic!("expected an identity");
        };
        assert_eq!(identity.role_id(), "batch");
    }

    #[test]
    fn test_invalid_token_is_terminal() {
        let adapter = OAuth2Adapter::new("api", server());
        let mut context = AuthContext::new();
        let outcome = adapter.authenticate(&bearer("forged"), &mut context).unwrap();

        let AuthOutcome::Response(response) = outcome else {
            panic!("expected a terminal response");
        };
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let challenge = response.headers().get(header::WWW_AUTHENTICATE).unwrap();
        assert!(challenge.to_str().unwrap().contains("error=\"invalid_token\""));
        assert_eq!(response.body().unwrap()["status"], 401);
    }

    #[test]
    fn test_expired_token_is_terminal() {
        let adapter = OAuth2Adapter::new("api", server());
        let mut context = AuthContext::new();
        let outcome = adapter.authenticate(&bearer("stale"), &mut context).unwrap();
        assert!(matches!(outcome, AuthOutcome::Response(_)));
        assert_eq!(
            context.authentication_result().unwrap().messages(),
            ["The access token provided has expired"]
        );
    }

    #[test]
    fn test_non_auth_failure_degrades_to_guest() {
        let adapter = OAuth2Adapter::new("api", Arc::new(UnavailableServer));
        let mut context = AuthContext::new();
        let outcome = adapter.authenticate(&bearer("good"), &mut context).unwrap();
        assert_eq!(outcome, AuthOutcome::Failed);
    }

    #[test]
    fn test_form_token() {
        let adapter = OAuth2Adapter::new("api", server());
        let request = AuthRequest::new(Method::POST, "/users")
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .unwrap()
            .with_body("access_token=good");
        let mut context = AuthContext::new();
        let outcome = adapter.authenticate(&request, &mut context).unwrap();
        assert!(matches!(outcome, AuthOutcome::Identity(_)));
    }

    #[test]
    fn test_pre_auth_bearer_challenge() {
        let adapter = OAuth2Adapter::new("api", server());
        let mut response = AuthResponse::new();
        adapter
            .pre_auth(&AuthRequest::new(Method::GET, "/"), &mut response)
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer realm=\"api\""
        );
    }
}

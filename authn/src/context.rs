//! Request-scoped state shared by the pipeline stages.
//!
//! One [`AuthContext`] lives for the duration of a request. Authentication
//! writes the identity and result, resource resolution writes the resource,
//! authorization writes the verdict, and the provisional response accumulates
//! challenge headers and status codes along the way.

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::identity::Identity;

/// Response sink used for challenges, provisional statuses and terminal
/// adapter responses.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthResponse {
    status: StatusCode,
    reason: Option<String>,
    headers: HeaderMap,
    body: Option<Value>,
}

impl AuthResponse {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            reason: None,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn with_status(status: StatusCode, reason: impl Into<String>) -> Self {
        let mut response = Self::new();
        response.set_status(status, reason);
        response
    }

    pub fn set_status(&mut self, status: StatusCode, reason: impl Into<String>) {
        self.status = status;
        self.reason = Some(reason.into());
    }

    /// Returns the response to a plain 200 with no reason phrase or challenge
    /// headers.
    pub fn reset(&mut self) {
        self.status = StatusCode::OK;
        self.reason = None;
        self.headers.clear();
    }

    pub fn append_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.append(name, value);
    }

    pub fn set_body(&mut self, body: Value) {
        self.body = Some(body);
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The reason phrase, falling back to the canonical one for the status.
    pub fn reason(&self) -> &str {
        self.reason
            .as_deref()
            .or_else(|| self.status.canonical_reason())
            .unwrap_or("")
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}

impl Default for AuthResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of an adapter's credential check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticationResult {
    valid: bool,
    identity: Option<String>,
    messages: Vec<String>,
}

impl AuthenticationResult {
    pub fn success(identity: impl Into<String>) -> Self {
        Self {
            valid: true,
            identity: Some(identity.into()),
            messages: Vec::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            identity: None,
            messages: vec![message.into()],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

/// Per-request authentication and authorization state.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    identity: Option<Identity>,
    result: Option<AuthenticationResult>,
    resource: Option<String>,
    authorized: Option<bool>,
    response: AuthResponse,
}

impl AuthContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The identity, or a guest if authentication has not assigned one.
    pub fn identity(&self) -> Identity {
        self.identity.clone().unwrap_or_default()
    }

    pub fn has_identity(&self) -> bool {
        self.identity.is_some()
    }

    pub fn set_identity(&mut self, identity: Identity) {
        self.identity = Some(identity);
    }

    pub fn authentication_result(&self) -> Option<&AuthenticationResult> {
        self.result.as_ref()
    }

    pub fn set_authentication_result(&mut self, result: AuthenticationResult) {
        self.result = Some(result);
    }

    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    pub fn set_resource(&mut self, resource: Option<String>) {
        self.resource = resource;
    }

    /// The authorization verdict; `None` until the authorization stage runs.
    pub fn is_authorized(&self) -> Option<bool> {
        self.authorized
    }

    pub fn set_authorized(&mut self, authorized: bool) {
        self.authorized = Some(authorized);
    }

    pub fn response(&self) -> &AuthResponse {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut AuthResponse {
        &mut self.response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    #[test]
    fn test_response_reason_fallback() {
        let response = AuthResponse::new();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.reason(), "OK");

        let response = AuthResponse::with_status(StatusCode::UNAUTHORIZED, "Unauthorized");
        assert_eq!(response.reason(), "Unauthorized");
    }

    #[test]
    fn test_response_reset_clears_challenge() {
        let mut response = AuthResponse::with_status(StatusCode::UNAUTHORIZED, "Unauthorized");
        response.append_header(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static("Basic realm=\"api\""),
        );
        response.reset();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().is_empty());
    }

    #[test]
    fn test_context_defaults_to_guest() {
        let context = AuthContext::new();
        assert!(!context.has_identity());
        assert!(context.identity().is_guest());
        assert_eq!(context.is_authorized(), None);
        assert!(context.authentication_result().is_none());
    }

    #[test]
    fn test_authentication_result() {
        let ok = AuthenticationResult::success("alice");
        assert!(ok.is_valid());
        assert_eq!(ok.identity(), Some("alice"));

        let failed = AuthenticationResult::failure("Invalid or absent credentials");
        assert!(!failed.is_valid());
        assert_eq!(failed.messages().len(), 1);
    }
}

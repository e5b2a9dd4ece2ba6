//! Framework-neutral view of an incoming request.
//!
//! The host framework converts its own request type into an [`AuthRequest`]
//! once per request. Everything the authentication and authorization stages
//! need is here: method, headers, query and form parameters, raw body, and the
//! route the framework matched.

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use std::collections::HashMap;

use crate::error::{AuthnError, Result};

/// Content type that carries OAuth2 form-encoded access tokens.
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Canonical form of a controller name: `-` and `.` become `\`.
pub fn normalize_controller(controller: &str) -> String {
    controller.replace(['-', '.'], "\\")
}

/// Lowercases the first character of an action name.
pub fn normalize_action(action: &str) -> String {
    let mut chars = action.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// The route the host framework matched for this request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteMatch {
    controller: Option<String>,
    action: Option<String>,
    params: HashMap<String, String>,
}

impl RouteMatch {
    /// A route dispatched to `controller`, with no action.
    pub fn new(controller: impl Into<String>) -> Self {
        Self {
            controller: Some(controller.into()),
            ..Self::default()
        }
    }

    /// A route that matched but named no controller.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn controller(&self) -> Option<&str> {
        self.controller.as_deref()
    }

    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    /// A named parameter captured by the route (e.g. a REST identifier).
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// Read-only request view consumed by adapters and listeners.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    method: Method,
    uri: String,
    headers: HeaderMap,
    query: HashMap<String, String>,
    body: Vec<u8>,
    route: Option<RouteMatch>,
}

impl AuthRequest {
    /// Creates a request for `method` and the request target `uri`
    /// (path plus optional query string, as sent on the request line).
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let query = uri
            .split_once('?')
            .map(|(_, query)| parse_urlencoded(query).into_iter().collect())
            .unwrap_or_default();

        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            query,
            body: Vec::new(),
            route: None,
        }
    }

    /// Replaces the header map wholesale (used by framework adapters).
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Appends one header, validating name and value.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::try_from(name)
            .map_err(|e| AuthnError::InvalidArgument(format!("header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| AuthnError::InvalidArgument(format!("header value for {name}: {e}")))?;
        self.headers.append(name, value);
        Ok(self)
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_route(mut self, route: RouteMatch) -> Self {
        self.route = Some(route);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request target as sent, used by Digest `uri` verification.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw header field value; `None` when absent or not visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn route(&self) -> Option<&RouteMatch> {
        self.route.as_ref()
    }

    pub fn is_options(&self) -> bool {
        self.method == Method::OPTIONS
    }

    /// Whether this method conventionally carries a request body.
    pub fn carries_body(&self) -> bool {
        !matches!(self.method, Method::GET | Method::HEAD | Method::OPTIONS)
    }

    /// Compares the media type of `Content-Type`, ignoring parameters and case.
    pub fn has_content_type(&self, media_type: &str) -> bool {
        self.header(header::CONTENT_TYPE.as_str())
            .and_then(|value| value.split(';').next())
            .is_some_and(|value| value.trim().eq_ignore_ascii_case(media_type))
    }

    /// A parsed form-post field. Only form-encoded bodies are parsed.
    pub fn form_param(&self, name: &str) -> Option<String> {
        if !self.has_content_type(FORM_URLENCODED) {
            return None;
        }
        let body = std::str::from_utf8(&self.body).ok()?;
        parse_urlencoded(body)
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

/// Splits an `application/x-www-form-urlencoded` string into pairs.
///
/// Pairs that fail to decode are skipped; a key without `=` maps to an empty
/// value.
pub fn parse_urlencoded(input: &str) -> Vec<(String, String)> {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = urlencoding::decode(&key.replace('+', " ")).ok()?.into_owned();
            let value = urlencoding::decode(&value.replace('+', " ")).ok()?.into_owned();
            Some((key, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_parsed_from_uri() {
        let request = AuthRequest::new(Method::GET, "/users?access_token=abc%20def&flag");
        assert_eq!(request.query_param("access_token"), Some("abc def"));
        assert_eq!(request.query_param("flag"), Some(""));
        assert_eq!(request.query_param("missing"), None);
    }

    #[test]
    fn test_form_requires_content_type() {
        let request = AuthRequest::new(Method::POST, "/token").with_body("access_token=xyz");
        assert_eq!(request.form_param("access_token"), None);

        let request = request
            .with_header("Content-Type", "application/x-www-form-urlencoded; charset=UTF-8")
            .unwrap();
        assert_eq!(request.form_param("access_token").as_deref(), Some("xyz"));
    }

    #[test]
    fn test_carries_body() {
        assert!(!AuthRequest::new(Method::GET, "/").carries_body());
        assert!(!AuthRequest::new(Method::HEAD, "/").carries_body());
        assert!(!AuthRequest::new(Method::OPTIONS, "/").carries_body());
        assert!(AuthRequest::new(Method::POST, "/").carries_body());
        assert!(AuthRequest::new(Method::DELETE, "/").carries_body());
    }

    #[test]
    fn test_invalid_header_rejected() {
        let result = AuthRequest::new(Method::GET, "/").with_header("bad header", "x");
        assert!(matches!(result, Err(AuthnError::InvalidArgument(_))));
    }

    #[test]
    fn test_route_match() {
        let route = RouteMatch::new("Foo\\Bar\\Controller")
            .with_action("foo")
            .with_param("id", "7");
        assert_eq!(route.controller(), Some("Foo\\Bar\\Controller"));
        assert_eq!(route.action(), Some("foo"));
        assert_eq!(route.param("id"), Some("7"));
        assert_eq!(RouteMatch::anonymous().controller(), None);
    }

    #[test]
    fn test_normalize_action() {
        assert_eq!(normalize_action("Foo"), "foo");
        assert_eq!(normalize_action("fooBar"), "fooBar");
        assert_eq!(normalize_action("Émile"), "émile");
        assert_eq!(normalize_action(""), "");
    }
}

//! HTTP Basic and Digest authentication.

use axum::http::{header, HeaderValue, StatusCode};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::digest::{self, DigestCredentials, NonceIssuer};
use super::{AuthOutcome, AuthenticationAdapter};
use crate::context::{AuthContext, AuthResponse, AuthenticationResult};
use crate::credentials::{authorization_header, AuthorizationHeader};
use crate::error::{AuthnError, Result};
use crate::identity::{AuthenticatedIdentity, Identity};
use crate::request::AuthRequest;
use crate::store::{BasicResolver, DigestResolver};

/// Default lifetime of a Digest nonce bucket, in seconds.
pub const DEFAULT_NONCE_TIMEOUT: i64 = 3600;

const INVALID_CREDENTIALS: &str = "Invalid or absent credentials; challenging client";

/// The HTTP authentication schemes this adapter speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpScheme {
    Basic,
    Digest,
}

impl HttpScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpScheme::Basic => "basic",
            HttpScheme::Digest => "digest",
        }
    }

    /// Parses a lowercased scheme token.
    pub fn parse(scheme: &str) -> Option<Self> {
        match scheme {
            "basic" => Some(HttpScheme::Basic),
            "digest" => Some(HttpScheme::Digest),
            _ => None,
        }
    }
}

impl fmt::Display for HttpScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Basic/Digest adapter backed by pluggable credential resolvers.
///
/// Without a name the adapter provides `basic` and/or `digest`. With a name
/// such as `api`, it provides `api-basic` and/or `api-digest`, which lets
/// several HTTP adapters with different realms coexist and be targeted by
/// the per-route type map.
pub struct HttpAdapter {
    name: Option<String>,
    realm: String,
    schemes: Vec<HttpScheme>,
    basic: Option<Arc<dyn BasicResolver>>,
    digest: Option<Arc<dyn DigestResolver>>,
    digest_domains: String,
    nonces: NonceIssuer,
}

impl fmt::Debug for HttpAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpAdapter")
            .field("name", &self.name)
            .field("realm", &self.realm)
            .field("schemes", &self.schemes)
            .finish_non_exhaustive()
    }
}

impl HttpAdapter {
    pub fn builder(realm: impl Into<String>) -> HttpAdapterBuilder {
        HttpAdapterBuilder {
            name: None,
            realm: realm.into(),
            schemes: Vec::new(),
            basic: None,
            digest: None,
            digest_domains: "/".to_string(),
            nonce_secret: None,
            nonce_timeout: DEFAULT_NONCE_TIMEOUT,
        }
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn schemes(&self) -> &[HttpScheme] {
        &self.schemes
    }

    /// Nonce a client must echo in its Digest response.
    pub fn issue_nonce(&self) -> String {
        self.nonces.issue()
    }

    pub fn opaque(&self) -> String {
        self.nonces.opaque()
    }

    fn type_name(&self, scheme: HttpScheme) -> String {
        match &self.name {
            Some(name) => format!("{name}-{scheme}"),
            None => scheme.as_str().to_string(),
        }
    }

    fn accepted_scheme(&self, request: &AuthRequest) -> Option<(HttpScheme, String)> {
        match authorization_header(request) {
            AuthorizationHeader::Scheme {
                scheme,
                credentials,
            } => HttpScheme::parse(&scheme)
                .filter(|scheme| self.schemes.contains(scheme))
                .map(|scheme| (scheme, credentials.to_string())),
            _ => None,
        }
    }

    /// Writes a 401 with one `WWW-Authenticate` header per accepted scheme.
    fn challenge(&self, response: &mut AuthResponse) -> Result<()> {
        response.set_status(StatusCode::UNAUTHORIZED, "Unauthorized");
        for scheme in &self.schemes {
            let value = match scheme {
                HttpScheme::Basic => format!("Basic realm=\"{}\"", self.realm),
                HttpScheme::Digest => format!(
                    "Digest realm=\"{}\", domain=\"{}\", qop=\"auth\", algorithm={}, nonce=\"{}\", opaque=\"{}\"",
                    self.realm,
                    self.digest_domains,
                    digest::ALGORITHM,
                    self.nonces.issue(),
                    self.nonces.opaque()
                ),
            };
            let value = HeaderValue::from_str(&value)
                .map_err(|e| AuthnError::Configuration(format!("invalid challenge header: {e}")))?;
            response.append_header(header::WWW_AUTHENTICATE, value);
        }
        Ok(())
    }

    fn verify_basic(&self, credentials: &str) -> Option<String> {
        let resolver = self.basic.as_ref()?;
        let decoded = BASE64.decode(credentials).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;
        if username.is_empty() {
            return None;
        }
        resolver
            .verify(username, password)
            .then(|| username.to_string())
    }

    fn verify_digest(&self, request: &AuthRequest, credentials: &str) -> Option<String> {
        let resolver = self.digest.as_ref()?;
        let credentials = DigestCredentials::parse(credentials)?;

        if credentials.realm != self.realm {
            debug!("Digest realm mismatch: {}", credentials.realm);
            return None;
        }
        if credentials.uri != request.uri() {
            debug!("Digest uri mismatch: {} != {}", credentials.uri, request.uri());
            return None;
        }
        if !self.nonces.verify(&credentials.nonce) {
            debug!("Digest nonce is stale or forged");
            return None;
        }
        if let Some(opaque) = &credentials.opaque {
            if !digest::constant_time_eq(opaque, &self.nonces.opaque()) {
                return None;
            }
        }

        let ha1 = resolver.ha1(&credentials.username, &self.realm)?;
        let expected = digest::expected_response(&credentials, request.method().as_str(), &ha1)?;
        digest::constant_time_eq(&expected, &credentials.response.to_ascii_lowercase())
            .then_some(credentials.username)
    }
}

impl AuthenticationAdapter for HttpAdapter {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn provides(&self) -> Vec<String> {
        self.schemes
            .iter()
            .map(|scheme| self.type_name(*scheme))
            .collect()
    }

    fn type_from_request(&self, request: &AuthRequest) -> Option<String> {
        self.accepted_scheme(request)
            .map(|(scheme, _)| self.type_name(scheme))
    }

    fn pre_auth(
        &self,
        _request: &AuthRequest,
        response: &mut AuthResponse,
    ) -> Result<Option<AuthResponse>> {
        self.challenge(response)?;
        Ok(None)
    }

    fn authenticate(
        &self,
        request: &AuthRequest,
        context: &mut AuthContext,
    ) -> Result<AuthOutcome> {
        let verified = self
            .accepted_scheme(request)
            .and_then(|(scheme, credentials)| {
                let username = match scheme {
                    HttpScheme::Basic => self.verify_basic(&credentials),
                    HttpScheme::Digest => self.verify_digest(request, &credentials),
                };
                username.map(|username| (scheme, username))
            });

        let Some((scheme, username)) = verified else {
            warn!(realm = %self.realm, "HTTP authentication failed");
            context.set_authentication_result(AuthenticationResult::failure(INVALID_CREDENTIALS));
            self.challenge(context.response_mut())?;
            return Ok(AuthOutcome::Failed);
        };

        info!(user = %username, scheme = %scheme, realm = %self.realm, "HTTP authentication succeeded");
        context.set_authentication_result(AuthenticationResult::success(username.clone()));
        let identity = AuthenticatedIdentity::new(json!({
            "username": username,
            "realm": self.realm,
            "scheme": scheme.as_str(),
        }))
        .with_name(username);
        Ok(AuthOutcome::Identity(Identity::authenticated(identity)))
    }
}

/// Builder for [`HttpAdapter`]; validation happens in [`HttpAdapterBuilder::build`].
pub struct HttpAdapterBuilder {
    name: Option<String>,
    realm: String,
    schemes: Vec<HttpScheme>,
    basic: Option<Arc<dyn BasicResolver>>,
    digest: Option<Arc<dyn DigestResolver>>,
    digest_domains: String,
    nonce_secret: Option<String>,
    nonce_timeout: i64,
}

impl HttpAdapterBuilder {
    /// Prefix for the provided type names.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn basic(mut self, resolver: Arc<dyn BasicResolver>) -> Self {
        if !self.schemes.contains(&HttpScheme::Basic) {
            self.schemes.push(HttpScheme::Basic);
        }
        self.basic = Some(resolver);
        self
    }

    pub fn digest(mut self, resolver: Arc<dyn DigestResolver>) -> Self {
        if !self.schemes.contains(&HttpScheme::Digest) {
            self.schemes.push(HttpScheme::Digest);
        }
        self.digest = Some(resolver);
        self
    }

    /// Space-separated URIs advertised in the Digest `domain` parameter.
    pub fn digest_domains(mut self, domains: impl Into<String>) -> Self {
        self.digest_domains = domains.into();
        self
    }

    pub fn nonce(mut self, secret: impl Into<String>, timeout_seconds: i64) -> Self {
        self.nonce_secret = Some(secret.into());
        self.nonce_timeout = timeout_seconds;
        self
    }

    pub fn build(self) -> Result<HttpAdapter> {
        if self.schemes.is_empty() {
            return Err(AuthnError::Configuration(
                "HTTP adapter needs a basic or digest credential store".to_string(),
            ));
        }
        if self.realm.is_empty() || self.realm.contains('"') {
            return Err(AuthnError::Configuration(format!(
                "HTTP adapter realm {:?} is empty or contains a quote",
                self.realm
            )));
        }
        HeaderValue::from_str(&self.realm)
            .map_err(|e| AuthnError::Configuration(format!("invalid realm: {e}")))?;
        if self.nonce_timeout <= 0 {
            return Err(AuthnError::Configuration(
                "nonce timeout must be positive".to_string(),
            ));
        }

        let secret = self
            .nonce_secret
            .unwrap_or_else(|| hex::encode(rand::random::<[u8; 32]>()));

        Ok(HttpAdapter {
            nonces: NonceIssuer::new(self.realm.clone(), secret, self.nonce_timeout),
            name: self.name,
            realm: self.realm,
            schemes: self.schemes,
            basic: self.basic,
            digest: self.digest,
            digest_domains: self.digest_domains,
        })
    }
}

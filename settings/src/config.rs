//! Configuration document.
//!
//! ```yaml
//! authentication:
//!   adapters:
//!     api:
//!       adapter: http
//!       accept_schemes: [basic]
//!       realm: api
//!       basic_users:
//!         alice: "$argon2id$v=19$..."
//!     tokens:
//!       adapter: oauth2
//!       tokens:
//!         - access_token: abc
//!           user_id: carol
//!   map:
//!     Status\Controller: oauth2
//! authorization:
//!   deny_by_default: true
//!   rest_controllers:
//!     Users\Controller: user_id
//!   rules:
//!     Users\Controller:
//!       collection: { GET: true }
//! routes:
//!   - path: /users
//!     controller: Users\Controller
//! ```

use authz::ControllerRules;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::error::{Result, SettingsError};

/// Realm used by HTTP and OAuth2 adapters that do not name one.
pub const DEFAULT_REALM: &str = "api";

/// Default Digest nonce lifetime, in seconds.
pub const DEFAULT_NONCE_TIMEOUT: i64 = 3600;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortcullisConfig {
    #[serde(default)]
    pub authentication: AuthenticationConfig,
    #[serde(default)]
    pub authorization: AuthorizationConfig,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationConfig {
    /// Adapters by name, attached in document order.
    #[serde(default)]
    pub adapters: IndexMap<String, AdapterConfig>,
    /// Controller to required authentication type.
    #[serde(default)]
    pub map: BTreeMap<String, String>,
    /// Types that exist without a local adapter.
    #[serde(default)]
    pub types: Vec<String>,
}

/// One adapter, selected by its `adapter` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "adapter", rename_all = "lowercase")]
pub enum AdapterConfig {
    Http(HttpAdapterConfig),
    #[serde(rename = "oauth2")]
    OAuth2(OAuth2AdapterConfig),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpAdapterConfig {
    /// `basic` and/or `digest`.
    pub accept_schemes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
    /// Prefix for the provided types (`<name>-basic`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest_domains: Option<String>,
    #[serde(default = "default_nonce_timeout")]
    pub nonce_timeout: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce_secret: Option<String>,
    /// Username to argon2 PHC hash.
    #[serde(default)]
    pub basic_users: BTreeMap<String, String>,
    /// Username to hex SHA-256 of `username:realm:password`.
    #[serde(default)]
    pub digest_users: BTreeMap<String, String>,
}

fn default_nonce_timeout() -> i64 {
    DEFAULT_NONCE_TIMEOUT
}

impl HttpAdapterConfig {
    pub fn accepts(&self, scheme: &str) -> bool {
        self.accept_schemes
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(scheme))
    }

    pub fn realm(&self) -> &str {
        self.realm.as_deref().unwrap_or(DEFAULT_REALM)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuth2AdapterConfig {
    /// Provided type; `oauth2` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
}

impl OAuth2AdapterConfig {
    pub fn realm(&self) -> &str {
        self.realm.as_deref().unwrap_or(DEFAULT_REALM)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationConfig {
    #[serde(default)]
    pub deny_by_default: bool,
    /// REST controller to identifier parameter name.
    #[serde(default)]
    pub rest_controllers: BTreeMap<String, String>,
    #[serde(default)]
    pub rules: BTreeMap<String, ControllerRules>,
}

/// A route served by the development server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// axum path, e.g. `/users/:user_id`.
    pub path: String,
    pub controller: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl PortcullisConfig {
    /// Parses and validates a YAML document.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&content)?;
        info!(
            path = %path.display(),
            adapters = config.authentication.adapters.len(),
            controllers = config.authorization.rules.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Structural checks that need no component construction.
    pub fn validate(&self) -> Result<()> {
        for (name, adapter) in &self.authentication.adapters {
            if name.is_empty() {
                return Err(SettingsError::Validation(
                    "adapter names cannot be empty".to_string(),
                ));
            }
            match adapter {
                AdapterConfig::Http(http) => validate_http(name, http)?,
                AdapterConfig::OAuth2(oauth2) => validate_oauth2(name, oauth2)?,
            }
        }

        for (controller, auth_type) in &self.authentication.map {
            if auth_type.trim().is_empty() {
                return Err(SettingsError::Validation(format!(
                    "authentication map entry for {controller} names no type"
                )));
            }
        }

        for (controller, identifier) in &self.authorization.rest_controllers {
            if identifier.is_empty() {
                return Err(SettingsError::Validation(format!(
                    "REST controller {controller} has an empty identifier name"
                )));
            }
        }

        let mut paths = std::collections::HashSet::new();
        for route in &self.routes {
            if !paths.insert(route.path.as_str()) {
                return Err(SettingsError::Validation(format!(
                    "route path {} is configured twice",
                    route.path
                )));
            }
            if !route.path.starts_with('/') {
                return Err(SettingsError::Validation(format!(
                    "route path {:?} must start with '/'",
                    route.path
                )));
            }
            if route.controller.is_empty() {
                return Err(SettingsError::Validation(format!(
                    "route {} has no controller",
                    route.path
                )));
            }
        }
        Ok(())
    }
}

fn validate_http(name: &str, http: &HttpAdapterConfig) -> Result<()> {
    if http.accept_schemes.is_empty() {
        return Err(SettingsError::Validation(format!(
            "HTTP adapter {name} accepts no schemes"
        )));
    }
    for scheme in &http.accept_schemes {
        if !scheme.eq_ignore_ascii_case("basic") && !scheme.eq_ignore_ascii_case("digest") {
            return Err(SettingsError::Validation(format!(
                "HTTP adapter {name} accepts unknown scheme {scheme:?}"
            )));
        }
    }
    if http.accepts("basic") && http.basic_users.is_empty() {
        return Err(SettingsError::Validation(format!(
            "HTTP adapter {name} accepts basic but has no basic_users"
        )));
    }
    if http.accepts("digest") {
        if http.realm.is_none() {
            return Err(SettingsError::Validation(format!(
                "HTTP adapter {name} accepts digest but has no realm"
            )));
        }
        if http.digest_users.is_empty() {
            return Err(SettingsError::Validation(format!(
                "HTTP adapter {name} accepts digest but has no digest_users"
            )));
        }
    }
    if http.nonce_timeout <= 0 {
        return Err(SettingsError::Validation(format!(
            "HTTP adapter {name} has a non-positive nonce_timeout"
        )));
    }
    Ok(())
}

fn validate_oauth2(name: &str, oauth2: &OAuth2AdapterConfig) -> Result<()> {
    if oauth2.name.as_deref().is_some_and(str::is_empty) {
        return Err(SettingsError::Validation(format!(
            "OAuth2 adapter {name} has an empty name"
        )));
    }
    if let Some(token) = oauth2.tokens.iter().find(|token| token.access_token.is_empty()) {
        return Err(SettingsError::Validation(format!(
            "OAuth2 adapter {name} has a token with an empty access_token (user {:?})",
            token.user_id
        )));
    }
    Ok(())
}

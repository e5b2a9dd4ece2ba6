//! One-shot construction of the authentication and authorization stages.

use authn::adapter::{HttpAdapter, OAuth2Adapter, SharedAdapter, StaticTokenServer, TokenData};
use authn::store::{BasicUserStore, DigestUserStore};
use authn::AuthenticationListener;
use authz::{builder, AclAuthorization, AuthorizationListener, ResourceResolver};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{AdapterConfig, HttpAdapterConfig, OAuth2AdapterConfig, PortcullisConfig, RouteConfig};
use crate::error::{Result, SettingsError};

/// Everything a request pipeline needs, built from one configuration.
#[derive(Debug, Clone)]
pub struct Components {
    pub authentication: Arc<AuthenticationListener>,
    pub authorization: Arc<AuthorizationListener>,
    pub acl: Arc<AclAuthorization>,
    pub routes: Vec<RouteConfig>,
}

impl PortcullisConfig {
    /// Validates the configuration and constructs every component.
    pub fn build(&self) -> Result<Components> {
        self.validate()?;

        let authentication = self.build_authentication()?;

        let acl = Arc::new(builder::build(
            &self.authorization.rules,
            self.authorization.deny_by_default,
        )?);
        let mut resolver = ResourceResolver::new();
        for (controller, identifier) in &self.authorization.rest_controllers {
            resolver.add_rest_controller(controller, identifier.clone());
        }
        let authorization = AuthorizationListener::new(resolver, acl.clone());

        info!(
            adapters = authentication.adapters().len(),
            routes = self.routes.len(),
            deny_by_default = self.authorization.deny_by_default,
            "Built authentication and authorization components"
        );

        Ok(Components {
            authentication: Arc::new(authentication),
            authorization: Arc::new(authorization),
            acl,
            routes: self.routes.clone(),
        })
    }

    /// Builds only the authentication listener.
    pub fn build_authentication(&self) -> Result<AuthenticationListener> {
        let mut listener = AuthenticationListener::new();
        for (name, adapter) in &self.authentication.adapters {
            let shared: SharedAdapter = match adapter {
                AdapterConfig::Http(http) => Arc::new(build_http(name, http)?),
                AdapterConfig::OAuth2(oauth2) => Arc::new(build_oauth2(oauth2)),
            };
            listener.attach(shared);
        }
        listener.add_authentication_types(self.authentication.types.iter().cloned());

        for (controller, auth_type) in &self.authentication.map {
            if !listener.knows_type(auth_type) {
                warn!(
                    controller = %controller,
                    auth_type = %auth_type,
                    "Mapped authentication type is not provided; requests will be guests"
                );
            }
            listener.map_controller(controller, auth_type.clone());
        }
        Ok(listener)
    }
}

fn build_http(name: &str, config: &HttpAdapterConfig) -> Result<HttpAdapter> {
    let service = format!("adapter \"{name}\"");
    let mut builder = HttpAdapter::builder(config.realm());

    if let Some(prefix) = &config.name {
        builder = builder.name(prefix.clone());
    }
    if config.accepts("basic") {
        let mut store = BasicUserStore::new();
        for (user, hash) in &config.basic_users {
            store
                .insert_hash(user.clone(), hash.clone())
                .map_err(|e| SettingsError::construction(service.clone(), e))?;
        }
        builder = builder.basic(Arc::new(store));
    }
    if config.accepts("digest") {
        let mut store = DigestUserStore::new(config.realm());
        for (user, ha1) in &config.digest_users {
            store
                .insert_ha1(user.clone(), ha1.clone())
                .map_err(|e| SettingsError::construction(service.clone(), e))?;
        }
        builder = builder.digest(Arc::new(store));
    }
    if let Some(domains) = &config.digest_domains {
        builder = builder.digest_domains(domains.clone());
    }
    if let Some(secret) = &config.nonce_secret {
        builder = builder.nonce(secret.clone(), config.nonce_timeout);
    }

    builder
        .build()
        .map_err(|e| SettingsError::construction(service, e))
}

fn build_oauth2(config: &OAuth2AdapterConfig) -> OAuth2Adapter {
    let mut server = StaticTokenServer::new();
    for token in &config.tokens {
        server.insert(
            token.access_token.clone(),
            TokenData {
                user_id: token.user_id.clone(),
                client_id: token.client_id.clone(),
                scope: token.scope.clone(),
                expires: token.expires_at,
            },
        );
    }
    let adapter = OAuth2Adapter::new(config.realm(), Arc::new(server));
    match &config.name {
        Some(name) => adapter.with_name(name.clone()),
        None => adapter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authn::store::{digest_ha1, hash_password};
    use authn::{AuthContext, AuthRequest, RouteMatch};
    use axum::http::Method;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

    fn config_yaml() -> String {
        let hash = hash_password("wonderland").unwrap();
        let ha1 = digest_ha1("alice", "api", "wonderland");
        format!(
            r#"
authentication:
  adapters:
    api:
      adapter: http
      accept_schemes: [basic, digest]
      realm: api
      nonce_timeout: 600
      nonce_secret: s3cret
      basic_users:
        alice: "{hash}"
      digest_users:
        alice: "{ha1}"
    bearer:
      adapter: oauth2
      tokens:
        - access_token: abc
          user_id: carol
  map:
    Reports\Controller: ldap
  types: [ldap]
authorization:
  deny_by_default: true
  rest_controllers:
    Users\Controller: user_id
  rules:
    Users-Controller:
      collection: {{ GET: true }}
"#
        )
    }

    #[test]
    fn test_build_components() {
        let config = PortcullisConfig::from_yaml(&config_yaml()).unwrap();
        let components = config.build().unwrap();

        assert_eq!(
            components.authentication.authentication_types(),
            vec!["basic", "digest", "oauth2", "ldap"]
        );
        assert!(components
            .acl
            .has_resource("Users\\Controller::collection")
            .unwrap());
    }

    #[test]
    fn test_built_pipeline_stages() {
        let components = PortcullisConfig::from_yaml(&config_yaml())
            .unwrap()
            .build()
            .unwrap();
        let credentials = BASE64.encode("alice:wonderland");
        let request = AuthRequest::new(Method::POST, "/users")
            .with_header("Authorization", &format!("Basic {credentials}"))
            .unwrap()
            .with_route(RouteMatch::new("Users\\Controller"));

        let mut context = AuthContext::new();
        components
            .authentication
            .authenticate(&request, &mut context)
            .unwrap();
        assert_eq!(context.identity().role_id(), "alice");

        components.authorization.resolve(&request, &mut context);
        assert_eq!(context.resource(), Some("Users\\Controller::collection"));
        assert!(components
            .authorization
            .authorize(&request, &mut context)
            .unwrap());
    }

    #[test]
    fn test_malformed_hash_is_construction_error() {
        let yaml = r#"
authentication:
  adapters:
    api:
      adapter: http
      accept_schemes: [basic]
      basic_users:
        alice: plaintext
"#;
        let config = PortcullisConfig::from_yaml(yaml).unwrap();
        let err = config.build().unwrap_err();
        assert!(matches!(err, SettingsError::ServiceConstruction { ref service, .. } if service == "adapter \"api\""));
    }

    #[test]
    fn test_malformed_ha1_is_construction_error() {
        let yaml = r#"
authentication:
  adapters:
    api:
      adapter: http
      accept_schemes: [digest]
      realm: api
      digest_users:
        alice: not-hex
"#;
        let config = PortcullisConfig::from_yaml(yaml).unwrap();
        assert!(matches!(
            config.build(),
            Err(SettingsError::ServiceConstruction { .. })
        ));
    }

    #[test]
    fn test_bad_rule_key_is_construction_error() {
        let yaml = "authorization:\n  rules:\n    Users:\n      collection: { \"GE T\": true }\n";
        let config = PortcullisConfig::from_yaml(yaml).unwrap();
        let err = config.build().unwrap_err();
        assert!(matches!(err, SettingsError::ServiceConstruction { ref service, .. } if service == "authorization"));
    }

    #[test]
    fn test_unmapped_type_still_builds() {
        let yaml = "authentication:\n  map:\n    Users: oauth2\n";
        let listener = PortcullisConfig::from_yaml(yaml)
            .unwrap()
            .build_authentication()
            .unwrap();
        assert_eq!(listener.mapped_type("Users"), Some("oauth2"));
    }

    #[test]
    fn test_map_keys_accept_dash_form() {
        let yaml = "authentication:\n  map:\n    Users-Controller: oauth2\n";
        let listener = PortcullisConfig::from_yaml(yaml)
            .unwrap()
            .build_authentication()
            .unwrap();
        assert_eq!(listener.mapped_type("Users\\Controller"), Some("oauth2"));
    }
}

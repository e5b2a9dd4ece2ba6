//! Maps a matched route to the resource name the ACL knows it by.

use authn::request::{normalize_action, normalize_controller};
use authn::AuthRequest;
use std::collections::HashMap;
use tracing::debug;

/// Resolves `<controller>::<action>` for RPC routes and
/// `<controller>::collection` / `<controller>::entity` for REST controllers.
#[derive(Debug, Clone, Default)]
pub struct ResourceResolver {
    rest_controllers: HashMap<String, String>,
}

impl ResourceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treats `controller` as REST, with the identifier taken from the route
    /// or query parameter `identifier`.
    pub fn add_rest_controller(&mut self, controller: &str, identifier: impl Into<String>) {
        self.rest_controllers
            .insert(normalize_controller(controller), identifier.into());
    }

    pub fn with_rest_controller(mut self, controller: &str, identifier: impl Into<String>) -> Self {
        self.add_rest_controller(controller, identifier);
        self
    }

    /// The resource for `request`, or `None` when the route names no
    /// controller, or names an RPC controller without an action.
    pub fn resolve(&self, request: &AuthRequest) -> Option<String> {
        let route = request.route()?;
        let controller = normalize_controller(route.controller()?);

        if let Some(identifier) = self.rest_controllers.get(&controller) {
            let present = route
                .param(identifier)
                .or_else(|| request.query_param(identifier))
                .is_some_and(|value| !value.is_empty());
            let kind = if present { "entity" } else { "collection" };
            return Some(format!("{controller}::{kind}"));
        }

        let Some(action) = route.action() else {
            debug!(controller = %controller, "Route has no action; no resource");
            return None;
        };
        Some(format!("{controller}::{}", normalize_action(action)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authn::RouteMatch;
    use axum::http::Method;

    fn routed(uri: &str, route: RouteMatch) -> AuthRequest {
        AuthRequest::new(Method::GET, uri).with_route(route)
    }

    #[test]
    fn test_rpc_resource() {
        let resolver = ResourceResolver::new();
        let request = routed("/foo", RouteMatch::new("Foo\\Bar\\Controller").with_action("foo"));
        assert_eq!(resolver.resolve(&request).as_deref(), Some("Foo\\Bar\\Controller::foo"));
    }

    #[test]
    fn test_rpc_action_matches_configured_rule_name() {
        let resolver = ResourceResolver::new();
        let request = routed("/foo", RouteMatch::new("Foo-Bar-Controller").with_action("Foo"));
        assert_eq!(resolver.resolve(&request).as_deref(), Some("Foo\\Bar\\Controller::foo"));
    }

    #[test]
    fn test_rest_collection_and_entity() {
        let resolver = ResourceResolver::new().with_rest_controller("Users\\Controller", "user_id");

        let collection = routed("/users", RouteMatch::new("Users\\Controller"));
        assert_eq!(
            resolver.resolve(&collection).as_deref(),
            Some("Users\\Controller::collection")
        );

        let entity = routed(
            "/users/7",
            RouteMatch::new("Users\\Controller").with_param("user_id", "7"),
        );
        assert_eq!(resolver.resolve(&entity).as_deref(), Some("Users\\Controller::entity"));

        let by_query = routed("/users?user_id=0", RouteMatch::new("Users\\Controller"));
        assert_eq!(resolver.resolve(&by_query).as_deref(), Some("Users\\Controller::entity"));

        let empty = routed(
            "/users?user_id=",
            RouteMatch::new("Users\\Controller").with_param("user_id", ""),
        );
        assert_eq!(
            resolver.resolve(&empty).as_deref(),
            Some("Users\\Controller::collection")
        );
    }

    #[test]
    fn test_rest_controller_names_normalized() {
        let resolver = ResourceResolver::new().with_rest_controller("Users-Controller", "id");
        let request = routed("/users", RouteMatch::new("Users\\Controller").with_action("ignored"));
        assert_eq!(
            resolver.resolve(&request).as_deref(),
            Some("Users\\Controller::collection")
        );
    }

    #[test]
    fn test_no_resource() {
        let resolver = ResourceResolver::new();
        assert_eq!(resolver.resolve(&AuthRequest::new(Method::GET, "/")), None);
        assert_eq!(resolver.resolve(&routed("/", RouteMatch::anonymous())), None);
        assert_eq!(resolver.resolve(&routed("/", RouteMatch::new("Foo"))), None);
    }
}

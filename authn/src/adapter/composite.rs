//! Grouping of adapters behind a single adapter.

use tracing::debug;

use super::{same_adapter, AuthOutcome, AuthenticationAdapter, SharedAdapter};
use crate::context::{AuthContext, AuthResponse};
use crate::error::Result;
use crate::request::AuthRequest;

/// What to remove from a [`CompositeAdapter`].
#[derive(Debug, Clone, Copy)]
pub enum AdapterRef<'a> {
    /// Drops the adapter and re-indexes the remaining ones.
    Instance(&'a SharedAdapter),
    /// Drops one type entry from the index; the adapter stays attached.
    Type(&'a str),
}

/// A set of child adapters with a type to adapter index.
///
/// When two children provide the same type the one added last owns it.
/// Removing that child hands the type back to the earlier one.
#[derive(Debug, Default)]
pub struct CompositeAdapter {
    name: Option<String>,
    adapters: Vec<SharedAdapter>,
    index: Vec<(String, SharedAdapter)>,
}

impl CompositeAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A composite addressable by `name` in the per-route type map.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Adds `adapter` unless this exact instance is already a child.
    /// Returns whether it was added.
    pub fn add_adapter(&mut self, adapter: SharedAdapter) -> bool {
        if self.adapters.iter().any(|existing| same_adapter(existing, &adapter)) {
            debug!("Adapter {:?} already attached", adapter.name());
            return false;
        }
        self.index_adapter(&adapter);
        self.adapters.push(adapter);
        true
    }

    /// Returns whether anything was removed.
    pub fn remove_adapter(&mut self, target: AdapterRef<'_>) -> bool {
        match target {
            AdapterRef::Type(auth_type) => {
                let before = self.index.len();
                self.index.retain(|(provided, _)| provided != auth_type);
                before != self.index.len()
            }
            AdapterRef::Instance(adapter) => {
                let before = self.adapters.len();
                self.adapters.retain(|existing| !same_adapter(existing, adapter));
                if before == self.adapters.len() {
                    return false;
                }
                self.index.clear();
                let remaining = self.adapters.clone();
                for adapter in &remaining {
                    self.index_adapter(adapter);
                }
                true
            }
        }
    }

    /// The adapter that owns `auth_type`.
    pub fn adapter_for(&self, auth_type: &str) -> Option<&SharedAdapter> {
        self.index
            .iter()
            .find(|(provided, _)| provided == auth_type)
            .map(|(_, adapter)| adapter)
    }

    /// Attached children in attachment order.
    pub fn adapters(&self) -> &[SharedAdapter] {
        &self.adapters
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    fn index_adapter(&mut self, adapter: &SharedAdapter) {
        for provided in adapter.provides() {
            match self.index.iter_mut().find(|(existing, _)| *existing == provided) {
                Some(entry) => entry.1 = adapter.clone(),
                None => self.index.push((provided, adapter.clone())),
            }
        }
    }

    /// Index owners in index order, each listed once.
    fn owners(&self) -> Vec<&SharedAdapter> {
        let mut owners: Vec<&SharedAdapter> = Vec::new();
        for (_, adapter) in &self.index {
            if !owners.iter().any(|seen| same_adapter(seen, adapter)) {
                owners.push(adapter);
            }
        }
        owners
    }
}

impl AuthenticationAdapter for CompositeAdapter {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn provides(&self) -> Vec<String> {
        self.index.iter().map(|(provided, _)| provided.clone()).collect()
    }

    fn matches(&self, auth_type: &str) -> bool {
        self.name.as_deref() == Some(auth_type) || self.adapter_for(auth_type).is_some()
    }

    fn type_from_request(&self, request: &AuthRequest) -> Option<String> {
        self.index.iter().find_map(|(_, owner)| {
            let detected = owner.type_from_request(request)?;
            self.adapter_for(&detected)
                .is_some_and(|indexed| same_adapter(indexed, owner))
                .then_some(detected)
        })
    }

    fn pre_auth(
        &self,
        request: &AuthRequest,
        response: &mut AuthResponse,
    ) -> Result<Option<AuthResponse>> {
        for adapter in self.owners() {
            if let Some(terminal) = adapter.pre_auth(request, response)? {
                return Ok(Some(terminal));
            }
        }
        Ok(None)
    }

    fn authenticate(
        &self,
        request: &AuthRequest,
        context: &mut AuthContext,
    ) -> Result<AuthOutcome> {
        let Some(auth_type) = self.type_from_request(request) else {
            return Ok(AuthOutcome::Failed);
        };
        match self.adapter_for(&auth_type) {
            Some(adapter) => adapter.authenticate(request, context),
            None => Ok(AuthOutcome::Failed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{AuthenticatedIdentity, Identity};
    use axum::http::{header, HeaderValue, Method, StatusCode};
    use serde_json::json;
    use std::sync::Arc;

    /// Claims the request when its `X-Auth-Type` header names a provided type.
    #[derive(Debug)]
    struct Fake {
        label: &'static str,
        types: Vec<&'static str>,
        terminal_pre_auth: bool,
    }

    impl Fake {
        fn shared(label: &'static str, types: &[&'static str]) -> SharedAdapter {
            Arc::new(Fake {
                label,
                types: types.to_vec(),
                terminal_pre_auth: false,
            })
        }
    }

    impl AuthenticationAdapter for Fake {
        fn provides(&self) -> Vec<String> {
            self.types.iter().map(|t| t.to_string()).collect()
        }

        fn type_from_request(&self, request: &AuthRequest) -> Option<String> {
            request
                .header("x-auth-type")
                .filter(|requested| self.matches(requested))
                .map(str::to_string)
        }

        fn pre_auth(
            &self,
            _request: &AuthRequest,
            response: &mut AuthResponse,
        ) -> Result<Option<AuthResponse>> {
            response.append_header(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(self.label),
            );
            if self.terminal_pre_auth {
                return Ok(Some(AuthResponse::with_status(StatusCode::FORBIDDEN, "Forbidden")));
            }
            Ok(None)
        }

        fn authenticate(
            &self,
            _request: &AuthRequest,
            _context: &mut AuthContext,
        ) -> Result<AuthOutcome> {
            Ok(AuthOutcome::Identity(Identity::authenticated(
                AuthenticatedIdentity::new(json!({})).with_name(self.label),
            )))
        }
    }

    fn typed(auth_type: &str) -> AuthRequest {
        AuthRequest::new(Method::GET, "/")
            .with_header("X-Auth-Type", auth_type)
            .unwrap()
    }

    fn authenticated_by(composite: &CompositeAdapter, auth_type: &str) -> String {
        let mut context = AuthContext::new();
        match composite.authenticate(&typed(auth_type), &mut context).unwrap() {
            AuthOutcome::Identity(identity) => identity.role_id().to_string(),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_add_is_idempotent() {
        let a = Fake::shared("a", &["foo", "bar"]);
        let mut composite = CompositeAdapter::new();
        assert!(composite.add_adapter(a.clone()));
        let once = composite.provides();
        assert!(!composite.add_adapter(a));
        assert_eq!(composite.provides(), once);
        assert_eq!(composite.len(), 1);

        // An equal but distinct instance is a second adapter.
        assert!(composite.add_adapter(Fake::shared("a", &["foo", "bar"])));
        assert_eq!(composite.len(), 2);
    }

    #[test]
    fn test_last_attached_wins() {
        let mut composite = CompositeAdapter::new();
        composite.add_adapter(Fake::shared("a", &["foo", "bar"]));
        composite.add_adapter(Fake::shared("b", &["bar", "baz"]));

        assert_eq!(composite.provides(), vec!["foo", "bar", "baz"]);
        assert_eq!(authenticated_by(&composite, "bar"), "b");
        assert_eq!(authenticated_by(&composite, "foo"), "a");
    }

    #[test]
    fn test_remove_instance_restores_shadowed_owner() {
        let a = Fake::shared("a", &["foo", "bar"]);
        let b = Fake::shared("b", &["bar", "baz"]);
        let mut composite = CompositeAdapter::new();
        composite.add_adapter(a);
        composite.add_adapter(b.clone());

        assert!(composite.remove_adapter(AdapterRef::Instance(&b)));
        assert_eq!(composite.provides(), vec!["foo", "bar"]);
        assert_eq!(authenticated_by(&composite, "bar"), "a");
        assert!(!composite.remove_adapter(AdapterRef::Instance(&b)));
    }

    #[test]
    fn test_remove_type_only_drops_index_entry() {
        let mut composite = CompositeAdapter::new();
        composite.add_adapter(Fake::shared("a", &["foo", "bar"]));

        assert!(composite.remove_adapter(AdapterRef::Type("bar")));
        assert!(!composite.matches("bar"));
        assert!(composite.matches("foo"));
        assert_eq!(composite.len(), 1);
        assert!(!composite.remove_adapter(AdapterRef::Type("bar")));
    }

    #[test]
    fn test_type_from_request_ignores_stale_owner() {
        let mut composite = CompositeAdapter::new();
        composite.add_adapter(Fake::shared("a", &["foo", "bar"]));
        composite.remove_adapter(AdapterRef::Type("bar"));

        // "a" still claims bar, but the index no longer routes it there.
        assert_eq!(composite.type_from_request(&typed("bar")), None);
        assert_eq!(composite.type_from_request(&typed("foo")), Some("foo".into()));

        let mut context = AuthContext::new();
        let outcome = composite.authenticate(&typed("bar"), &mut context).unwrap();
        assert_eq!(outcome, AuthOutcome::Failed);
    }

    #[test]
    fn test_named_composite_matches_its_name() {
        let mut composite = CompositeAdapter::named("partners");
        composite.add_adapter(Fake::shared("a", &["foo"]));
        assert!(composite.matches("partners"));
        assert!(composite.matches("foo"));
        assert!(!composite.matches("bar"));
    }

    #[test]
    fn test_pre_auth_short_circuits() {
        let stopper: SharedAdapter = Arc::new(Fake {
            label: "stop",
            types: vec!["foo"],
            terminal_pre_auth: true,
        });
        let mut composite = CompositeAdapter::new();
        composite.add_adapter(stopper);
        composite.add_adapter(Fake::shared("later", &["bar"]));

        let mut response = AuthResponse::new();
        let terminal = composite
            .pre_auth(&AuthRequest::new(Method::GET, "/"), &mut response)
            .unwrap();
        assert_eq!(terminal.unwrap().status(), StatusCode::FORBIDDEN);
        assert_eq!(response.headers().get_all(header::WWW_AUTHENTICATE).iter().count(), 1);
    }

    #[test]
    fn test_pre_auth_calls_each_owner_once() {
        let mut composite = CompositeAdapter::new();
        composite.add_adapter(Fake::shared("a", &["foo", "bar"]));
        composite.add_adapter(Fake::shared("b", &["baz"]));

        let mut response = AuthResponse::new();
        let terminal = composite
            .pre_auth(&AuthRequest::new(Method::GET, "/"), &mut response)
            .unwrap();
        assert!(terminal.is_none());
        assert_eq!(response.headers().get_all(header::WWW_AUTHENTICATE).iter().count(), 2);
    }
}

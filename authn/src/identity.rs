//! The subject of a request, as seen by authorization.
//!
//! Every request ends the authentication stage with exactly one [`Identity`].
//! Anonymous traffic is a [`Identity::Guest`]; anything an adapter vouched for
//! is an [`Identity::Authenticated`] carrying the adapter's claims payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role name of every guest identity.
pub const GUEST_ROLE: &str = "guest";

/// Role name given to an authenticated identity until an adapter names it.
pub const AUTHENTICATED_ROLE: &str = "authenticated";

/// An identity that an adapter has vouched for.
///
/// The role name is fixed at construction. Adapters build the identity with
/// [`AuthenticatedIdentity::new`] and name it with
/// [`AuthenticatedIdentity::with_name`] before handing it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedIdentity {
    name: String,
    payload: Value,
}

impl AuthenticatedIdentity {
    /// Wraps an adapter-defined payload (token data, user record, scalar).
    pub fn new(payload: impl Into<Value>) -> Self {
        Self {
            name: AUTHENTICATED_ROLE.to_string(),
            payload: payload.into(),
        }
    }

    /// Sets the role name, usually the username or token subject.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The adapter-defined credential payload.
    pub fn payload(&self) -> &Value {
        &self.payload
    }
}

/// The identity attached to a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identity {
    #[default]
    Guest,
    Authenticated(AuthenticatedIdentity),
}

impl Identity {
    pub fn guest() -> Self {
        Identity::Guest
    }

    pub fn authenticated(identity: AuthenticatedIdentity) -> Self {
        Identity::Authenticated(identity)
    }

    /// The role name used for ACL lookups.
    pub fn role_id(&self) -> &str {
        match self {
            Identity::Guest => GUEST_ROLE,
            Identity::Authenticated(identity) => identity.name(),
        }
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, Identity::Guest)
    }

    /// The credential payload, if this identity carries one.
    pub fn payload(&self) -> Option<&Value> {
        match self {
            Identity::Guest => None,
            Identity::Authenticated(identity) => Some(identity.payload()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_guest_role() {
        let identity = Identity::guest();
        assert!(identity.is_guest());
        assert_eq!(identity.role_id(), "guest");
        assert!(identity.payload().is_none());
    }

    #[test]
    fn test_authenticated_default_role() {
        let identity = Identity::authenticated(AuthenticatedIdentity::new(json!("opaque")));
        assert!(!identity.is_guest());
        assert_eq!(identity.role_id(), "authenticated");
    }

    #[test]
    fn test_authenticated_named_role() {
        let identity = Identity::authenticated(
            AuthenticatedIdentity::new(json!({ "user_id": "alice", "scope": "read" }))
                .with_name("alice"),
        );
        assert_eq!(identity.role_id(), "alice");
        assert_eq!(identity.payload().unwrap()["scope"], "read");
    }

    #[test]
    fn test_identity_serialization() {
        let identity = Identity::authenticated(AuthenticatedIdentity::new(json!(1)).with_name("bob"));
        let value = serde_json::to_value(&identity).unwrap();
        assert_eq!(value["kind"], "authenticated");
        assert_eq!(value["name"], "bob");

        let guest = serde_json::to_value(Identity::Guest).unwrap();
        assert_eq!(guest["kind"], "guest");
    }
}

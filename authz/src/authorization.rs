//! Thread-safe authorization decisions over an [`Acl`].

use authn::Identity;
use std::fmt::Debug;
use std::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, warn};

use crate::acl::{Acl, RuleEntry};
use crate::error::{AuthzError, Result};

/// Decision contract consumed by the authorization stage.
pub trait Authorization: Send + Sync + Debug {
    /// Whether `identity` may exercise `privilege` (an HTTP method) on
    /// `resource`.
    fn is_authorized(&self, identity: &Identity, resource: &str, privilege: &str) -> Result<bool>;

    /// Makes sure `resource` is known before it is queried.
    fn add_resource(&self, resource: &str) -> Result<()>;
}

/// An ACL shared between request tasks.
///
/// Roles and resources seen for the first time at request time are
/// registered on the fly, without parents, so queries never fail on an
/// unknown name. Registration takes the write lock; everything else reads.
#[derive(Debug)]
pub struct AclAuthorization {
    acl: RwLock<Acl>,
}

impl AclAuthorization {
    pub fn new(acl: Acl) -> Self {
        Self {
            acl: RwLock::new(acl),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Acl>> {
        self.acl
            .read()
            .map_err(|e| AuthzError::Internal(format!("ACL lock poisoned: {e}")))
    }

    /// A copy of the current table, for inspection.
    pub fn snapshot(&self) -> Result<Acl> {
        Ok(self.read()?.clone())
    }

    pub fn has_resource(&self, resource: &str) -> Result<bool> {
        Ok(self.read()?.has_resource(resource))
    }

    pub fn rules(&self) -> Result<Vec<RuleEntry>> {
        Ok(self.read()?.rules())
    }

    fn ensure_role(&self, role: &str) -> Result<()> {
        if self.read()?.has_role(role) {
            return Ok(());
        }
        let mut acl = self
            .acl
            .write()
            .map_err(|e| AuthzError::Internal(format!("ACL lock poisoned: {e}")))?;
        // Another request may have registered it between the two locks.
        if !acl.has_role(role) {
            debug!(role = %role, "Registering role on first use");
            acl.add_role(role, &[])?;
        }
        Ok(())
    }
}

impl Authorization for AclAuthorization {
    fn is_authorized(&self, identity: &Identity, resource: &str, privilege: &str) -> Result<bool> {
        let role = identity.role_id();
        self.ensure_role(role)?;
        self.add_resource(resource)?;

        let allowed = self
            .read()?
            .is_allowed(Some(role), Some(resource), Some(privilege))?;
        if allowed {
            debug!(role = %role, resource = %resource, method = %privilege, "Authorized");
        } else {
            warn!(role = %role, resource = %resource, method = %privilege, "Authorization denied");
        }
        Ok(allowed)
    }

    fn add_resource(&self, resource: &str) -> Result<()> {
        if self.read()?.has_resource(resource) {
            return Ok(());
        }
        let mut acl = self
            .acl
            .write()
            .map_err(|e| AuthzError::Internal(format!("ACL lock poisoned: {e}")))?;
        if !acl.has_resource(resource) {
            debug!(resource = %resource, "Registering resource on first use");
            acl.add_resource(resource, None)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authn::AuthenticatedIdentity;
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;

    fn open_acl() -> AclAuthorization {
        let mut acl = Acl::new();
        acl.add_role("guest", &[]).unwrap();
        acl.allow(None, None, &[]).unwrap();
        acl.add_resource("Users::collection", None).unwrap();
        acl.deny(Some("guest"), Some("Users::collection"), &["POST"]).unwrap();
        AclAuthorization::new(acl)
    }

    fn user(name: &str) -> Identity {
        Identity::authenticated(AuthenticatedIdentity::new(json!({})).with_name(name))
    }

    #[test]
    fn test_guest_decisions() {
        let authz = open_acl();
        let guest = Identity::guest();
        assert!(authz.is_authorized(&guest, "Users::collection", "GET").unwrap());
        assert!(!authz.is_authorized(&guest, "Users::collection", "POST").unwrap());
    }

    #[test]
    fn test_unknown_role_and_resource_registered_lazily() {
        let authz = open_acl();
        assert!(authz.is_authorized(&user("alice"), "Orders::entity", "DELETE").unwrap());

        let acl = authz.snapshot().unwrap();
        assert!(acl.has_role("alice"));
        assert!(acl.has_resource("Orders::entity"));
    }

    #[test]
    fn test_add_resource_is_idempotent() {
        let authz = open_acl();
        authz.add_resource("Users::collection").unwrap();
        authz.add_resource("Users::collection").unwrap();
        assert!(authz.has_resource("Users::collection").unwrap());
    }

    #[test]
    fn test_concurrent_first_use() {
        let authz = Arc::new(open_acl());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let authz = Arc::clone(&authz);
                thread::spawn(move || {
                    let identity = user(if i % 2 == 0 { "even" } else { "odd" });
                    authz.is_authorized(&identity, "Shared::entity", "GET")
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().unwrap());
        }
        let acl = authz.snapshot().unwrap();
        assert_eq!(acl.resources().iter().filter(|r| *r == "Shared::entity").count(), 1);
    }
}

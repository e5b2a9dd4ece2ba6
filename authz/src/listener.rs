//! Resource resolution and authorization stages.

use authn::{AuthContext, AuthRequest};
use std::sync::Arc;
use tracing::debug;

use crate::authorization::Authorization;
use crate::error::Result;
use crate::resource::ResourceResolver;

/// Resolves the request's resource and asks the ACL about it.
#[derive(Debug, Clone)]
pub struct AuthorizationListener {
    resolver: ResourceResolver,
    authorization: Arc<dyn Authorization>,
}

impl AuthorizationListener {
    pub fn new(resolver: ResourceResolver, authorization: Arc<dyn Authorization>) -> Self {
        Self {
            resolver,
            authorization,
        }
    }

    pub fn authorization(&self) -> &Arc<dyn Authorization> {
        &self.authorization
    }

    /// Records the resolved resource (possibly none) on `context`.
    pub fn resolve(&self, request: &AuthRequest, context: &mut AuthContext) {
        let resource = self.resolver.resolve(request);
        debug!(resource = ?resource, "Resolved authorization resource");
        context.set_resource(resource);
    }

    /// Decides and records whether the context's identity may perform the
    /// request's method on its resource.
    ///
    /// OPTIONS requests and requests without a resource are authorized
    /// without consulting the ACL.
    pub fn authorize(&self, request: &AuthRequest, context: &mut AuthContext) -> Result<bool> {
        if request.is_options() {
            context.set_authorized(true);
            return Ok(true);
        }
        let Some(resource) = context.resource().map(str::to_string) else {
            debug!("No resource; skipping authorization");
            context.set_authorized(true);
            return Ok(true);
        };

        self.authorization.add_resource(&resource)?;
        let allowed = self.authorization.is_authorized(
            &context.identity(),
            &resource,
            request.method().as_str(),
        )?;
        context.set_authorized(allowed);
        Ok(allowed)
    }
}

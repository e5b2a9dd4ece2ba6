//! Authentication dispatch.
//!
//! The listener decides which attached adapter, if any, gets to authenticate
//! a request, and leaves exactly one identity on the request context. The only
//! things that escape as values are terminal adapter responses; the only
//! thing that escapes as an error is a request for the reserved `token` type
//! or an adapter's own failure.

use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::adapter::{
    AdapterRef, AuthOutcome, AuthenticationAdapter, CompositeAdapter, SharedAdapter,
};
use crate::context::{AuthContext, AuthResponse};
use crate::credentials::{detect_evidence, Evidence};
use crate::error::{AuthnError, Result};
use crate::identity::Identity;
use crate::request::{normalize_controller, AuthRequest};

/// Authentication type reserved for a token scheme that has no adapter yet.
pub const RESERVED_TOKEN_TYPE: &str = "token";

/// Where the requested authentication type came from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RequestedType {
    /// The per-route map named it; no other adapter may be tried.
    Mapped(String),
    /// Read off the request itself.
    Detected(String),
}

impl RequestedType {
    fn as_str(&self) -> &str {
        match self {
            RequestedType::Mapped(auth_type) | RequestedType::Detected(auth_type) => auth_type,
        }
    }
}

/// Selects and runs one authentication adapter per request.
#[derive(Debug, Default)]
pub struct AuthenticationListener {
    adapters: CompositeAdapter,
    type_map: HashMap<String, String>,
    declared_types: Vec<String>,
}

impl AuthenticationListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches an adapter. A later adapter providing a type an earlier one
    /// also provides takes that type over.
    pub fn attach(&mut self, adapter: SharedAdapter) -> bool {
        let provides = adapter.provides();
        for provided in &provides {
            if self.adapters.adapter_for(provided).is_some() {
                warn!(auth_type = %provided, "Authentication type overridden by a later adapter");
            }
        }
        let attached = self.adapters.add_adapter(adapter);
        if attached {
            info!(types = ?provides, "Attached authentication adapter");
        }
        attached
    }

    pub fn detach(&mut self, adapter: &SharedAdapter) -> bool {
        self.adapters.remove_adapter(AdapterRef::Instance(adapter))
    }

    /// Attached adapters in attachment order.
    pub fn adapters(&self) -> &[SharedAdapter] {
        self.adapters.adapters()
    }

    /// Requires `auth_type` for every request routed to `controller`.
    /// Controller names are compared in normalized form.
    pub fn map_controller(&mut self, controller: &str, auth_type: impl Into<String>) {
        self.type_map
            .insert(normalize_controller(controller), auth_type.into());
    }

    pub fn mapped_type(&self, controller: &str) -> Option<&str> {
        self.type_map
            .get(&normalize_controller(controller))
            .map(String::as_str)
    }

    /// Declares types that exist without a local adapter, e.g. for admin
    /// tooling that lists selectable types.
    pub fn add_authentication_types<I, S>(&mut self, types: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for auth_type in types {
            let auth_type = auth_type.into();
            if !self.declared_types.contains(&auth_type) {
                self.declared_types.push(auth_type);
            }
        }
    }

    /// Every type provided by an attached adapter or declared, without
    /// duplicates, adapters first.
    pub fn authentication_types(&self) -> Vec<String> {
        let mut types: Vec<String> = Vec::new();
        let provided = self.adapters().iter().flat_map(|adapter| adapter.provides());
        for auth_type in provided.chain(self.declared_types.iter().cloned()) {
            if !types.contains(&auth_type) {
                types.push(auth_type);
            }
        }
        types
    }

    /// Whether `auth_type` is provided by an adapter or declared.
    pub fn knows_type(&self, auth_type: &str) -> bool {
        self.find_adapter(auth_type).is_some()
            || self.declared_types.iter().any(|declared| declared == auth_type)
    }

    /// The adapter owning `auth_type`: the index first, then a scan in
    /// attachment order so named composites are found too.
    fn find_adapter(&self, auth_type: &str) -> Option<&SharedAdapter> {
        self.adapters.adapter_for(auth_type).or_else(|| {
            self.adapters()
                .iter()
                .find(|adapter| adapter.matches(auth_type))
        })
    }

    /// Runs authentication for `request`, recording the identity on
    /// `context`.
    ///
    /// Returns a response when an adapter ended the request. OPTIONS requests
    /// are passed through without an identity.
    pub fn authenticate(
        &self,
        request: &AuthRequest,
        context: &mut AuthContext,
    ) -> Result<Option<AuthResponse>> {
        if request.is_options() {
            debug!("Skipping authentication for OPTIONS request");
            return Ok(None);
        }

        let mapped = request
            .route()
            .and_then(|route| route.controller())
            .and_then(|controller| self.mapped_type(controller));

        let requested = match mapped {
            Some(auth_type) => RequestedType::Mapped(auth_type.to_string()),
            None => match detect_evidence(request) {
                Evidence::Unparseable => {
                    debug!("Unparseable Authorization header; continuing as guest");
                    context.set_identity(Identity::guest());
                    return Ok(None);
                }
                Evidence::None => return self.anonymous(request, context),
                evidence => {
                    let detected = self
                        .adapters
                        .type_from_request(request)
                        .or_else(|| evidence.candidate_type().map(str::to_string));
                    match detected {
                        Some(auth_type) => RequestedType::Detected(auth_type),
                        None => {
                            context.set_identity(Identity::guest());
                            return Ok(None);
                        }
                    }
                }
            },
        };

        let Some(adapter) = self.find_adapter(requested.as_str()) else {
            if requested.as_str() == RESERVED_TOKEN_TYPE {
                return Err(AuthnError::NotImplemented(RESERVED_TOKEN_TYPE.to_string()));
            }
            match &requested {
                RequestedType::Mapped(auth_type) => {
                    warn!(auth_type = %auth_type, "Route requires an authentication type no adapter provides")
                }
                RequestedType::Detected(auth_type) => {
                    debug!(auth_type = %auth_type, "No adapter for detected authentication type")
                }
            }
            context.set_identity(Identity::guest());
            return Ok(None);
        };

        match adapter.authenticate(request, context)? {
            AuthOutcome::Failed => {
                debug!(auth_type = %requested.as_str(), "Authentication failed; continuing as guest");
                context.set_identity(Identity::guest());
                Ok(None)
            }
            AuthOutcome::Identity(identity) => {
                debug!(role = %identity.role_id(), auth_type = %requested.as_str(), "Authenticated");
                context.set_identity(identity);
                Ok(None)
            }
            AuthOutcome::Response(response) => {
                debug!(status = %response.status(), "Adapter ended the request");
                Ok(Some(response))
            }
        }
    }

    /// No credentials at all. Only a lone adapter is asked to challenge.
    fn anonymous(
        &self,
        request: &AuthRequest,
        context: &mut AuthContext,
    ) -> Result<Option<AuthResponse>> {
        if let [adapter] = self.adapters() {
            if let Some(terminal) = adapter.pre_auth(request, context.response_mut())? {
                return Ok(Some(terminal));
            }
        }
        context.set_identity(Identity::guest());
        Ok(None)
    }
}

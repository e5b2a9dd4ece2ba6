//! Authentication adapters.
//!
//! An adapter recognizes one or more authentication types and knows how to
//! validate them. The listener only ever talks to adapters through
//! [`AuthenticationAdapter`]; the concrete strategies shipped here are HTTP
//! Basic/Digest, OAuth2 bearer tokens, and a composite that groups others.

pub mod composite;
pub mod digest;
pub mod http;
pub mod oauth2;

use std::fmt::Debug;
use std::sync::Arc;

use crate::context::{AuthContext, AuthResponse};
use crate::error::Result;
use crate::identity::Identity;
use crate::request::AuthRequest;

pub use composite::{AdapterRef, CompositeAdapter};
pub use http::{HttpAdapter, HttpScheme};
pub use oauth2::{OAuth2Adapter, OAuth2Failure, ResourceServer, StaticTokenServer, TokenData};

/// What an adapter concluded about a request.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    /// Credentials were absent or invalid; the request proceeds as a guest.
    Failed,
    /// Credentials were accepted.
    Identity(Identity),
    /// The adapter produced the final response (e.g. an OAuth2 error).
    Response(AuthResponse),
}

/// A strategy capable of recognizing and validating authentication types.
///
/// `provides()` must be stable for the lifetime of the adapter, and
/// `matches()` must agree with it.
pub trait AuthenticationAdapter: Send + Sync + Debug {
    /// The adapter's own name, if it can be addressed by one.
    fn name(&self) -> Option<&str> {
        None
    }

    /// Authentication types this adapter can service, in a stable order.
    fn provides(&self) -> Vec<String>;

    fn matches(&self, auth_type: &str) -> bool {
        self.provides().iter().any(|provided| provided == auth_type)
    }

    /// The provided type the request carries evidence for, if any.
    fn type_from_request(&self, request: &AuthRequest) -> Option<String>;

    /// Challenges an anonymous client. Writing headers or a status to
    /// `response` is provisional; returning a response ends the request.
    fn pre_auth(
        &self,
        _request: &AuthRequest,
        _response: &mut AuthResponse,
    ) -> Result<Option<AuthResponse>> {
        Ok(None)
    }

    /// Validates the request's credentials.
    fn authenticate(&self, request: &AuthRequest, context: &mut AuthContext)
        -> Result<AuthOutcome>;
}

/// Adapters are shared between the listener, composites and request tasks.
pub type SharedAdapter = Arc<dyn AuthenticationAdapter>;

/// Identity comparison for shared adapters.
pub(crate) fn same_adapter(a: &SharedAdapter, b: &SharedAdapter) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

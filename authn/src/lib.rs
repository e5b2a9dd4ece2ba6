//! Pluggable request authentication.
//!
//! This crate turns an incoming request into an [`Identity`]. Several
//! authentication schemes can be configured at once; the
//! [`AuthenticationListener`] picks the one adapter responsible for a request
//! and records its verdict on the request's [`AuthContext`].
//!
//! # Dispatch Overview
//!
//! 1. **OPTIONS** requests pass through without an identity
//! 2. **Route map**: a controller mapped to a type requires that type, and
//!    no other adapter is consulted
//! 3. **Evidence**: otherwise the `Authorization` scheme or an
//!    `access_token` parameter names the type
//! 4. **Adapter**: the last attached adapter providing the type authenticates
//! 5. **Outcome**: an identity, a guest, or a terminal response
//!
//! Bad credentials and malformed headers produce a guest, never an error.
//!
//! # Adapters
//!
//! - [`HttpAdapter`]: Basic (argon2 hashes) and Digest (SHA-256)
//! - [`OAuth2Adapter`]: bearer tokens checked by a [`ResourceServer`]
//! - [`CompositeAdapter`]: several adapters behind one

pub mod adapter;
pub mod context;
pub mod credentials;
pub mod error;
pub mod identity;
pub mod listener;
pub mod request;
pub mod store;

pub use adapter::{
    AuthOutcome, AuthenticationAdapter, CompositeAdapter, HttpAdapter, HttpScheme, OAuth2Adapter,
    ResourceServer, SharedAdapter, StaticTokenServer, TokenData,
};
pub use context::{AuthContext, AuthResponse, AuthenticationResult};
pub use error::{AuthnError, Result};
pub use identity::{AuthenticatedIdentity, Identity, AUTHENTICATED_ROLE, GUEST_ROLE};
pub use listener::AuthenticationListener;
pub use request::{AuthRequest, RouteMatch};
pub use store::{BasicUserStore, DigestUserStore};

//! ACL-based authorization for authenticated (or guest) requests.
//!
//! # Architecture Overview
//!
//! The authorization flow follows this pattern:
//!
//! 1. **Authentication** has left an [`authn::Identity`] on the request context
//! 2. **Resource resolution** turns the matched route into a resource name
//!    (`Controller::action`, `Controller::collection`, `Controller::entity`)
//! 3. **Authorization** asks the ACL whether the identity's role may use the
//!    request's HTTP method on that resource
//! 4. **Decision** is recorded on the context for the response stage
//!
//! Privileges are HTTP method names. Roles are identity role names; guests
//! share the `guest` role.
//!
//! # Building Rules
//!
//! [`builder::build`] turns per-controller method maps into an
//! [`AclAuthorization`]. See the module docs for the base policy and the
//! rule-derivation rules.

pub mod acl;
pub mod authorization;
pub mod builder;
pub mod error;
pub mod listener;
pub mod resource;

pub use acl::{Acl, RuleEntry, RuleType};
pub use authorization::{AclAuthorization, Authorization};
pub use builder::{ControllerRules, MethodMap};
pub use error::{AuthzError, Result};
pub use listener::AuthorizationListener;
pub use resource::ResourceResolver;

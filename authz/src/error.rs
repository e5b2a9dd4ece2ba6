//! Error types for the authorization system.
//!
//! # Security Note
//! A denied request is not an error; it is a `false` verdict. These errors are
//! for malformed rule tables and internal faults, and their messages are meant
//! for operators. Callers exposing them over HTTP should return a generic body.

use thiserror::Error;

/// Errors that can occur while building or querying an ACL.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// A rule or query referenced a role that was never registered.
    #[error("Role \"{0}\" not found")]
    RoleNotFound(String),

    /// A rule or query referenced a resource that was never registered.
    #[error("Resource \"{0}\" not found")]
    ResourceNotFound(String),

    /// A role with this name already exists.
    #[error("Role \"{0}\" already registered")]
    DuplicateRole(String),

    /// A resource with this name already exists.
    #[error("Resource \"{0}\" already registered")]
    DuplicateResource(String),

    /// A configured rule could not be turned into ACL entries.
    ///
    /// Typically an unknown key in a method map.
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// An internal error occurred during authorization.
    ///
    /// Lock poisoning in the shared ACL surfaces here.
    #[error("Internal authorization error: {0}")]
    Internal(String),
}

/// A specialized Result type for authorization operations.
pub type Result<T> = std::result::Result<T, AuthzError>;

use thiserror::Error;

/// Errors raised by the authentication layer.
///
/// Malformed client input never produces one of these: unparseable headers and
/// bad credentials degrade to a guest identity. What remains are configuration
/// and integration failures that must reach the operator.
#[derive(Error, Debug)]
pub enum AuthnError {
    /// A reserved authentication type was requested but nothing implements it.
    #[error("Authentication type \"{0}\" is not implemented")]
    NotImplemented(String),

    /// An adapter or listener was constructed from invalid configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A caller passed an argument the operation cannot accept.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A credential store entry could not be used (bad hash, bad HA1).
    #[error("Credential store error: {0}")]
    Credentials(String),

    /// A downstream adapter dependency failed while authenticating.
    #[error("Adapter \"{adapter}\" failed: {message}")]
    Adapter { adapter: String, message: String },
}

pub type Result<T> = std::result::Result<T, AuthnError>;

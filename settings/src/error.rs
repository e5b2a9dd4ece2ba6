use authn::AuthnError;
use authz::AuthzError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading configuration or building components from
/// it. All of them happen at startup; none is deferred to request time.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid YAML or does not match the schema, including
    /// unknown adapter selectors.
    #[error("Configuration parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    /// A component could not be constructed from otherwise well-formed
    /// configuration (bad password hash, bad rule key, ...).
    #[error("Service construction failed for {service}: {source}")]
    ServiceConstruction {
        service: String,
        #[source]
        source: ConstructionError,
    },
}

/// The component error behind [`SettingsError::ServiceConstruction`].
#[derive(Debug, Error)]
pub enum ConstructionError {
    #[error(transparent)]
    Authentication(#[from] AuthnError),
    #[error(transparent)]
    Authorization(#[from] AuthzError),
}

impl SettingsError {
    pub fn construction(service: impl Into<String>, source: impl Into<ConstructionError>) -> Self {
        Self::ServiceConstruction {
            service: service.into(),
            source: source.into(),
        }
    }
}

impl From<AuthnError> for SettingsError {
    fn from(err: AuthnError) -> Self {
        Self::construction("authentication", err)
    }
}

impl From<AuthzError> for SettingsError {
    fn from(err: AuthzError) -> Self {
        Self::construction("authorization", err)
    }
}

pub type Result<T> = std::result::Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_error_display() {
        let err: SettingsError = AuthzError::InvalidRule("\"GE T\" is not an HTTP method".into()).into();
        assert_eq!(
            err.to_string(),
            "Service construction failed for authorization: Invalid rule: \"GE T\" is not an HTTP method"
        );

        let err = SettingsError::construction(
            "adapter \"api\"",
            AuthnError::Credentials("bad hash".into()),
        );
        assert!(matches!(err, SettingsError::ServiceConstruction { .. }));
        assert!(err.to_string().contains("adapter \"api\""));
    }
}

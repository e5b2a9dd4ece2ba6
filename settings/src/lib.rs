//! Typed configuration for the authentication and authorization stages.
//!
//! A single YAML document describes the adapters, the per-route type map,
//! the ACL rules and the development server routes. [`PortcullisConfig`]
//! parses and validates it eagerly, and [`PortcullisConfig::build`] turns it
//! into ready-to-share [`Components`]. Every configuration problem surfaces
//! here, at startup.

pub mod components;
pub mod config;
pub mod error;

pub use components::Components;
pub use config::{
    AdapterConfig, AuthenticationConfig, AuthorizationConfig, HttpAdapterConfig,
    OAuth2AdapterConfig, PortcullisConfig, RouteConfig, TokenConfig,
};
pub use error::{ConstructionError, Result, SettingsError};

/// Environment variable naming the default configuration file.
pub const CONFIG_ENV: &str = "PORTCULLIS_CONFIG";

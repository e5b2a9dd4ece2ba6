//! Credential evidence carried by a request.
//!
//! Parsing here never fails loudly. A header that cannot be read is reported
//! as [`AuthorizationHeader::Unparseable`] and the caller decides what that
//! means (the listener treats it as anonymous traffic).

use axum::http::header;

use crate::request::{AuthRequest, FORM_URLENCODED};

/// Name of the OAuth2 access token parameter in query strings and forms.
pub const ACCESS_TOKEN_PARAM: &str = "access_token";

/// Authentication type implied by an `access_token` parameter.
pub const OAUTH2_TYPE: &str = "oauth2";

/// The `Authorization` header, split into scheme and credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationHeader<'a> {
    Absent,
    /// Present, but without a `<scheme> <credentials>` shape.
    Unparseable,
    Scheme {
        /// Lowercased scheme token (`basic`, `digest`, `bearer`, ...).
        scheme: String,
        credentials: &'a str,
    },
}

impl AuthorizationHeader<'_> {
    pub fn scheme(&self) -> Option<&str> {
        match self {
            AuthorizationHeader::Scheme { scheme, .. } => Some(scheme),
            _ => None,
        }
    }
}

/// Reads and splits the `Authorization` header.
pub fn authorization_header(request: &AuthRequest) -> AuthorizationHeader<'_> {
    let Some(value) = request.headers().get(header::AUTHORIZATION) else {
        return AuthorizationHeader::Absent;
    };
    let Ok(value) = value.to_str() else {
        return AuthorizationHeader::Unparseable;
    };

    match value.trim().split_once(' ') {
        Some((scheme, credentials)) if !scheme.is_empty() => AuthorizationHeader::Scheme {
            scheme: scheme.to_ascii_lowercase(),
            credentials: credentials.trim(),
        },
        _ => AuthorizationHeader::Unparseable,
    }
}

/// Where an OAuth2 access token was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessTokenSource {
    Header,
    Form,
    Query,
}

/// Extracts an OAuth2 access token from the header, form body or query.
///
/// Any `Authorization` header takes precedence: a bearer header yields its
/// token, every other header yields none. Form tokens are only honoured on
/// body-carrying methods with a form-encoded content type.
pub fn access_token(request: &AuthRequest) -> Option<(String, AccessTokenSource)> {
    match authorization_header(request) {
        AuthorizationHeader::Scheme {
            scheme,
            credentials,
        } => {
            return (scheme == "bearer" && !credentials.is_empty())
                .then(|| (credentials.to_string(), AccessTokenSource::Header));
        }
        AuthorizationHeader::Unparseable => return None,
        AuthorizationHeader::Absent => {}
    }

    if let Some(token) = form_access_token(request) {
        return Some((token, AccessTokenSource::Form));
    }

    request
        .query_param(ACCESS_TOKEN_PARAM)
        .filter(|token| !token.is_empty())
        .map(|token| (token.to_string(), AccessTokenSource::Query))
}

fn form_access_token(request: &AuthRequest) -> Option<String> {
    if !request.carries_body() || !request.has_content_type(FORM_URLENCODED) {
        return None;
    }
    request
        .form_param(ACCESS_TOKEN_PARAM)
        .filter(|token| !token.is_empty())
}

/// What a request offers as evidence of an authentication type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evidence {
    /// An `Authorization` header that cannot be split; treated as anonymous.
    Unparseable,
    /// The lowercased scheme of a well-formed `Authorization` header.
    Scheme(String),
    /// An `access_token` form or query parameter.
    AccessToken,
    None,
}

impl Evidence {
    /// The type a request implies when no adapter claims it.
    pub fn candidate_type(&self) -> Option<&str> {
        match self {
            Evidence::Scheme(scheme) => Some(scheme),
            Evidence::AccessToken => Some(OAUTH2_TYPE),
            Evidence::Unparseable | Evidence::None => None,
        }
    }
}

/// Classifies the authentication evidence on a request.
pub fn detect_evidence(request: &AuthRequest) -> Evidence {
    match authorization_header(request) {
        AuthorizationHeader::Unparseable => Evidence::Unparseable,
        AuthorizationHeader::Scheme { scheme, .. } => Evidence::Scheme(scheme),
        AuthorizationHeader::Absent => {
            let has_token = form_access_token(request).is_some()
                || request
                    .query_param(ACCESS_TOKEN_PARAM)
                    .is_some_and(|token| !token.is_empty());
            if has_token {
                Evidence::AccessToken
            } else {
                Evidence::None
            }
        }
    }
}

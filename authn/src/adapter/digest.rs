//! HTTP Digest (RFC 7616) with `algorithm=SHA-256` and `qop=auth`.
//!
//! Nonces are stateless: a nonce is the SHA-256 of the current time bucket,
//! the realm and a server secret, so any node sharing the secret can verify
//! it without a nonce store. A nonce stays valid for the bucket it was issued
//! in and the one after.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Algorithm token advertised in challenges.
pub const ALGORITHM: &str = "SHA-256";

/// Credentials from an `Authorization: Digest ...` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestCredentials {
    pub username: String,
    pub realm: String,
    pub nonce: String,
    pub uri: String,
    pub response: String,
    pub algorithm: Option<String>,
    pub qop: Option<String>,
    pub nc: Option<String>,
    pub cnonce: Option<String>,
    pub opaque: Option<String>,
}

impl DigestCredentials {
    /// Parses the credentials part of a Digest header. Returns `None` when a
    /// required parameter is missing.
    pub fn parse(credentials: &str) -> Option<Self> {
        let mut params = parse_params(credentials);
        let mut take = |key: &str| params.remove(key);

        Some(Self {
            username: take("username")?,
            realm: take("realm")?,
            nonce: take("nonce")?,
            uri: take("uri")?,
            response: take("response")?,
            algorithm: take("algorithm"),
            qop: take("qop"),
            nc: take("nc"),
            cnonce: take("cnonce"),
            opaque: take("opaque"),
        })
    }
}

/// Splits `key=value, key="quoted, value"` pairs. Keys are lowercased.
fn parse_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace() || *c == ',') {
            chars.next();
        }
        let key: String = chars
            .by_ref()
            .take_while(|c| *c != '=')
            .collect::<String>()
            .trim()
            .to_ascii_lowercase();
        if key.is_empty() {
            break;
        }

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            let mut escaped = false;
            for c in chars.by_ref() {
                match (escaped, c) {
                    (false, '\\') => escaped = true,
                    (false, '"') => break,
                    _ => {
                        value.push(c);
                        escaped = false;
                    }
                }
            }
        } else {
            while let Some(c) = chars.peek() {
                if *c == ',' {
                    break;
                }
                value.push(*c);
                chars.next();
            }
            value = value.trim().to_string();
        }
        params.insert(key, value);
    }

    params
}

/// Issues and checks time-bucketed nonces.
#[derive(Debug, Clone)]
pub struct NonceIssuer {
    realm: String,
    secret: String,
    timeout: i64,
}

impl NonceIssuer {
    pub fn new(realm: impl Into<String>, secret: impl Into<String>, timeout: i64) -> Self {
        Self {
            realm: realm.into(),
            secret: secret.into(),
            timeout: timeout.max(1),
        }
    }

    /// Nonce for the current time bucket.
    pub fn issue(&self) -> String {
        self.nonce_at(Utc::now().timestamp())
    }

    /// Whether `nonce` belongs to the current or the previous bucket.
    pub fn verify(&self, nonce: &str) -> bool {
        let now = Utc::now().timestamp();
        constant_time_eq(nonce, &self.nonce_at(now))
            || constant_time_eq(nonce, &self.nonce_at(now - self.timeout))
    }

    /// Opaque value echoed back by clients.
    pub fn opaque(&self) -> String {
        sha256_hex(&format!("opaque:{}", self.realm))
    }

    fn nonce_at(&self, timestamp: i64) -> String {
        let bucket = (timestamp + self.timeout - 1).div_euclid(self.timeout) * self.timeout;
        sha256_hex(&format!("{bucket}:{}:{}", self.realm, self.secret))
    }
}

/// Computes the expected `response` value for `credentials`.
///
/// Returns `None` for algorithms or qop values this implementation does not
/// support.
pub fn expected_response(credentials: &DigestCredentials, method: &str, ha1: &str) -> Option<String> {
    if let Some(algorithm) = &credentials.algorithm {
        if !algorithm.eq_ignore_ascii_case(ALGORITHM) {
            return None;
        }
    }

    let ha2 = sha256_hex(&format!("{method}:{}", credentials.uri));
    match credentials.qop.as_deref() {
        Some("auth") => {
            let nc = credentials.nc.as_deref()?;
            let cnonce = credentials.cnonce.as_deref()?;
            Some(sha256_hex(&format!(
                "{ha1}:{}:{nc}:{cnonce}:auth:{ha2}",
                credentials.nonce
            )))
        }
        None => Some(sha256_hex(&format!("{ha1}:{}:{ha2}", credentials.nonce))),
        Some(_) => None,
    }
}

pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input))
}

/// Compares two strings without short-circuiting on the first difference.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

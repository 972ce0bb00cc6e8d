//! HTTP Basic credentials carrying the object store key pair.
//!
//! The proxy holds no secrets of its own. The client sends the access key id
//! as the Basic username and the secret access key as the password, and both
//! live only as long as the request.

use axum::http::HeaderValue;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;

use crate::{Error, Result};

/// Access key id / secret key pair taken from an `Authorization` header.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Basic auth username, used as the access key id.
    pub user: String,
    /// Basic auth password, used as the secret access key.
    pub pass: String,
}

impl Credentials {
    /// Create credentials from a username and password.
    pub fn new(user: &str, pass: &str) -> Self {
        Credentials {
            user: user.to_string(),
            pass: pass.to_string(),
        }
    }

    /// Extract credentials from the raw `Authorization` header value.
    ///
    /// A missing header is [`Error::AuthMissing`]; anything that is not
    /// `Basic <base64(user:pass)>` is [`Error::AuthMalformed`]. The password is
    /// everything after the first `:` and may itself contain colons.
    pub fn from_header(header: Option<&HeaderValue>) -> Result<Self> {
        let header = header.ok_or(Error::AuthMissing)?;
        let header = header
            .to_str()
            .map_err(|_| Error::AuthMalformed("header is not ASCII".into()))?;

        let (scheme, encoded) = header.split_once(' ').unwrap_or((header, ""));
        if scheme != "Basic" {
            return Err(Error::AuthMalformed(format!("unsupported scheme '{}'", scheme)));
        }
        if encoded.is_empty() {
            return Err(Error::AuthMalformed("missing credentials".into()));
        }

        let decoded = STANDARD
            .decode(encoded)
            .map_err(|e| Error::AuthMalformed(format!("invalid base64: {}", e)))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|_| Error::AuthMalformed("credentials are not UTF-8".into()))?;

        let (user, pass) = decoded
            .split_once(':')
            .ok_or_else(|| Error::AuthMalformed("missing ':' separator".into()))?;

        Ok(Credentials::new(user, pass))
    }

    /// Encode as an `Authorization` header value.
    pub fn encode(&self) -> String {
        let credentials = format!("{}:{}", self.user, self.pass);
        format!("Basic {}", STANDARD.encode(credentials.as_bytes()))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .finish()
    }
}

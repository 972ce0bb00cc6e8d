//! Object store options encoded in the request path.
//!
//! A batch URL looks like
//! `/{key=value}*/{bucket path...}/objects/batch`. Leading `key=value`
//! segments configure the signer, everything from the first segment without
//! an `=` onwards is the bucket path. One deployment can therefore serve any
//! number of buckets, regions and endpoints with no server-side tenant config.

use percent_encoding::percent_decode_str;
use std::collections::BTreeMap;
use std::fmt;

use crate::{Credentials, Error, Result};

/// Longest expiry SigV4 presigned URLs allow (seven days).
pub const MAX_EXPIRY_SECS: u64 = 7 * 24 * 60 * 60;

/// Trailing path segments of every batch endpoint.
const BATCH_SUFFIX: [&str; 2] = ["objects", "batch"];

/// Connection and signing options for one request.
///
/// Seeded with the Basic auth credentials; path options may override any
/// field. Keys the signer does not know end up in [`StoreOptions::extra`]
/// and are otherwise ignored.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Access key id (`accessKeyId`).
    pub access_key_id: String,
    /// Secret access key (`secretAccessKey`).
    pub secret_access_key: String,
    /// Temporary session token (`sessionToken`).
    pub session_token: Option<String>,
    /// Signing region (`region`), inferred from the host when absent.
    pub region: Option<String>,
    /// Signing service name (`service`), `s3` when absent.
    pub service: Option<String>,
    /// Object store host, optionally with port (`endpoint`).
    pub endpoint: Option<String>,
    /// Caller-requested URL lifetime in seconds (`expiry`).
    pub expiry: Option<u64>,
    /// Unrecognised options, kept for forward compatibility.
    pub extra: BTreeMap<String, String>,
}

impl StoreOptions {
    /// Options carrying only the given credentials.
    pub fn new(credentials: &Credentials) -> Self {
        StoreOptions {
            access_key_id: credentials.user.clone(),
            secret_access_key: credentials.pass.clone(),
            ..Default::default()
        }
    }

    /// Apply one decoded `key=value` option. Later keys overwrite earlier ones.
    pub fn set(&mut self, key: &str, value: String) -> Result<()> {
        match key {
            "accessKeyId" => self.access_key_id = value,
            "secretAccessKey" => self.secret_access_key = value,
            "sessionToken" => self.session_token = Some(value),
            "region" => self.region = Some(value),
            "service" => self.service = Some(value),
            "endpoint" => self.endpoint = Some(value),
            "expiry" => self.expiry = Some(parse_expiry(&value)?),
            _ => {
                self.extra.insert(key.to_string(), value);
            }
        }
        Ok(())
    }
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .field("region", &self.region)
            .field("service", &self.service)
            .field("endpoint", &self.endpoint)
            .field("expiry", &self.expiry)
            .field("extra", &self.extra)
            .finish()
    }
}

fn parse_expiry(value: &str) -> Result<u64> {
    let invalid = |reason: &str| Error::InvalidOption {
        key: "expiry".into(),
        reason: reason.into(),
    };
    let secs: u64 = value
        .parse()
        .map_err(|_| invalid("expected a whole number of seconds"))?;
    if secs == 0 || secs > MAX_EXPIRY_SECS {
        return Err(invalid("must be between 1 and 604800 seconds"));
    }
    Ok(secs)
}

fn decode(raw: &str, key: &str) -> Result<String> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| Error::InvalidOption {
            key: key.to_string(),
            reason: "not valid UTF-8 after percent-decoding".into(),
        })
}

/// Split the raw (still percent-encoded) request path into option overrides
/// and a bucket path.
///
/// The leading `/` and the final `objects/batch` segments are dropped first.
/// Option keys and values are percent-decoded; bucket segments are kept as
/// sent and rejoined with `/`, so the bucket path may be empty.
pub fn parse_path(options: &mut StoreOptions, path: &str) -> Result<String> {
    let mut segments: Vec<&str> = path.strip_prefix('/').unwrap_or(path).split('/').collect();
    if segments.ends_with(&BATCH_SUFFIX) {
        segments.truncate(segments.len() - BATCH_SUFFIX.len());
    }

    let mut bucket_start = segments.len();
    for (idx, segment) in segments.iter().enumerate() {
        let Some((raw_key, raw_value)) = segment.split_once('=') else {
            bucket_start = idx;
            break;
        };
        let key = decode(raw_key, raw_key)?;
        let value = decode(raw_value, &key)?;
        options.set(&key, value)?;
    }

    Ok(segments[bucket_start..].join("/"))
}

//! Presigned URL generation with AWS Signature Version 4.
//!
//! The signature goes into the query string (`X-Amz-*` parameters) rather
//! than headers, so the resulting URL is self-contained: an LFS client can
//! `GET` or `PUT` it without ever seeing the store credentials.
//!
//! This module only decides *what* gets signed: the object URL, the signing
//! region and the service name. The signature itself is computed by
//! `aws-sigv4` over an `UNSIGNED-PAYLOAD` body with `host` as the only signed
//! header.

use std::time::{Duration, SystemTime};

use aws_credential_types::Credentials as AwsCredentials;
use aws_sigv4::http_request::{
    sign, PercentEncodingMode, SignableBody, SignableRequest, SignatureLocation,
    SigningParams, SigningSettings, UriPathNormalizationMode,
};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use axum::http::Method;
use chrono::{DateTime, Utc};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::endpoint::StoreOptions;
use crate::{Error, Result};

const DEFAULT_SERVICE: &str = "s3";
const DEFAULT_REGION: &str = "us-east-1";

/// Name reported as the credentials provider.
const PROVIDER_NAME: &str = "lfs-basic-auth";

/// Everything except RFC 3986 unreserved characters gets encoded.
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Signs object URLs for a single set of store options.
///
/// Built fresh for every request and never mutated afterwards, so it can be
/// shared between the per-object signing tasks behind an `Arc`.
#[derive(Clone)]
pub struct Presigner {
    identity: Identity,
    region: Option<String>,
    service: String,
    endpoint: Option<String>,
}

impl Presigner {
    /// Create a signer from request-scoped store options.
    pub fn new(options: &StoreOptions) -> Self {
        let credentials = AwsCredentials::new(
            options.access_key_id.clone(),
            options.secret_access_key.clone(),
            options.session_token.clone(),
            None,
            PROVIDER_NAME,
        );
        Presigner {
            identity: credentials.into(),
            region: options.region.clone(),
            service: options
                .service
                .clone()
                .unwrap_or_else(|| DEFAULT_SERVICE.to_string()),
            endpoint: options.endpoint.clone(),
        }
    }

    /// The unsigned `https` URL for an object.
    ///
    /// With an `endpoint` option the bucket path hangs off that host (and may
    /// be empty); otherwise the first bucket segment is the host.
    pub fn target_url(&self, bucket: &str, oid: &str) -> Result<Url> {
        let location = match self.endpoint.as_deref() {
            Some(host) if bucket.is_empty() => format!("{}/{}", host, oid),
            Some(host) => format!("{}/{}/{}", host, bucket, oid),
            None if bucket.is_empty() => return Err(Error::MissingHost),
            None => format!("{}/{}", bucket, oid),
        };
        let url = Url::parse(&format!("https://{}", location))?;
        match url.host_str() {
            Some(host) if !host.is_empty() => Ok(url),
            _ => Err(Error::MissingHost),
        }
    }

    /// Sign `method` on `bucket/oid`, valid for `expires_in` seconds from now.
    pub fn sign(&self, bucket: &str, oid: &str, method: &Method, expires_in: u64) -> Result<Url> {
        self.sign_at(bucket, oid, method, expires_in, Utc::now())
    }

    /// Same as [`Presigner::sign`] with an explicit signing time.
    pub fn sign_at(
        &self,
        bucket: &str,
        oid: &str,
        method: &Method,
        expires_in: u64,
        now: DateTime<Utc>,
    ) -> Result<Url> {
        let mut url = self.target_url(bucket, oid)?;
        let path = normalize_path(url.path());
        url.set_path(&path);

        let region = match &self.region {
            Some(region) => region.clone(),
            None => infer_region(url.host_str().ok_or(Error::MissingHost)?).to_string(),
        };

        // S3 expects the path encoded exactly once and left un-normalized.
        let mut settings = SigningSettings::default();
        settings.signature_location = SignatureLocation::QueryParams;
        settings.expires_in = Some(Duration::from_secs(expires_in));
        settings.percent_encoding_mode = PercentEncodingMode::Single;
        settings.uri_path_normalization_mode = UriPathNormalizationMode::Disabled;

        let params: SigningParams<'_> = v4::SigningParams::builder()
            .identity(&self.identity)
            .region(&region)
            .name(&self.service)
            .time(SystemTime::from(now))
            .settings(settings)
            .build()
            .map_err(|e| Error::Signing(e.to_string()))?
            .into();

        let request = SignableRequest::new(
            method.as_str(),
            url.as_str(),
            std::iter::empty(),
            SignableBody::UnsignedPayload,
        )
        .map_err(|e| Error::Signing(e.to_string()))?;

        let (instructions, _signature) = sign(request, &params)
            .map_err(|e| Error::Signing(e.to_string()))?
            .into_parts();

        {
            let mut query = url.query_pairs_mut();
            for (name, value) in instructions.params() {
                query.append_pair(name, value);
            }
        }
        Ok(url)
    }
}

/// Guess the signing region from a store host name.
///
/// - Cloudflare R2 signs with `auto`.
/// - Backblaze B2 hosts are `[bucket.]s3.<region>.backblazeb2.com`.
/// - AWS hosts (`amazonaws.com` and the China partition's `amazonaws.com.cn`)
///   carry the region after the service label: `s3.<region>`,
///   `s3.dualstack.<region>`, or the legacy `s3-<region>` form. The global
///   `s3` and `s3-accelerate` endpoints sign as `us-east-1`, and a bare
///   `us-gov` means `us-gov-west-1`.
///
/// Anything else signs as `us-east-1`.
pub fn infer_region(host: &str) -> &str {
    let host = host.split(':').next().unwrap_or(host);
    if host.ends_with(".r2.cloudflarestorage.com") {
        return "auto";
    }

    if let Some(rest) = host.strip_suffix(".backblazeb2.com") {
        let labels: Vec<&str> = rest.split('.').collect();
        return match labels.as_slice() {
            ["s3", region] | [_, "s3", region] if !region.is_empty() => *region,
            _ => DEFAULT_REGION,
        };
    }

    let Some(rest) = host
        .strip_suffix(".amazonaws.com")
        .or_else(|| host.strip_suffix(".amazonaws.com.cn"))
    else {
        return DEFAULT_REGION;
    };

    let labels: Vec<&str> = rest.split('.').filter(|label| *label != "dualstack").collect();
    let (service, region) = match labels.as_slice() {
        [.., service, region] => (*service, Some(*region)),
        [service] => (*service, None),
        [] => return DEFAULT_REGION,
    };

    match region {
        Some("us-gov") => "us-gov-west-1",
        Some("s3") | Some("s3-accelerate") => DEFAULT_REGION,
        Some(region) if region.starts_with("s3-") => legacy_region(region),
        Some(region) if ends_with_digit_suffix(service) && !ends_with_digit_suffix(region) => {
            service
        }
        Some(region) if !region.is_empty() => region,
        _ if service.starts_with("s3-") => legacy_region(service),
        _ => DEFAULT_REGION,
    }
}

/// Region out of a legacy `s3-<region>` label.
fn legacy_region(label: &str) -> &str {
    let region = label.strip_prefix("s3-").unwrap_or(label);
    let region = region.strip_prefix("fips-").unwrap_or(region);
    match region {
        "" | "external-1" | "accelerate" => DEFAULT_REGION,
        region => region,
    }
}

/// `us-west-2` style labels: a dash followed by a single digit.
fn ends_with_digit_suffix(label: &str) -> bool {
    let bytes = label.as_bytes();
    matches!(bytes, [.., b'-', digit] if digit.is_ascii_digit())
}

/// URI-encode each path segment once, keeping `/` separators.
///
/// Segments are decoded first so that already-encoded input is not
/// double-encoded.
fn normalize_path(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_string();
    }
    path.split('/')
        .map(|segment| {
            let decoded = percent_decode_str(segment).decode_utf8_lossy();
            utf8_percent_encode(&decoded, URI_ENCODE_SET).to_string()
        })
        .collect::<Vec<_>>()
        .join("/")
}

//! LFS Batch API types.
//!
//! The Batch API is used to request upload/download URLs for LFS objects.
//! See: https://github.com/git-lfs/git-lfs/blob/main/docs/api/batch.md
//!
//! These are the server-side halves: requests are deserialized, responses
//! are serialized.

use axum::http::Method;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Media type for every LFS API request and response body.
pub const LFS_MEDIA_TYPE: &str = "application/vnd.git-lfs+json";

/// The only hash algorithm this proxy handles.
pub const SHA256: &str = "sha256";

/// The only transfer adapter this proxy hands out.
pub const BASIC_TRANSFER: &str = "basic";

/// Operation type for batch requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Download objects from the store.
    Download,
    /// Upload objects to the store.
    Upload,
}

impl Operation {
    /// The HTTP method the client will use against the presigned URL.
    pub fn method(self) -> Method {
        match self {
            Operation::Upload => Method::PUT,
            Operation::Download => Method::GET,
        }
    }

    /// Name used as the action key in responses.
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Upload => "upload",
            Operation::Download => "download",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "upload" => Ok(Operation::Upload),
            "download" => Ok(Operation::Download),
            other => Err(Error::UnsupportedOperation(other.to_string())),
        }
    }
}

/// A batch request from an LFS client.
///
/// `operation` and `hash_algo` are kept as raw strings so that unsupported
/// values can be reported back by name instead of as a parse failure.
/// `transfers` and `ref` are accepted but not read: the response is always
/// `basic` and no ref is consulted.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
    /// The operation to perform.
    pub operation: String,
    /// The objects to operate on.
    pub objects: Vec<BatchRequestObject>,
    /// Hash algorithm used for the OIDs, `sha256` if absent.
    #[serde(default)]
    pub hash_algo: Option<String>,
}

/// An object in a batch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequestObject {
    /// The OID of the object, expected to be a sha256 hex digest.
    pub oid: String,
    /// The size of the object in bytes.
    pub size: u64,
}

impl BatchRequest {
    /// Parse a request body.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| Error::InvalidBody(e.to_string()))
    }

    /// The requested hash algorithm, defaulting to sha256.
    pub fn hash_algo(&self) -> &str {
        self.hash_algo.as_deref().unwrap_or(SHA256)
    }

    /// Check the hash algorithm and resolve the operation.
    ///
    /// Hash algorithm is checked first, so a request that is wrong on both
    /// counts is reported as a 409.
    pub fn validate(&self) -> Result<Operation> {
        let algo = self.hash_algo();
        if algo != SHA256 {
            return Err(Error::UnsupportedHashAlgorithm(algo.to_string()));
        }
        self.operation.parse()
    }
}

impl BatchRequestObject {
    /// Create a new batch request object.
    pub fn new(oid: &str, size: u64) -> Self {
        BatchRequestObject {
            oid: oid.to_string(),
            size,
        }
    }
}

/// A batch response to an LFS client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    /// The transfer adapter to use, always "basic".
    pub transfer: String,
    /// Hash algorithm of the OIDs, always "sha256".
    pub hash_algo: String,
    /// The objects with their actions, in request order.
    pub objects: Vec<BatchObject>,
}

impl BatchResponse {
    /// Wrap signed objects in a basic/sha256 response.
    pub fn new(objects: Vec<BatchObject>) -> Self {
        BatchResponse {
            transfer: BASIC_TRANSFER.to_string(),
            hash_algo: SHA256.to_string(),
            objects,
        }
    }
}

/// An object in a batch response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchObject {
    /// The OID of the object, echoed from the request.
    pub oid: String,
    /// The size of the object in bytes, echoed from the request.
    pub size: u64,
    /// Always true: the presigned URL carries its own authorization.
    pub authenticated: bool,
    /// Exactly one action, keyed by the requested operation.
    pub actions: BTreeMap<Operation, Action>,
}

impl BatchObject {
    /// Build a response object carrying a single action.
    pub fn signed(object: &BatchRequestObject, operation: Operation, action: Action) -> Self {
        BatchObject {
            oid: object.oid.clone(),
            size: object.size,
            authenticated: true,
            actions: BTreeMap::from([(operation, action)]),
        }
    }

    /// Get the download action if available.
    pub fn download_action(&self) -> Option<&Action> {
        self.actions.get(&Operation::Download)
    }

    /// Get the upload action if available.
    pub fn upload_action(&self) -> Option<&Action> {
        self.actions.get(&Operation::Upload)
    }
}

/// An action (upload/download URL) for an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// The presigned URL.
    pub href: String,
    /// Seconds until the URL expires.
    pub expires_in: u64,
}

/// Body of an LFS error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human readable error message.
    pub message: String,
}

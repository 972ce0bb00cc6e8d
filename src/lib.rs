//! # git-lfs-s3-proxy
//!
//! Git LFS batch API proxy that answers every object with a presigned URL on
//! an S3-compatible object store. File contents never pass through the proxy.
//!
//! This crate provides:
//! - HTTP Basic credential extraction (the store key pair travels as user/password)
//! - Store options and bucket selection encoded in the request path
//! - AWS Signature V4 query-string presigning
//! - The batch endpoint itself, with static assets served for every other path
//!
//! ## Example
//!
//! ```no_run
//! use git_lfs_s3_proxy::{serve, Config};
//!
//! # async fn run() -> git_lfs_s3_proxy::Result<()> {
//! // git config lfs.url https://proxy.example.com/region=auto/ACCOUNT.r2.cloudflarestorage.com/bucket
//! serve(Config::default()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Signing can also be used directly:
//!
//! ```
//! use git_lfs_s3_proxy::{Credentials, Operation, Presigner, StoreOptions};
//!
//! let options = StoreOptions::new(&Credentials::new("AKID", "secret"));
//! let url = Presigner::new(&options)
//!     .sign("bucket.s3.amazonaws.com", "abc123", &Operation::Download.method(), 3600)
//!     .unwrap();
//! assert!(url.as_str().starts_with("https://bucket.s3.amazonaws.com/abc123?"));
//! ```

mod auth;
mod batch;
mod config;
mod endpoint;
mod error;
mod handler;
mod router;
mod signer;

pub use auth::Credentials;
pub use batch::{
    Action, BatchObject, BatchRequest, BatchRequestObject, BatchResponse, ErrorBody, Operation,
    LFS_MEDIA_TYPE,
};
pub use config::{Config, DEFAULT_EXPIRY_SECS};
pub use endpoint::{parse_path, StoreOptions, MAX_EXPIRY_SECS};
pub use error::{Error, Result};
pub use handler::handle;
pub use router::{app, is_batch_path, run, serve};
pub use signer::{infer_region, Presigner};

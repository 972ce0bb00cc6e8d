//! Process configuration.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::endpoint::MAX_EXPIRY_SECS;

/// Default lifetime of presigned URLs, in seconds.
pub const DEFAULT_EXPIRY_SECS: u64 = 3600;

/// Default cap on batch request bodies (1 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Proxy configuration, read from flags with environment fallbacks.
#[derive(Debug, Clone, Parser)]
#[command(name = "git-lfs-s3-proxy", version, about)]
pub struct Config {
    /// Address to listen on.
    #[arg(long, env = "LFS_PROXY_LISTEN", default_value = "127.0.0.1:8787")]
    pub listen: SocketAddr,

    /// Presigned URL lifetime in seconds when the request path sets none.
    #[arg(
        long,
        env = "LFS_PROXY_EXPIRY",
        default_value_t = DEFAULT_EXPIRY_SECS,
        value_parser = clap::value_parser!(u64).range(1..=MAX_EXPIRY_SECS)
    )]
    pub expiry: u64,

    /// Directory served for every path that is not a batch endpoint.
    #[arg(long, env = "LFS_PROXY_ASSETS")]
    pub assets: Option<PathBuf>,

    /// Require the LFS media type in `Accept` and `Content-Type`.
    #[arg(long, env = "LFS_PROXY_STRICT_MEDIA_TYPE")]
    pub strict_media_type: bool,

    /// Largest accepted batch request body, in bytes.
    #[arg(long, env = "LFS_PROXY_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    /// Emit logs as JSON lines.
    #[arg(long, env = "LFS_PROXY_LOG_JSON")]
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen: SocketAddr::from(([127, 0, 0, 1], 8787)),
            expiry: DEFAULT_EXPIRY_SECS,
            assets: None,
            strict_media_type: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            log_json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_empty_command_line() {
        let parsed = Config::try_parse_from(["git-lfs-s3-proxy"]).unwrap();
        let default = Config::default();
        assert_eq!(parsed.listen, default.listen);
        assert_eq!(parsed.expiry, default.expiry);
        assert_eq!(parsed.assets, default.assets);
        assert_eq!(parsed.strict_media_type, default.strict_media_type);
        assert_eq!(parsed.max_body_bytes, default.max_body_bytes);
        assert_eq!(parsed.log_json, default.log_json);
    }

    #[test]
    fn test_flags() {
        let config = Config::try_parse_from([
            "git-lfs-s3-proxy",
            "--listen",
            "0.0.0.0:9000",
            "--expiry",
            "600",
            "--assets",
            "/srv/www",
            "--strict-media-type",
        ])
        .unwrap();
        assert_eq!(config.listen.port(), 9000);
        assert_eq!(config.expiry, 600);
        assert_eq!(config.assets, Some(PathBuf::from("/srv/www")));
        assert!(config.strict_media_type);
    }

    #[test]
    fn test_expiry_out_of_range() {
        assert!(Config::try_parse_from(["git-lfs-s3-proxy", "--expiry", "0"]).is_err());
        assert!(Config::try_parse_from(["git-lfs-s3-proxy", "--expiry", "604801"]).is_err());
    }
}

use std::path::PathBuf;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development. In production,
/// override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long in-flight submissions get to finish on shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Externally visible base URL, used for blob and results links.
    pub public_base_url: String,
    /// Directory holding input and result blobs, served under `/media`.
    pub media_root: PathBuf,
    /// Number of pipeline workers (default: `4`).
    pub worker_count: usize,
    /// Largest accepted request body, in bytes (default: 100 MiB).
    pub max_upload_bytes: usize,
    /// PostgreSQL URL. The in-memory store is used when unset.
    pub database_url: Option<String>,
    /// JSON job catalog for the in-memory store.
    pub catalog_path: Option<PathBuf>,
    /// Bearer tokens whose holders are queued at the elevated tier.
    pub elevated_tokens: Vec<String>,
    /// Identify requesters by `X-Forwarded-For` instead of the peer address.
    /// Only enable behind a proxy that sets the header (default: `false`).
    pub trust_forwarded_for: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `3000`                  |
    /// | `CORS_ORIGINS`          | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                    |
    /// | `PUBLIC_BASE_URL`       | `http://localhost:3000` |
    /// | `MEDIA_ROOT`            | `./media`               |
    /// | `WORKER_COUNT`          | `4`                     |
    /// | `MAX_UPLOAD_MB`         | `100`                   |
    /// | `DATABASE_URL`          | unset                   |
    /// | `CATALOG_PATH`          | unset                   |
    /// | `ELEVATED_TOKENS`       | empty                   |
    /// | `TRUST_FORWARDED_FOR`   | `false`                 |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins = split_list(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".into()),
        );

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"));

        let media_root =
            PathBuf::from(std::env::var("MEDIA_ROOT").unwrap_or_else(|_| "./media".into()));

        let worker_count: usize = std::env::var("WORKER_COUNT")
            .unwrap_or_else(|_| "4".into())
            .parse()
            .expect("WORKER_COUNT must be a valid usize");

        let max_upload_mb: usize = std::env::var("MAX_UPLOAD_MB")
            .unwrap_or_else(|_| "100".into())
            .parse()
            .expect("MAX_UPLOAD_MB must be a valid usize");

        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        let catalog_path = std::env::var("CATALOG_PATH")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let elevated_tokens = split_list(&std::env::var("ELEVATED_TOKENS").unwrap_or_default());

        let trust_forwarded_for: bool = std::env::var("TRUST_FORWARDED_FOR")
            .unwrap_or_else(|_| "false".into())
            .parse()
            .expect("TRUST_FORWARDED_FOR must be true or false");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            public_base_url,
            media_root,
            worker_count,
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            database_url,
            catalog_path,
            elevated_tokens,
            trust_forwarded_for,
        }
    }
}

/// Split a comma-separated list, dropping blanks.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_trims_and_drops_blanks() {
        assert_eq!(split_list(" a, b ,,c "), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
    }
}

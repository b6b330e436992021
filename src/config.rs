use std::time::Duration;

use url::Url;

use crate::error::ClientError;

pub const MIB: u64 = 1024 * 1024;

/// Backend port assumed by the development-host heuristic.
pub const DEV_BACKEND_PORT: u16 = 8000;

/// Client-side upload ceilings for one deployment target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeLimits {
    /// Files at or below this size are sent as-is.
    pub raw_max_bytes: u64,
    /// Upper bound on a zipped payload.
    pub zip_max_bytes: u64,
    /// Whether the backend accepts zip archives on `/analyze`.
    pub zip_allowed: bool,
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self {
            raw_max_bytes: 3 * MIB,
            zip_max_bytes: 20 * MIB,
            zip_allowed: true,
        }
    }
}

impl SizeLimits {
    pub fn from_megabytes(raw_max_mb: u64, zip_max_mb: u64, zip_allowed: bool) -> Self {
        Self {
            raw_max_bytes: raw_max_mb.saturating_mul(MIB),
            zip_max_bytes: zip_max_mb.saturating_mul(MIB),
            zip_allowed,
        }
    }
}

/// Where the analysis cache lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheScope {
    /// In-memory; gone when the process exits.
    Session,
    /// SQLite file that survives restarts.
    Local(String),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Explicitly configured backend origin.
    pub api_base: Option<String>,
    /// Hostname the client runs under, used only when `api_base` is unset.
    pub page_host: Option<String>,
    pub limits: SizeLimits,
    pub timeout: Duration,
    pub cache: CacheScope,
    pub cache_ttl_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            page_host: None,
            limits: SizeLimits::default(),
            timeout: Duration::from_secs(120),
            cache: CacheScope::Session,
            cache_ttl_secs: 24 * 3600,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let raw_mb = env_parse("EDA_RAW_MAX_MB").unwrap_or(defaults.limits.raw_max_bytes / MIB);
        let zip_mb = env_parse("EDA_ZIP_MAX_MB").unwrap_or(defaults.limits.zip_max_bytes / MIB);
        let zip_allowed = std::env::var("EDA_ZIP_ALLOWED")
            .map(|v| !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(defaults.limits.zip_allowed);
        Self {
            api_base: std::env::var("EDA_API_BASE").ok().filter(|v| !v.trim().is_empty()),
            page_host: std::env::var("EDA_PAGE_HOST").ok().filter(|v| !v.trim().is_empty()),
            limits: SizeLimits::from_megabytes(raw_mb, zip_mb, zip_allowed),
            timeout: env_parse("EDA_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            cache: std::env::var("EDA_CACHE_PATH")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(CacheScope::Local)
                .unwrap_or(CacheScope::Session),
            cache_ttl_secs: env_parse("EDA_CACHE_TTL_SECS").unwrap_or(defaults.cache_ttl_secs),
        }
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }

    pub fn with_limits(mut self, limits: SizeLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Resolve the backend origin: explicit config, then the hostname
    /// heuristic, otherwise an input error.
    pub fn resolve_base_url(&self) -> Result<Url, ClientError> {
        let candidate = self
            .api_base
            .clone()
            .or_else(|| self.page_host.as_deref().and_then(infer_backend_from_hostname));
        match candidate {
            Some(base) => normalize_base(&base),
            None => Err(ClientError::input("Backend URL is not configured")),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Parse a base URL and make sure its path ends in `/` so that joining
/// relative endpoint paths keeps any prefix.
pub fn normalize_base(base: &str) -> Result<Url, ClientError> {
    let trimmed = base.trim().trim_end_matches('/');
    let mut url = Url::parse(trimmed)
        .map_err(|e| ClientError::input(format!("Invalid backend URL '{}': {}", base, e)))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ClientError::input(format!("Invalid backend URL '{}'", base)));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Guess the development backend origin from the page's hostname.
///
/// Handles local hosts and the forwarded-port naming of Codespaces
/// (`<name>-<port>.app.github.dev`) and Gitpod (`<port>-<rest>.gitpod.io`).
pub fn infer_backend_from_hostname(hostname: &str) -> Option<String> {
    let host = hostname.trim().trim_end_matches('.').to_lowercase();
    let host = host.split(':').next().unwrap_or_default();
    if host.is_empty() {
        return None;
    }

    if matches!(host, "localhost" | "127.0.0.1" | "0.0.0.0") {
        return Some(format!("http://localhost:{}", DEV_BACKEND_PORT));
    }

    if let Some(label) = host.strip_suffix(".app.github.dev") {
        let (name, port) = label.rsplit_once('-')?;
        if name.is_empty() || !is_port(port) {
            return None;
        }
        return Some(format!("https://{}-{}.app.github.dev", name, DEV_BACKEND_PORT));
    }

    if host.ends_with(".gitpod.io") {
        let (port, rest) = host.split_once('-')?;
        if rest.is_empty() || !is_port(port) {
            return None;
        }
        return Some(format!("https://{}-{}", DEV_BACKEND_PORT, rest));
    }

    None
}

fn is_port(s: &str) -> bool {
    !s.is_empty() && s.len() <= 5 && s.bytes().all(|b| b.is_ascii_digit())
}

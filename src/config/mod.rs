//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{fmt, net::SocketAddr, num::NonZeroU32, str::FromStr, time::Duration};

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub use cli::{CliArgs, Command, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "quire";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_CACHE_OPERATION_TIMEOUT_MS: u64 = 250;
const DEFAULT_CACHE_MAX_BODY_BYTES: u64 = 1024 * 1024;
const DEFAULT_MAX_SESSION_SECS: u64 = 86_400;
const DEFAULT_MAX_FAILED_LOGIN: u64 = 5;
const DEFAULT_FAILED_LOGIN_TIMEOUT_SECS: u64 = 300;
pub(crate) const MIN_SESSION_SECRET_BYTES: usize = 32;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub session: SessionSettings,
    pub login: LoginSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackendKind {
    Memory,
    Redis { url: String },
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub backend: CacheBackendKind,
    pub operation_timeout: Duration,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub secret: SessionSecret,
    pub max_session: Duration,
    pub trust_forwarded_for: bool,
}

/// Token signing secret. Never printed.
#[derive(Clone)]
pub struct SessionSecret(String);

impl SessionSecret {
    pub fn new(secret: impl Into<String>) -> Result<Self, LoadError> {
        let secret = secret.into();
        if secret.len() < MIN_SESSION_SECRET_BYTES {
            return Err(LoadError::invalid(
                "session.secret",
                format!("must be at least {MIN_SESSION_SECRET_BYTES} bytes"),
            ));
        }
        Ok(Self(secret))
    }

    pub fn expose(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionSecret(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct LoginSettings {
    pub max_failed_login: NonZeroU32,
    pub failed_login_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("QUIRE").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Routes) | None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    session: RawSessionSettings,
    login: RawLoginSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(backend) = overrides.cache_backend.as_ref() {
            self.cache.backend = Some(backend.clone());
        }
        if let Some(url) = overrides.cache_redis_url.as_ref() {
            self.cache.redis_url = Some(url.clone());
        }
        if let Some(timeout) = overrides.cache_operation_timeout_ms {
            self.cache.operation_timeout_ms = Some(timeout);
        }
        if let Some(secret) = overrides.session_secret.as_ref() {
            self.session.secret = Some(secret.clone());
        }
        if let Some(seconds) = overrides.session_max_seconds {
            self.session.max_session_seconds = Some(seconds);
        }
        if let Some(max) = overrides.login_max_failed {
            self.login.max_failed_login = Some(max);
        }
        if let Some(seconds) = overrides.login_failed_timeout_seconds {
            self.login.failed_login_timeout_seconds = Some(seconds);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            cache,
            session,
            login,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            cache: build_cache_settings(cache)?,
            session: build_session_settings(session)?,
            login: build_login_settings(login)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let redis_url = cache.redis_url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let backend = match cache.backend.as_deref().map(str::trim) {
        None | Some("memory") => CacheBackendKind::Memory,
        Some("redis") => {
            let url = redis_url.ok_or_else(|| {
                LoadError::invalid("cache.redis_url", "required when cache.backend = redis")
            })?;
            CacheBackendKind::Redis { url }
        }
        Some(other) => {
            return Err(LoadError::invalid(
                "cache.backend",
                format!("unknown backend `{other}`, expected memory or redis"),
            ));
        }
    };

    let timeout_ms = cache
        .operation_timeout_ms
        .unwrap_or(DEFAULT_CACHE_OPERATION_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(LoadError::invalid(
            "cache.operation_timeout_ms",
            "must be greater than zero",
        ));
    }

    let max_body = cache.max_body_bytes.unwrap_or(DEFAULT_CACHE_MAX_BODY_BYTES);
    if max_body == 0 {
        return Err(LoadError::invalid(
            "cache.max_body_bytes",
            "must be greater than zero",
        ));
    }
    let max_body_bytes = usize::try_from(max_body).map_err(|_| {
        LoadError::invalid(
            "cache.max_body_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        backend,
        operation_timeout: Duration::from_millis(timeout_ms),
        max_body_bytes,
    })
}

fn build_session_settings(session: RawSessionSettings) -> Result<SessionSettings, LoadError> {
    let secret = session
        .secret
        .ok_or_else(|| LoadError::invalid("session.secret", "must be provided"))?;
    let secret = SessionSecret::new(secret)?;

    let max_secs = session
        .max_session_seconds
        .unwrap_or(DEFAULT_MAX_SESSION_SECS);
    let max_secs = non_zero_u32(max_secs, "session.max_session_seconds")?;

    Ok(SessionSettings {
        secret,
        max_session: Duration::from_secs(max_secs.get().into()),
        trust_forwarded_for: session.trust_forwarded_for.unwrap_or(true),
    })
}

fn build_login_settings(login: RawLoginSettings) -> Result<LoginSettings, LoadError> {
    let max_failed_login = non_zero_u32(
        login.max_failed_login.unwrap_or(DEFAULT_MAX_FAILED_LOGIN),
        "login.max_failed_login",
    )?;
    let timeout_secs = non_zero_u32(
        login
            .failed_login_timeout_seconds
            .unwrap_or(DEFAULT_FAILED_LOGIN_TIMEOUT_SECS),
        "login.failed_login_timeout_seconds",
    )?;

    Ok(LoginSettings {
        max_failed_login,
        failed_login_timeout: Duration::from_secs(timeout_secs.get().into()),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    backend: Option<String>,
    redis_url: Option<String>,
    operation_timeout_ms: Option<u64>,
    max_body_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSessionSettings {
    secret: Option<String>,
    max_session_seconds: Option<u64>,
    trust_forwarded_for: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoginSettings {
    max_failed_login: Option<u64>,
    failed_login_timeout_seconds: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

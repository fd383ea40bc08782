use crate::services::auth_service::DEFAULT_TOKEN_TTL_HOURS;
use anyhow::{Context, Result, bail};
use chrono::TimeDelta;
use clap::Parser;
use std::{env, fmt, str::FromStr};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    /// HMAC secret for session tokens. `None` means one is generated per process.
    pub token_secret: Option<String>,
    pub token_ttl_hours: i64,
    pub require_auth: bool,
}

/// What the binary should do after loading configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Serve,
    /// Apply the schema and exit.
    Migrate,
    /// Apply the schema, create the administrative identity and exit.
    SeedAdmin { email: String, password: String },
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Bug tracking API")]
pub struct Args {
    /// Host to bind to (overrides BUGLY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides BUGLY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides BUGLY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Maximum pooled SQLite connections (overrides BUGLY_MAX_CONNECTIONS)
    #[arg(long)]
    pub max_connections: Option<u32>,

    /// Secret used to sign session tokens (overrides BUGLY_TOKEN_SECRET)
    #[arg(long)]
    pub token_secret: Option<String>,

    /// Session token lifetime in hours (overrides BUGLY_TOKEN_TTL_HOURS)
    #[arg(long)]
    pub token_ttl_hours: Option<i64>,

    /// Require a bearer token on every API route except login (or BUGLY_REQUIRE_AUTH=true)
    #[arg(long)]
    pub require_auth: bool,

    /// Run migrations and exit
    #[arg(long, conflicts_with = "seed_admin")]
    pub migrate: bool,

    /// Create the administrative identity and exit
    #[arg(long)]
    pub seed_admin: bool,

    /// Email for --seed-admin (overrides BUGLY_ADMIN_EMAIL)
    #[arg(long, requires = "seed_admin")]
    pub admin_email: Option<String>,

    /// Password for --seed-admin (overrides BUGLY_ADMIN_PASSWORD)
    #[arg(long, requires = "seed_admin")]
    pub admin_password: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and run mode.
    pub fn from_env_and_args() -> Result<(Self, RunMode)> {
        Self::resolve(Args::parse(), |key| env::var(key))
    }

    /// Merge `args` over values read through `lookup`, falling back to defaults.
    pub fn resolve<F>(args: Args, lookup: F) -> Result<(Self, RunMode)>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        // --- Environment fallback ---
        let env_host = lookup("BUGLY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_var(&lookup, "BUGLY_PORT", 8081u16)?;
        let env_db =
            lookup("BUGLY_DATABASE_URL").unwrap_or_else(|_| "sqlite://./data/bugly.db".into());
        let env_max_connections = parse_var(&lookup, "BUGLY_MAX_CONNECTIONS", 5u32)?;
        let env_secret = lookup("BUGLY_TOKEN_SECRET").ok();
        let env_ttl = parse_var(&lookup, "BUGLY_TOKEN_TTL_HOURS", DEFAULT_TOKEN_TTL_HOURS)?;
        let env_require_auth = parse_var(&lookup, "BUGLY_REQUIRE_AUTH", false)?;

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            max_connections: args.max_connections.unwrap_or(env_max_connections),
            token_secret: args
                .token_secret
                .or(env_secret)
                .filter(|s| !s.is_empty()),
            token_ttl_hours: args.token_ttl_hours.unwrap_or(env_ttl),
            require_auth: args.require_auth || env_require_auth,
        };

        if cfg.max_connections == 0 {
            bail!("max connections must be at least 1");
        }
        if cfg.token_ttl_hours <= 0 {
            bail!(
                "token lifetime must be positive, got {} hours",
                cfg.token_ttl_hours
            );
        }

        let mode = if args.migrate {
            RunMode::Migrate
        } else if args.seed_admin {
            let email = args.admin_email.or_else(|| lookup("BUGLY_ADMIN_EMAIL").ok());
            let password = args
                .admin_password
                .or_else(|| lookup("BUGLY_ADMIN_PASSWORD").ok());
            match (email, password) {
                (Some(email), Some(password)) => RunMode::SeedAdmin { email, password },
                _ => bail!("--seed-admin requires BUGLY_ADMIN_EMAIL and BUGLY_ADMIN_PASSWORD"),
            }
        } else {
            RunMode::Serve
        };

        Ok((cfg, mode))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn token_ttl(&self) -> TimeDelta {
        TimeDelta::hours(self.token_ttl_hours)
    }

    /// Risky settings worth logging at startup.
    pub fn startup_warnings(&self) -> Vec<&'static str> {
        let mut warnings = Vec::new();
        if self.token_secret.is_none() {
            warnings.push(
                "No BUGLY_TOKEN_SECRET set; generated a per-process secret, sessions will not survive a restart",
            );
        }
        if !self.require_auth {
            warnings.push(
                "Authentication gate is off; every /api route is open. Set BUGLY_REQUIRE_AUTH=true to require a session token",
            );
        }
        warnings
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url)
            .field("max_connections", &self.max_connections)
            .field(
                "token_secret",
                &self.token_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("require_auth", &self.require_auth)
            .finish()
    }
}

fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Result<String, env::VarError>,
{
    match lookup(key) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Result<String, env::VarError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned().ok_or(env::VarError::NotPresent)
    }

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("bugly").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let (cfg, mode) = AppConfig::resolve(args(&[]), env_from(&[])).unwrap();
        assert_eq!(cfg.addr(), "0.0.0.0:8081");
        assert_eq!(cfg.database_url, "sqlite://./data/bugly.db");
        assert_eq!(cfg.max_connections, 5);
        assert_eq!(cfg.token_ttl(), TimeDelta::hours(24));
        assert!(cfg.token_secret.is_none());
        assert!(!cfg.require_auth);
        assert_eq!(mode, RunMode::Serve);
    }

    #[test]
    fn test_cli_overrides_env() {
        let env = env_from(&[("BUGLY_PORT", "9000"), ("BUGLY_HOST", "127.0.0.1")]);
        let (cfg, _) = AppConfig::resolve(args(&["--port", "9100"]), env).unwrap();
        assert_eq!(cfg.addr(), "127.0.0.1:9100");
    }

    #[test]
    fn test_invalid_port_is_reported() {
        let err = AppConfig::resolve(args(&[]), env_from(&[("BUGLY_PORT", "http")]))
            .unwrap_err();
        assert!(err.to_string().contains("BUGLY_PORT"));
    }

    #[test]
    fn test_require_auth_from_env() {
        let env = env_from(&[("BUGLY_REQUIRE_AUTH", "true")]);
        let (cfg, _) = AppConfig::resolve(args(&[]), env).unwrap();
        assert!(cfg.require_auth);
    }

    #[test]
    fn test_non_positive_ttl_is_rejected() {
        assert!(AppConfig::resolve(args(&["--token-ttl-hours", "0"]), env_from(&[])).is_err());
    }

    #[test]
    fn test_seed_admin_reads_credentials_from_env() {
        let env = env_from(&[
            ("BUGLY_ADMIN_EMAIL", "admin@example.com"),
            ("BUGLY_ADMIN_PASSWORD", "s3cret"),
        ]);
        let (_, mode) = AppConfig::resolve(args(&["--seed-admin"]), env).unwrap();
        assert_eq!(
            mode,
            RunMode::SeedAdmin {
                email: "admin@example.com".into(),
                password: "s3cret".into(),
            }
        );
    }

    #[test]
    fn test_seed_admin_without_credentials_fails() {
        assert!(AppConfig::resolve(args(&["--seed-admin"]), env_from(&[])).is_err());
    }

    #[test]
    fn test_startup_warnings_flag_open_defaults() {
        let (cfg, _) = AppConfig::resolve(args(&[]), env_from(&[])).unwrap();
        let warnings = cfg.startup_warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().any(|w| w.contains("Authentication gate is off")));

        let (cfg, _) = AppConfig::resolve(
            args(&["--require-auth", "--token-secret", "hunter2"]),
            env_from(&[]),
        )
        .unwrap();
        assert!(cfg.startup_warnings().is_empty());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let (cfg, _) =
            AppConfig::resolve(args(&["--token-secret", "hunter2"]), env_from(&[])).unwrap();
        let rendered = format!("{:?}", cfg);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use dotenv::dotenv;

use crate::errors::{ErrorKind, Result};
use crate::users::utils::{normalize_email, validate_email_re, validate_password};

pub const MAX_SESSION_TTL_DAYS: i64 = 3650;

#[derive(Clone)]
pub struct AdminAccount {
    pub email: String,
    pub password: String,
}

impl AdminAccount {
    /// Checks the bootstrap credentials with the same rules as registration,
    /// so the account can always log in.
    pub fn new(email: &str, password: String) -> Result<AdminAccount> {
        let email = normalize_email(email);
        if validate_email_re(&email).is_err() {
            return Err(ErrorKind::InvalidConfig("ADMIN_EMAIL".to_string(), email).into());
        }
        if validate_password(&password).is_err() {
            let masked = "*".repeat(password.chars().count());
            return Err(ErrorKind::InvalidConfig("ADMIN_PASSWORD".to_string(), masked).into());
        }
        Ok(AdminAccount { email, password })
    }
}

/// Session lifetime in whole days, between one day and `MAX_SESSION_TTL_DAYS`.
pub fn session_ttl(days: i64) -> Result<chrono::Duration> {
    if (1..=MAX_SESSION_TTL_DAYS).contains(&days) {
        Ok(chrono::Duration::days(days))
    } else {
        Err(ErrorKind::InvalidConfig("SESSION_TTL_DAYS".to_string(), days.to_string()).into())
    }
}

/// Runtime settings, read once at startup.
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub session_secret: String,
    pub address: String,
    pub port: u16,
    pub pool_size: u32,
    pub pool_timeout: Duration,
    pub run_migrations: bool,
    pub cookie_secure: bool,
    pub session_ttl: chrono::Duration,
    pub admin: Option<AdminAccount>,
    pub static_dir: Option<PathBuf>,
}

impl Config {
    pub fn new<U, S>(database_url: U, session_secret: S) -> Result<Config>
    where
        U: Into<String>,
        S: Into<String>,
    {
        let session_secret = session_secret.into();
        check_secret(&session_secret)?;
        Ok(Config {
            database_url: database_url.into(),
            session_secret,
            address: "0.0.0.0".to_string(),
            port: 5000,
            pool_size: 10,
            pool_timeout: Duration::from_secs(5),
            run_migrations: true,
            cookie_secure: false,
            session_ttl: chrono::Duration::days(30),
            admin: None,
            static_dir: None,
        })
    }

    pub fn from_env() -> Result<Config> {
        dotenv().ok();
        let mut config = Config::new(env::var("DATABASE_URL")?, env::var("SESSION_SECRET")?)?;

        config.address = var_or("ADDRESS", config.address)?;
        config.port = var_or("PORT", config.port)?;
        config.pool_size = var_or("DATABASE_POOL_SIZE", config.pool_size)?;
        config.pool_timeout = Duration::from_secs(var_or("DATABASE_TIMEOUT_SECS", 5)?);
        config.run_migrations = var_or("RUN_MIGRATIONS", config.run_migrations)?;
        config.cookie_secure = var_or("COOKIE_SECURE", config.cookie_secure)?;
        config.session_ttl = session_ttl(var_or("SESSION_TTL_DAYS", 30)?)?;
        config.static_dir = env::var("STATIC_DIR").ok().map(PathBuf::from);

        if let (Ok(email), Ok(password)) = (env::var("ADMIN_EMAIL"), env::var("ADMIN_PASSWORD")) {
            config.admin = Some(AdminAccount::new(&email, password)?);
        }

        Ok(config)
    }
}

fn var_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ErrorKind::InvalidConfig(key.to_string(), value).into()),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(e) => Err(e.into()),
    }
}

/// Rocket only accepts 256/512 bit keys encoded as base64 or hex.
pub fn check_secret(secret: &str) -> Result<()> {
    match secret.len() {
        44 | 88 | 64 | 128 => Ok(()),
        other => Err(ErrorKind::InvalidSecret(other).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "hPRYyVRiMyxpw5sBB1XeCMN1kFsDCqKvBi2QJxBVHQk=";

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::new("postgres://localhost/blog", SECRET).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.pool_size, 10);
        assert_eq!(config.session_ttl, chrono::Duration::days(30));
        assert!(config.run_migrations);
        assert!(!config.cookie_secure);
        assert!(config.admin.is_none());
    }

    #[test]
    fn short_secret_is_rejected() {
        let err = Config::new("postgres://localhost/blog", "hunter2").err().unwrap();
        match err.kind() {
            ErrorKind::InvalidSecret(7) => {}
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn admin_credentials_follow_registration_rules() {
        let admin = AdminAccount::new(" Admin@Example.com ", "long-enough".to_string()).unwrap();
        assert_eq!(admin.email, "admin@example.com");

        match AdminAccount::new("admin@example.com", "short".to_string()).err().unwrap().kind() {
            ErrorKind::InvalidConfig(key, value) => {
                assert_eq!(key, "ADMIN_PASSWORD");
                assert_eq!(value, "*****");
            }
            other => panic!("unexpected error: {}", other),
        }

        match AdminAccount::new("admin", "long-enough".to_string()).err().unwrap().kind() {
            ErrorKind::InvalidConfig(key, _) => assert_eq!(key, "ADMIN_EMAIL"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn session_ttl_is_bounded() {
        assert_eq!(session_ttl(1).unwrap(), chrono::Duration::days(1));
        assert_eq!(session_ttl(MAX_SESSION_TTL_DAYS).unwrap(), chrono::Duration::days(3650));
        for days in [0, -5, MAX_SESSION_TTL_DAYS + 1, i64::MAX] {
            match session_ttl(days).err().unwrap().kind() {
                ErrorKind::InvalidConfig(key, value) => {
                    assert_eq!(key, "SESSION_TTL_DAYS");
                    assert_eq!(value, &days.to_string());
                }
                other => panic!("unexpected error: {}", other),
            }
        }
    }

    #[test]
    fn hex_secret_is_accepted() {
        let hex = "ab".repeat(32);
        assert!(check_secret(&hex).is_ok());
    }
}

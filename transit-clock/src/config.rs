//! Process configuration from environment variables.
//!
//! | Variable            | Default                                   |
//! |---------------------|-------------------------------------------|
//! | `GTFS_PATH`         | `assets/gtfs`                             |
//! | `LEGS_FILE`         | `assets/single_leg_trips.csv`             |
//! | `FEED_BASE_URL`     | the public open-data platform             |
//! | `FEED_USERNAME`     | `demo`                                    |
//! | `FEED_PASSWORD`     | `demo4dev`                                |
//! | `FEED_PAGE_SIZE`    | `1000`                                    |
//! | `FEED_TIMEOUT_SECS` | `30`                                      |
//! | `FEED_MOCK_DIR`     | unset; when set, feeds are served from it |
//! | `AUTH_USERNAME`     | `dashboard`                               |
//! | `AUTH_PASSWORD`     | `raspberry`                               |
//! | `BIND_ADDR`         | `0.0.0.0:8000`                            |

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::realtime::FeedConfig;

const DEFAULT_GTFS_PATH: &str = "assets/gtfs";
const DEFAULT_LEGS_FILE: &str = "assets/single_leg_trips.csv";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

/// A configuration variable held a value that could not be used.
#[derive(Debug, thiserror::Error)]
#[error("invalid {name}: {reason}")]
pub struct ConfigError {
    pub name: &'static str,
    pub reason: String,
}

/// Username and password expected in HTTP Basic authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            username: "dashboard".to_string(),
            password: "raspberry".to_string(),
        }
    }
}

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// GTFS archive or directory
    pub gtfs_path: String,
    /// CSV table of tracked legs
    pub legs_file: PathBuf,
    pub feed: FeedConfig,
    /// Serve feeds from JSON files in this directory instead of HTTP
    pub feed_mock_dir: Option<PathBuf>,
    pub auth: Credentials,
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through `lookup`, which returns a variable's
    /// value if it is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let defaults = FeedConfig::default();
        let mut feed = FeedConfig::new(
            var("FEED_USERNAME").unwrap_or(defaults.username),
            var("FEED_PASSWORD").unwrap_or(defaults.password),
        );
        if let Some(url) = var("FEED_BASE_URL") {
            feed = feed.with_base_url(url);
        }
        if let Some(size) = var("FEED_PAGE_SIZE") {
            feed = feed.with_page_size(parse("FEED_PAGE_SIZE", &size)?);
        }
        if let Some(secs) = var("FEED_TIMEOUT_SECS") {
            feed = feed.with_timeout(parse("FEED_TIMEOUT_SECS", &secs)?);
        }
        if feed.page_size == 0 {
            return Err(ConfigError {
                name: "FEED_PAGE_SIZE",
                reason: "must be at least 1".to_string(),
            });
        }

        let auth_defaults = Credentials::default();
        let auth = Credentials {
            username: var("AUTH_USERNAME").unwrap_or(auth_defaults.username),
            password: var("AUTH_PASSWORD").unwrap_or(auth_defaults.password),
        };

        let bind_addr = var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        Ok(Self {
            gtfs_path: var("GTFS_PATH").unwrap_or_else(|| DEFAULT_GTFS_PATH.to_string()),
            legs_file: var("LEGS_FILE")
                .unwrap_or_else(|| DEFAULT_LEGS_FILE.to_string())
                .into(),
            feed,
            feed_mock_dir: var("FEED_MOCK_DIR").map(PathBuf::from),
            auth,
            bind_addr: parse("BIND_ADDR", &bind_addr)?,
        })
    }
}

fn parse<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError {
        name,
        reason: format!("{value:?}: {e}"),
    })
}

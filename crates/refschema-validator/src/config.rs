//! Configuration for the built-in network loader.

use std::time::Duration;

/// Environment variable overriding [`FetchConfig::timeout_secs`].
pub const TIMEOUT_ENV: &str = "REFSCHEMA_FETCH_TIMEOUT_SECS";

/// Environment variable overriding [`FetchConfig::user_agent`].
pub const USER_AGENT_ENV: &str = "REFSCHEMA_USER_AGENT";

/// Settings for [`HttpLoader`](crate::loader::HttpLoader).
///
/// The per-request timeout applies on top of any deadline carried by the
/// caller's [`Context`](crate::context::Context); whichever is shorter wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// Request timeout in seconds (default: 30).
    pub timeout_secs: u64,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("refschema/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FetchConfig {
    /// Create a configuration with the default user agent.
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout_secs,
            ..Self::default()
        }
    }

    /// Defaults, overridden by `REFSCHEMA_FETCH_TIMEOUT_SECS` and
    /// `REFSCHEMA_USER_AGENT` when they are set. Unparseable values and a
    /// zero timeout are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = std::env::var(TIMEOUT_ENV)
            .ok()
            .and_then(|s| parse_timeout_secs(&s))
        {
            config.timeout_secs = secs;
        }
        if let Ok(agent) = std::env::var(USER_AGENT_ENV) {
            if !agent.trim().is_empty() {
                config.user_agent = agent;
            }
        }
        config
    }

    /// The timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn parse_timeout_secs(raw: &str) -> Option<u64> {
    raw.trim().parse().ok().filter(|&secs| secs > 0)
}

//! Command-line arguments for `snmp-cache-table`.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::cache::CacheConfig;
use crate::client::{Backoff, Retry};
use crate::credentials::{SnmpCred, SnmpCredV2, SnmpCredV3};
use crate::error::{Error, Result};

/// Query one MIB table through the cache and print its rows as JSON.
#[derive(Debug, Parser)]
#[command(name = "snmp-cache-table", version, about)]
pub struct TableArgs {
    /// Device host name or address.
    #[arg(value_name = "TARGET")]
    pub target: String,

    /// SNMP port.
    #[arg(long = "port", default_value = "161")]
    pub port: u16,

    /// Prefer IPv6 when resolving the target.
    #[arg(long = "v6")]
    pub v6: bool,

    /// Community string (v2c).
    #[arg(short = 'c', long = "community", env = "SNMP_COMMUNITY", default_value = "public")]
    pub community: String,

    #[command(flatten)]
    pub v3: V3Args,

    /// Directory of JSON MIB files (repeatable).
    #[arg(long = "mib-dir", value_name = "DIR", required = true)]
    pub mib_dirs: Vec<PathBuf>,

    /// MIB holding the table, e.g. IF-MIB.
    #[arg(long = "mib")]
    pub mib: String,

    /// Table or entry object name, e.g. ifEntry.
    #[arg(long = "table")]
    pub table: String,

    /// Max age of the result in minutes.
    #[arg(long = "max-age", default_value = "10")]
    pub max_age: u32,

    /// Disable the cache.
    #[arg(long = "no-cache")]
    pub no_cache: bool,

    /// Request timeout in seconds.
    #[arg(short = 't', long = "timeout", default_value = "5")]
    pub timeout: f64,

    /// Retry count.
    #[arg(short = 'r', long = "retries", default_value = "3")]
    pub retries: u32,

    /// More logging (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Pretty-print the JSON output.
    #[arg(long = "pretty")]
    pub pretty: bool,
}

/// SNMPv3 arguments. A user name switches the tool to v3.
#[derive(Debug, Parser)]
pub struct V3Args {
    /// Security name.
    #[arg(short = 'u', long = "user")]
    pub user: Option<String>,

    /// Authentication protocol: md5 or sha1.
    #[arg(short = 'a', long = "auth")]
    pub auth: Option<String>,

    /// Authentication passphrase.
    #[arg(short = 'A', long = "auth-pass", env = "SNMP_AUTH_PASS", hide_env_values = true)]
    pub auth_pass: Option<String>,

    /// Privacy protocol: des or aes.
    #[arg(short = 'x', long = "priv")]
    pub priv_: Option<String>,

    /// Privacy passphrase.
    #[arg(short = 'X', long = "priv-pass", env = "SNMP_PRIV_PASS", hide_env_values = true)]
    pub priv_pass: Option<String>,
}

impl TableArgs {
    /// v3 when a user is given, v2c otherwise.
    pub fn credential(&self) -> Result<SnmpCred> {
        match &self.v3.user {
            Some(user) => Ok(SnmpCredV3::new(
                Some(user.as_str()),
                self.v3.auth.as_deref(),
                self.v3.auth_pass.as_deref(),
                self.v3.priv_.as_deref(),
                self.v3.priv_pass.as_deref(),
            )?
            .into()),
            None => Ok(SnmpCredV2::new(self.community.clone()).into()),
        }
    }

    /// `--timeout` as a duration; negative, NaN or overflowing values are
    /// rejected.
    pub fn timeout_duration(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.timeout).map_err(|e| {
            Error::Config(format!("invalid timeout {}: {}", self.timeout, e).into()).boxed()
        })
    }

    pub fn cache_config(&self) -> Result<CacheConfig> {
        Ok(CacheConfig::default()
            .with_port(self.port)
            .with_v6(self.v6)
            .with_mib_paths(self.mib_dirs.iter().cloned())
            .with_cache_enabled(!self.no_cache)
            .with_max_cache_age(self.max_age)
            .with_debug_return_data(self.verbose >= 2)
            .with_timeout(self.timeout_duration()?)
            .with_retry(Retry {
                max_attempts: self.retries,
                backoff: Backoff::None,
            }))
    }

    /// Install a stderr fmt subscriber. `RUST_LOG` wins over `-v`.
    pub fn init_tracing(&self) {
        use tracing_subscriber::EnvFilter;

        let default = match self.verbose {
            0 => "snmp_cache=warn",
            1 => "snmp_cache=debug",
            _ => "snmp_cache=trace",
        };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }
}

//! Table cache.
//!
//! [`SnmpCache`] polls whole MIB tables from one device, turns each row
//! into a JSON object keyed by the column names from the loaded MIBs and
//! keeps the result for reuse. An entry is served from cache while it is
//! younger than both the cache-wide `max_cache_age` and the max age the
//! caller gave when it was stored.
//!
//! ```no_run
//! use snmp_cache::{CacheConfig, SnmpCache};
//! use snmp_cache::credentials::SnmpCredV2;
//!
//! # async fn example() -> snmp_cache::Result<()> {
//! let cache = SnmpCache::new(
//!     "switch1.example",
//!     SnmpCredV2::new("public"),
//!     CacheConfig::default().with_mib_paths(["/usr/share/snmp/mibs/json"]),
//! )
//! .await?;
//!
//! for row in cache.get_table("IF-MIB", "ifEntry", true, 5).await? {
//!     println!("{} {}", row["ifDescr"], row["ifOperStatus"]);
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta, Utc};
use serde_json::{Map, Value as JsonValue, json};
use tokio::sync::Mutex;
use tracing::instrument;

use crate::client::{Auth, Client, DEFAULT_TIMEOUT, Retry, TableRow};
use crate::credentials::SnmpCred;
use crate::error::{Error, Result};
use crate::format::{format_snmp_field, parse_table_index, raw_json};
use crate::mib::{MibDocument, MibSet};
use crate::oid::Oid;
use crate::transport::{Transport, UdpTransport};
use crate::util::join_host_port;
use crate::value::Value;
use crate::varbind::VarBind;

/// One table row: column name to formatted value, starting with
/// `_query_time`.
pub type Row = Map<String, JsonValue>;

/// Settings for [`SnmpCache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub port: u16,
    /// Prefer IPv6 when resolving the host.
    pub v6: bool,
    /// Directories of JSON MIBs loaded at construction.
    pub mib_paths: Vec<PathBuf>,
    pub cache_enabled: bool,
    /// Upper bound on the age of served entries, in minutes.
    pub max_cache_age: u32,
    /// Log every table result as JSON at debug level.
    pub debug_return_data: bool,
    pub timeout: Duration,
    pub retry: Retry,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            port: 161,
            v6: false,
            mib_paths: Vec::new(),
            cache_enabled: true,
            max_cache_age: 10,
            debug_return_data: false,
            timeout: DEFAULT_TIMEOUT,
            retry: Retry::default(),
        }
    }
}

impl CacheConfig {
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_v6(mut self, v6: bool) -> Self {
        self.v6 = v6;
        self
    }

    pub fn with_mib_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.mib_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn with_max_cache_age(mut self, minutes: u32) -> Self {
        self.max_cache_age = minutes;
        self
    }

    pub fn with_debug_return_data(mut self, enabled: bool) -> Self {
        self.debug_return_data = enabled;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: impl Into<Retry>) -> Self {
        self.retry = retry.into();
        self
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    /// Minutes, as requested by the caller that stored it.
    max_age: u32,
    /// Unix seconds.
    query_time: f64,
    data: Vec<Row>,
}

impl CacheEntry {
    fn is_fresh(&self, cache_max_age: u32, now: f64) -> bool {
        let max_age = cache_max_age.min(self.max_age);
        self.query_time > now - f64::from(max_age) * 60.0
    }
}

#[derive(Default)]
struct CacheState {
    mibs: MibSet,
    /// mib -> table -> entry
    entries: HashMap<String, HashMap<String, CacheEntry>>,
}

/// Cached SNMP table access for one device.
pub struct SnmpCache<T: Transport = UdpTransport> {
    host: String,
    config: CacheConfig,
    client: Client<T>,
    state: Mutex<CacheState>,
}

impl SnmpCache<UdpTransport> {
    /// Resolve `host`, connect a client with `cred` and load the configured
    /// MIB directories.
    pub async fn new(
        host: impl Into<String>,
        cred: impl Into<SnmpCred>,
        config: CacheConfig,
    ) -> Result<Self> {
        let host = host.into();
        let auth: Auth = cred.into().into();
        let client = Client::builder(join_host_port(&host, config.port), auth)
            .prefer_ipv6(config.v6)
            .timeout(config.timeout)
            .retry(config.retry.clone())
            .connect()
            .await?;
        Self::with_client(host, client, config)
    }
}

impl<T: Transport + 'static> SnmpCache<T> {
    /// Use an already-built client. MIBs from `config.mib_paths` are loaded
    /// here.
    pub fn with_client(host: impl Into<String>, client: Client<T>, config: CacheConfig) -> Result<Self> {
        let mibs = if config.mib_paths.is_empty() {
            MibSet::new()
        } else {
            MibSet::load_dirs(&config.mib_paths)?
        };
        Ok(Self {
            host: host.into(),
            config,
            client,
            state: Mutex::new(CacheState {
                mibs,
                entries: HashMap::new(),
            }),
        })
    }

    /// `host:port`, with ` V6` appended for IPv6.
    pub fn info_str(&self) -> String {
        format!(
            "{}:{}{}",
            self.host,
            self.config.port,
            if self.config.v6 { " V6" } else { "" }
        )
    }

    pub fn client(&self) -> &Client<T> {
        &self.client
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn cache_enabled(&self) -> bool {
        self.config.cache_enabled
    }

    /// Replace the loaded MIBs with the JSON MIBs found in `dirs`.
    ///
    /// The previous set is dropped first, so a failed load leaves no MIBs.
    #[instrument(target = "snmp_cache::cache", skip_all, err, fields(snmp.host = %self.info_str()))]
    pub async fn load_mibs<I, P>(&self, dirs: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<std::path::Path>,
    {
        let mut state = self.state.lock().await;
        state.mibs = MibSet::new();
        state.mibs = MibSet::load_dirs(dirs)?;
        Ok(())
    }

    /// Names of the loaded MIBs, in load order.
    pub async fn mib_names(&self) -> Vec<String> {
        self.state.lock().await.mibs.names().map(str::to_string).collect()
    }

    /// Fetch `table` from `mib` as rows.
    ///
    /// With `allow_cached`, a fresh cache entry is returned without
    /// touching the device. A live result is stored with
    /// `query_cache_max_age` (minutes) as its own age limit. The cache lock
    /// is held for the whole call, so concurrent callers asking for the
    /// same table poll the device once.
    #[instrument(
        target = "snmp_cache::cache",
        skip(self),
        err,
        fields(snmp.host = %self.info_str())
    )]
    pub async fn get_table(
        &self,
        mib: &str,
        table: &str,
        allow_cached: bool,
        query_cache_max_age: u32,
    ) -> Result<Vec<Row>> {
        let mut state = self.state.lock().await;

        if self.config.cache_enabled && allow_cached {
            let cached = state.entries.get(mib).and_then(|tables| tables.get(table));
            if let Some(entry) = cached {
                let now = unix_now();
                if entry.is_fresh(self.config.max_cache_age, now) {
                    tracing::debug!(
                        target: "snmp_cache::cache",
                        "{}: {}: Loaded from cache. Cache age: {:.3} seconds, max age {} seconds",
                        mib, table, now - entry.query_time, u64::from(query_cache_max_age) * 60
                    );
                    self.log_return_data(mib, table, &entry.data);
                    return Ok(entry.data.clone());
                }
            }
        }

        tracing::debug!(target: "snmp_cache::cache", "{}: {}: Polling from device...", mib, table);

        let Some(document) = state.mibs.get(mib) else {
            return Err(Error::MibNotLoaded {
                mib: mib.into(),
                loaded: state.mibs.to_string().into(),
            }
            .boxed());
        };
        let Some(table_def) = document.get(table) else {
            return Err(Error::ObjectNotInMib {
                mib: mib.into(),
                object: table.into(),
            }
            .boxed());
        };
        let Some(table_oid) = table_def.get("oid").and_then(JsonValue::as_str) else {
            return Err(Error::Config(format!("{mib}::{table} has no OID").into()).boxed());
        };

        tracing::debug!(target: "snmp_cache::cache", "Table {}::{} Querying Table...", mib, table);
        let raw_rows = self.client.table(&Oid::parse(table_oid)?).await?;
        let query_time = unix_now();
        tracing::debug!(
            target: "snmp_cache::cache",
            "Table {}::{} returned {} records", mib, table, raw_rows.len()
        );

        let builder = RowBuilder {
            mibs: &state.mibs,
            document,
            mib,
            table,
            table_oid,
            table_def,
        };
        let data: Vec<Row> = raw_rows
            .iter()
            .map(|raw| builder.build(raw, query_time))
            .collect();
        if data.len() != raw_rows.len() {
            return Err(Error::RowCountMismatch {
                parsed: data.len(),
                returned: raw_rows.len(),
            }
            .boxed());
        }

        if self.config.cache_enabled {
            state.entries.entry(mib.to_string()).or_default().insert(
                table.to_string(),
                CacheEntry {
                    max_age: query_cache_max_age,
                    query_time,
                    data: data.clone(),
                },
            );
        }

        self.log_return_data(mib, table, &data);
        Ok(data)
    }

    fn log_return_data(&self, mib: &str, table: &str, data: &[Row]) {
        if !self.config.debug_return_data {
            return;
        }
        match serde_json::to_string(data) {
            Ok(json) => tracing::debug!(target: "snmp_cache::cache", "{}::{} data: {}", mib, table, json),
            Err(e) => tracing::debug!(target: "snmp_cache::cache", "{}::{} data not serializable: {}", mib, table, e),
        }
    }

    /// When the cached copy of a table was polled.
    pub async fn get_cache_table_refresh_time(&self, mib: &str, table: &str) -> Option<DateTime<Local>> {
        let state = self.state.lock().await;
        let entry = state.entries.get(mib)?.get(table)?;
        timestamp_to_local(entry.query_time)
    }

    /// Age of the cached copy of a table.
    pub async fn get_cache_table_age(&self, mib: &str, table: &str) -> Option<TimeDelta> {
        let refreshed = self.get_cache_table_refresh_time(mib, table).await?;
        Some(Local::now() - refreshed)
    }

    /// Drop every cached table.
    pub async fn clear_cache(&self) {
        self.state.lock().await.entries.clear();
    }

    /// GET through the cache's client. Not cached.
    #[instrument(target = "snmp_cache::cache", skip_all, err, fields(snmp.host = %self.info_str(), snmp.oid_count = oids.len()))]
    pub async fn get(&self, oids: &[Oid]) -> Result<Vec<VarBind>> {
        self.client.get_many(oids).await
    }

    /// Walk a subtree through the cache's client. Not cached.
    #[instrument(target = "snmp_cache::cache", skip(self), err, fields(snmp.host = %self.info_str()))]
    pub async fn walk(&self, oid: &Oid) -> Result<Vec<VarBind>> {
        self.client.walk_auto(oid.clone())?.collect().await
    }
}

/// Turns raw table rows into named, formatted rows.
struct RowBuilder<'a> {
    mibs: &'a MibSet,
    document: &'a MibDocument,
    mib: &'a str,
    table: &'a str,
    table_oid: &'a str,
    table_def: &'a JsonValue,
}

impl RowBuilder<'_> {
    /// First object in the MIB whose OID is `{table_oid}.{column}`.
    fn column(&self, column: &str) -> Option<(&String, &JsonValue)> {
        let oid = format!("{}.{}", self.table_oid, column);
        self.document
            .iter()
            .find(|(_, def)| def.get("oid").and_then(JsonValue::as_str) == Some(oid.as_str()))
    }

    fn store(&self, row: &mut Row, name: &str, def: &JsonValue, value: &Value) {
        let formatted = match def.get("syntax") {
            Some(syntax) => format_snmp_field(value, syntax),
            None => raw_json(value),
        };
        row.insert(name.to_string(), formatted);
    }

    fn build(&self, raw: &TableRow, query_time: f64) -> Row {
        let mut row = Row::new();
        row.insert("_query_time".to_string(), json!(query_time));

        // pseudo-column 0 carries the row index
        match self.column("0") {
            Some((name, def)) => self.store(&mut row, name, def, &Value::from(raw.index.as_str())),
            None => parse_table_index(&raw.index, self.table_def, self.mibs, &mut row),
        }

        for (column, value) in &raw.columns {
            let key = column.to_string();
            match self.column(&key) {
                Some((name, def)) => self.store(&mut row, name, def, value),
                None => {
                    tracing::warn!(
                        target: "snmp_cache::cache",
                        "Table {}::{} Returned OID {}.{} which could not be found in MIB {}",
                        self.mib, self.table, self.table_oid, key, self.mib
                    );
                    row.insert(key, raw_json(value));
                }
            }
        }
        row
    }
}

fn unix_now() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

fn timestamp_to_local(seconds: f64) -> Option<DateTime<Local>> {
    DateTime::<Utc>::from_timestamp_micros((seconds * 1_000_000.0) as i64)
        .map(|utc| utc.with_timezone(&Local))
}

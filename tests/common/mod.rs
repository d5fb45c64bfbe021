//! Shared test infrastructure: mock clients and JSON MIB fixtures.

// Not every test file uses every helper.
#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value as JsonValue, json};
use snmp_cache::client::Retry;
use snmp_cache::transport::{MockAgent, MockTransport};
use snmp_cache::{Auth, CacheConfig, Client, SnmpCache, Value, oid};
use tempfile::TempDir;

pub const HOST: &str = "switch1.example";

pub fn mock_transport() -> MockTransport {
    MockTransport::new(SocketAddr::from(([192, 0, 2, 10], 161)))
}

/// v2c client over `mock` with a short timeout and no retries.
pub fn mock_client(mock: &MockTransport) -> Client<MockTransport> {
    Client::builder("192.0.2.10:161", Auth::v2c("public"))
        .timeout(Duration::from_secs(1))
        .retry(Retry::none())
        .build(mock.clone())
        .unwrap()
}

/// Two interfaces of IF-MIB's ifTable, plus one column the MIB does not
/// define and one OID outside the table.
pub fn interface_agent() -> MockAgent {
    let mac1: &[u8] = &[0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e];
    let mac2: &[u8] = &[0xf0, 0x0d, 0xca, 0xfe, 0x00, 0x01];
    MockAgent::new()
        .with(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1, 1), Value::Integer(1))
        .with(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1, 2), Value::Integer(2))
        .with(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2, 1), Value::from("lo"))
        .with(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2, 2), Value::from("eth0"))
        .with(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 6, 1), Value::from(&[0u8; 0][..]))
        .with(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 6, 2), Value::from(mac2))
        .with(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 7, 1), Value::Integer(1))
        .with(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 7, 2), Value::Integer(2))
        .with(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 10, 1), Value::Counter32(1500))
        .with(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 10, 2), Value::Counter32(9000))
        .with(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 99, 2), Value::Gauge32(7))
        .with(oid!(1, 3, 6, 1, 2, 1, 2, 3, 0), Value::from(mac1))
}

/// Cut-down IF-MIB in pysmi JSON form.
pub fn if_mib() -> JsonValue {
    json!({
        "imports": {
            "class": "imports",
            "SNMPv2-SMI": ["Counter32", "MODULE-IDENTITY"],
            "LOCAL-TC-MIB": ["PortMac"]
        },
        "ifTable": {
            "name": "ifTable",
            "oid": "1.3.6.1.2.1.2.2",
            "nodetype": "table",
            "class": "objecttype"
        },
        "ifEntry": {
            "name": "ifEntry",
            "oid": "1.3.6.1.2.1.2.2.1",
            "nodetype": "row",
            "class": "objecttype",
            "indices": [{"module": "IF-MIB", "object": "ifIndex", "implied": 0}]
        },
        "ifIndex": {
            "name": "ifIndex",
            "oid": "1.3.6.1.2.1.2.2.1.1",
            "nodetype": "column",
            "class": "objecttype",
            "syntax": {"type": "InterfaceIndex", "class": "type"}
        },
        "ifDescr": {
            "name": "ifDescr",
            "oid": "1.3.6.1.2.1.2.2.1.2",
            "nodetype": "column",
            "class": "objecttype",
            "syntax": {"type": "DisplayString", "class": "type"}
        },
        "ifPhysAddress": {
            "name": "ifPhysAddress",
            "oid": "1.3.6.1.2.1.2.2.1.6",
            "nodetype": "column",
            "class": "objecttype",
            "syntax": {"type": "PortMac", "class": "type"}
        },
        "ifAdminStatus": {
            "name": "ifAdminStatus",
            "oid": "1.3.6.1.2.1.2.2.1.7",
            "nodetype": "column",
            "class": "objecttype",
            "syntax": {
                "type": "INTEGER",
                "class": "type",
                "constraints": {"enumeration": {"up": 1, "down": 2, "testing": 3}}
            }
        },
        "ifInOctets": {
            "name": "ifInOctets",
            "oid": "1.3.6.1.2.1.2.2.1.10",
            "nodetype": "column",
            "class": "objecttype"
        }
    })
}

/// A local textual convention that resolves to MacAddress.
pub fn local_tc_mib() -> JsonValue {
    json!({
        "PortMac": {
            "name": "PortMac",
            "class": "textualconvention",
            "type": {"type": "MacAddress", "class": "type"}
        }
    })
}

pub fn write_mib(dir: &Path, name: &str, document: &JsonValue) {
    std::fs::write(dir.join(format!("{name}.json")), document.to_string()).unwrap();
}

/// Temp directory holding IF-MIB and LOCAL-TC-MIB.
pub fn mib_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_mib(dir.path(), "IF-MIB", &if_mib());
    write_mib(dir.path(), "LOCAL-TC-MIB", &local_tc_mib());
    dir
}

/// Cache over a mock agent serving [`interface_agent`].
pub fn mock_cache(config: CacheConfig) -> (SnmpCache<MockTransport>, MockTransport, TempDir) {
    mock_cache_with(
        interface_agent(),
        &[("IF-MIB", if_mib()), ("LOCAL-TC-MIB", local_tc_mib())],
        config,
    )
}

/// Cache over `agent` with `mibs` written to a fresh directory.
pub fn mock_cache_with(
    agent: MockAgent,
    mibs: &[(&str, JsonValue)],
    config: CacheConfig,
) -> (SnmpCache<MockTransport>, MockTransport, TempDir) {
    let mock = mock_transport();
    mock.set_agent(agent);
    let dir = tempfile::tempdir().unwrap();
    for (name, document) in mibs {
        write_mib(dir.path(), name, document);
    }
    let cache = SnmpCache::with_client(
        HOST,
        mock_client(&mock),
        config.with_mib_paths([dir.path()]),
    )
    .unwrap();
    (cache, mock, dir)
}

/// Cut-down BRIDGE-MIB: the FDB is indexed by a MAC address that the agent
/// never returns as a column.
pub fn bridge_mib() -> JsonValue {
    json!({
        "dot1dTpFdbTable": {
            "name": "dot1dTpFdbTable",
            "oid": "1.3.6.1.2.1.17.4.3",
            "nodetype": "table",
            "class": "objecttype"
        },
        "dot1dTpFdbEntry": {
            "name": "dot1dTpFdbEntry",
            "oid": "1.3.6.1.2.1.17.4.3.1",
            "nodetype": "row",
            "class": "objecttype",
            "indices": [{"module": "BRIDGE-MIB", "object": "dot1dTpFdbAddress", "implied": 0}]
        },
        "dot1dTpFdbAddress": {
            "name": "dot1dTpFdbAddress",
            "oid": "1.3.6.1.2.1.17.4.3.1.1",
            "nodetype": "column",
            "class": "objecttype",
            "syntax": {"type": "MacAddress", "class": "type"}
        },
        "dot1dTpFdbPort": {
            "name": "dot1dTpFdbPort",
            "oid": "1.3.6.1.2.1.17.4.3.1.2",
            "nodetype": "column",
            "class": "objecttype",
            "syntax": {"type": "Integer32", "class": "type"}
        },
        "dot1dTpFdbStatus": {
            "name": "dot1dTpFdbStatus",
            "oid": "1.3.6.1.2.1.17.4.3.1.3",
            "nodetype": "column",
            "class": "objecttype",
            "syntax": {
                "type": "INTEGER",
                "class": "type",
                "constraints": {"enumeration": {"other": 1, "invalid": 2, "learned": 3, "self": 4, "mgmt": 5}}
            }
        }
    })
}

/// Two learned FDB entries, port and status columns only.
pub fn fdb_agent() -> MockAgent {
    MockAgent::new()
        .with(oid!(1, 3, 6, 1, 2, 1, 17, 4, 3, 1, 2, 0, 26, 43, 60, 77, 94), Value::Integer(5))
        .with(oid!(1, 3, 6, 1, 2, 1, 17, 4, 3, 1, 2, 240, 13, 202, 254, 0, 1), Value::Integer(12))
        .with(oid!(1, 3, 6, 1, 2, 1, 17, 4, 3, 1, 3, 0, 26, 43, 60, 77, 94), Value::Integer(3))
        .with(oid!(1, 3, 6, 1, 2, 1, 17, 4, 3, 1, 3, 240, 13, 202, 254, 0, 1), Value::Integer(5))
}

/// Cut-down IP-MIB ARP table with a two-part index (ifIndex, address).
pub fn ip_mib() -> JsonValue {
    json!({
        "ipNetToMediaEntry": {
            "name": "ipNetToMediaEntry",
            "oid": "1.3.6.1.2.1.4.22.1",
            "nodetype": "row",
            "class": "objecttype",
            "indices": [
                {"module": "IP-MIB", "object": "ipNetToMediaIfIndex", "implied": 0},
                {"module": "IP-MIB", "object": "ipNetToMediaNetAddress", "implied": 0}
            ]
        },
        "ipNetToMediaIfIndex": {
            "name": "ipNetToMediaIfIndex",
            "oid": "1.3.6.1.2.1.4.22.1.1",
            "nodetype": "column",
            "class": "objecttype",
            "syntax": {"type": "INTEGER", "class": "type"}
        },
        "ipNetToMediaPhysAddress": {
            "name": "ipNetToMediaPhysAddress",
            "oid": "1.3.6.1.2.1.4.22.1.2",
            "nodetype": "column",
            "class": "objecttype",
            "syntax": {"type": "MacAddress", "class": "type"}
        },
        "ipNetToMediaNetAddress": {
            "name": "ipNetToMediaNetAddress",
            "oid": "1.3.6.1.2.1.4.22.1.3",
            "nodetype": "column",
            "class": "objecttype",
            "syntax": {"type": "InetAddress", "class": "type"}
        },
        "ipNetToMediaType": {
            "name": "ipNetToMediaType",
            "oid": "1.3.6.1.2.1.4.22.1.4",
            "nodetype": "column",
            "class": "objecttype",
            "syntax": {
                "type": "INTEGER",
                "class": "type",
                "constraints": {"enumeration": {"other": 1, "invalid": 2, "dynamic": 3, "static": 4}}
            }
        }
    })
}

/// One complete ARP entry and one whose index is cut short.
pub fn arp_agent() -> MockAgent {
    let mac: &[u8] = &[0x00, 0x01, 0x02, 0x03, 0x04, 0x05];
    MockAgent::new()
        .with(oid!(1, 3, 6, 1, 2, 1, 4, 22, 1, 2, 3, 10, 0, 0, 1), Value::from(mac))
        .with(oid!(1, 3, 6, 1, 2, 1, 4, 22, 1, 2, 4, 10, 0), Value::from(mac))
        .with(oid!(1, 3, 6, 1, 2, 1, 4, 22, 1, 4, 3, 10, 0, 0, 1), Value::Integer(3))
        .with(oid!(1, 3, 6, 1, 2, 1, 4, 22, 1, 4, 4, 10, 0), Value::Integer(4))
}

/// A private MIB that defines the entry's `.0` object to receive the raw
/// row index.
pub fn port_mib() -> JsonValue {
    json!({
        "portEntry": {
            "name": "portEntry",
            "oid": "1.3.6.1.4.1.64000.1.2.1",
            "nodetype": "row",
            "class": "objecttype",
            "indices": [{"module": "LOCAL-PORT-MIB", "object": "portSlot", "implied": 0}]
        },
        "portRowIndex": {
            "name": "portRowIndex",
            "oid": "1.3.6.1.4.1.64000.1.2.1.0",
            "nodetype": "column",
            "class": "objecttype",
            "syntax": {"type": "DisplayString", "class": "type"}
        },
        "portSlot": {
            "name": "portSlot",
            "oid": "1.3.6.1.4.1.64000.1.2.1.1",
            "nodetype": "column",
            "class": "objecttype",
            "syntax": {"type": "Integer32", "class": "type"}
        },
        "portName": {
            "name": "portName",
            "oid": "1.3.6.1.4.1.64000.1.2.1.2",
            "nodetype": "column",
            "class": "objecttype",
            "syntax": {"type": "DisplayString", "class": "type"}
        }
    })
}

pub fn port_agent() -> MockAgent {
    MockAgent::new()
        .with(oid!(1, 3, 6, 1, 4, 1, 64000, 1, 2, 1, 2, 7, 1), Value::from("ge-7/1"))
        .with(oid!(1, 3, 6, 1, 4, 1, 64000, 1, 2, 1, 2, 7, 2), Value::from("ge-7/2"))
}

/// In-memory log sink for a scoped fmt subscriber.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Route debug-level logs on this thread into a buffer until the guard
/// drops.
pub fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    (logs, tracing::subscriber::set_default(subscriber))
}

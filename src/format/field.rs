//! MIB-guided conversion of SNMP values to JSON.

use serde_json::{Map, Value as JsonValue, json};

use crate::mib::MibSet;
use crate::value::Value;

use super::{ip_binary_to_str, mac_binary_to_hex, mac_decimal_to_hex};

/// JSON form of a value with no MIB information applied.
///
/// Numbers stay numbers, text octet strings become strings, other octet
/// strings become byte arrays and exceptions become `null`.
///
/// ```
/// use snmp_cache::format::raw_json;
/// use snmp_cache::Value;
///
/// assert_eq!(raw_json(&Value::Gauge32(7)), 7);
/// assert_eq!(raw_json(&Value::from("eth0")), "eth0");
/// assert_eq!(raw_json(&Value::from(&[0xffu8, 0x00][..])), serde_json::json!([255, 0]));
/// ```
pub fn raw_json(value: &Value) -> JsonValue {
    match value {
        Value::Integer(v) => json!(v),
        Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => json!(v),
        Value::Counter64(v) => json!(v),
        Value::OctetString(data) => match std::str::from_utf8(data) {
            Ok(s) => JsonValue::String(s.to_string()),
            Err(_) => json!(&data[..]),
        },
        Value::Opaque(data) | Value::Unknown { data, .. } => json!(&data[..]),
        Value::IpAddress(addr) => JsonValue::String(ip_binary_to_str(addr)),
        Value::ObjectIdentifier(oid) => JsonValue::String(oid.to_string()),
        Value::Null | Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView => {
            JsonValue::Null
        }
    }
}

fn enumerated(value: JsonValue, name: &str) -> JsonValue {
    json!({ "value": value, "enumeration": name })
}

/// Format `value` according to an object's MIB `syntax`.
///
/// Syntaxes without both `class` and `type`, or whose class is not `type`,
/// leave the value raw. Known types (`MacAddress`, `InetAddress`,
/// `IpAddress`, `TruthValue`, `BITS`) get converted; other octet strings are
/// decoded as UTF-8. A matching `constraints.enumeration` entry wraps the
/// result as `{"value": .., "enumeration": name}`.
///
/// ```
/// use serde_json::json;
/// use snmp_cache::format::format_snmp_field;
/// use snmp_cache::Value;
///
/// let syntax = json!({"class": "type", "type": "INTEGER",
///                     "constraints": {"enumeration": {"up": 1, "down": 2}}});
/// assert_eq!(
///     format_snmp_field(&Value::Integer(2), &syntax),
///     json!({"value": 2, "enumeration": "down"})
/// );
/// ```
pub fn format_snmp_field(value: &Value, syntax: &JsonValue) -> JsonValue {
    let (Some(class), Some(type_name)) = (
        syntax.get("class").and_then(JsonValue::as_str),
        syntax.get("type").and_then(JsonValue::as_str),
    ) else {
        return raw_json(value);
    };
    if !class.eq_ignore_ascii_case("type") {
        return raw_json(value);
    }

    let converted = match type_name.to_ascii_lowercase().as_str() {
        "macaddress" => match value.as_bytes() {
            Some(bytes) => JsonValue::String(mac_binary_to_hex(bytes)),
            None => raw_json(value),
        },
        "inetaddress" | "ipaddress" => match value.as_bytes() {
            Some(bytes) => JsonValue::String(ip_binary_to_str(bytes)),
            None => raw_json(value),
        },
        "truthvalue" => JsonValue::Bool(value.as_i64() == Some(1)),
        "bits" => return format_bits(value, syntax),
        _ if value.is_numeric() => raw_json(value),
        _ => match value {
            Value::OctetString(data) | Value::Opaque(data) => match std::str::from_utf8(data) {
                Ok(s) => JsonValue::String(s.to_string()),
                Err(e) => {
                    tracing::warn!(target: "snmp_cache::format", "Error decoding {}: {}", value, e);
                    raw_json(value)
                }
            },
            other => {
                tracing::warn!(target: "snmp_cache::format", "Error decoding {}: not an octet string", other);
                raw_json(other)
            }
        },
    };

    let enumeration = syntax
        .get("constraints")
        .and_then(|c| c.get("enumeration"))
        .and_then(JsonValue::as_object);
    if let Some(enumeration) = enumeration {
        if let Some((name, _)) = enumeration.iter().find(|(_, v)| **v == converted) {
            return enumerated(converted, name);
        }
    }
    converted
}

/// BITS: match the big-endian integer of the octets against `syntax.bits`.
///
/// The octets are always reported as a byte array, never as text.
fn format_bits(value: &Value, syntax: &JsonValue) -> JsonValue {
    let Some(bytes) = value.as_bytes() else {
        return raw_json(value);
    };
    let raw = json!(bytes);
    let number = bytes
        .iter()
        .try_fold(0u64, |acc, b| acc.checked_mul(256).map(|acc| acc + u64::from(*b)));
    let (Some(number), Some(bits)) = (number, syntax.get("bits").and_then(JsonValue::as_object))
    else {
        return raw;
    };

    match bits.iter().find(|(_, v)| v.as_u64() == Some(number)) {
        Some((name, _)) => enumerated(raw, name),
        None => raw,
    }
}

/// Decode a row index into the index objects named by a table entry.
///
/// `table_entry` must be a `row` node with `indices`. Each index object
/// found in `mibs` consumes arcs from the dotted `index`: six for a
/// `MacAddress` (stored as hex), four for an `InetAddress` (stored dotted)
/// and one, as an integer, for anything else. Parsing stops at the first
/// failure; fields decoded before it are kept.
pub fn parse_table_index(
    index: &str,
    table_entry: &JsonValue,
    mibs: &MibSet,
    row: &mut Map<String, JsonValue>,
) {
    if table_entry.get("nodetype").and_then(JsonValue::as_str) != Some("row") {
        return;
    }
    let Some(indices) = table_entry.get("indices").and_then(JsonValue::as_array) else {
        return;
    };

    let arcs: Vec<&str> = index.split('.').collect();
    let mut pos = 0;

    for index_def in indices {
        let (Some(module), Some(object)) = (
            index_def.get("module").and_then(JsonValue::as_str),
            index_def.get("object").and_then(JsonValue::as_str),
        ) else {
            continue;
        };
        let Some(definition) = mibs.object(module, object) else {
            continue;
        };

        let syntax = definition.get("syntax");
        let is_type = syntax
            .and_then(|s| s.get("class"))
            .and_then(JsonValue::as_str)
            == Some("type");
        let kind = match syntax.and_then(|s| s.get("type")).and_then(JsonValue::as_str) {
            Some(t) if is_type && t.eq_ignore_ascii_case("macaddress") => IndexKind::Mac,
            Some(t) if is_type && t.eq_ignore_ascii_case("inetaddress") => IndexKind::Inet,
            _ => IndexKind::Integer,
        };
        let width = match kind {
            IndexKind::Mac => 6,
            IndexKind::Inet => 4,
            IndexKind::Integer => 1,
        };

        let parsed = take_arcs(&arcs, pos, width).and_then(|taken| match kind {
            IndexKind::Mac => mac_decimal_to_hex(&taken.join("."))
                .map(JsonValue::String)
                .map_err(|e| e.to_string()),
            IndexKind::Inet => Ok(JsonValue::String(taken.join("."))),
            IndexKind::Integer => taken[0]
                .parse::<i64>()
                .map(JsonValue::from)
                .map_err(|e| e.to_string()),
        });

        match parsed {
            Ok(field) => {
                pos += width;
                row.insert(object.to_string(), field);
            }
            Err(e) => {
                tracing::error!(
                    target: "snmp_cache::format",
                    "Error parsing index. Value: {}, Index: {}, Index specification: {}, Error: {}",
                    index, object, JsonValue::Array(indices.clone()), e
                );
                return;
            }
        }
    }
}

#[derive(Clone, Copy)]
enum IndexKind {
    Mac,
    Inet,
    Integer,
}

fn take_arcs<'a>(arcs: &'a [&'a str], pos: usize, n: usize) -> Result<&'a [&'a str], String> {
    arcs.get(pos..pos + n)
        .ok_or_else(|| format!("expected {} arcs at position {}, index has {}", n, pos, arcs.len()))
}

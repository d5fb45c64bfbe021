//! Support code for the `snmp-cache-table` binary.

pub mod args;

//! JSON MIB documents.
//!
//! MIBs are read from the JSON files pysmi produces: one top-level key per
//! object, plus an `imports` map naming the MIBs (and symbols) this one
//! depends on. After loading, object syntaxes that refer to a textual
//! convention imported from another loaded MIB are replaced by that
//! convention's underlying `type`, so formatting sees e.g. `MacAddress`
//! rather than an opaque local alias.
//!
//! ```no_run
//! use snmp_cache::mib::MibSet;
//!
//! # fn example() -> snmp_cache::Result<()> {
//! let mibs = MibSet::load_dirs(["/usr/share/snmp/mibs/json"])?;
//! if let Some(if_table) = mibs.object("IF-MIB", "ifTable") {
//!     println!("{}", if_table["oid"]);
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value as JsonValue};

use crate::error::{Error, Result};

/// One parsed MIB: object name to definition, in document order.
pub type MibDocument = Map<String, JsonValue>;

/// Loaded MIBs, in load order.
#[derive(Debug, Clone, Default)]
pub struct MibSet {
    mibs: Vec<(String, MibDocument)>,
}

impl MibSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` file in `dirs` and resolve imported types.
    ///
    /// The MIB name is the file name up to its first `.`. Missing
    /// directories are skipped; files are read in name order.
    pub fn load_dirs<I, P>(dirs: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut set = Self::new();
        for dir in dirs {
            set.load_dir(dir.as_ref())?;
        }
        set.resolve_imports();

        tracing::info!(target: "snmp_cache::mib", "Loaded {} MIBS ({})", set.len(), set);
        Ok(set)
    }

    fn load_dir(&mut self, dir: &Path) -> Result<()> {
        if !dir.is_dir() {
            tracing::debug!(target: "snmp_cache::mib", { mib.dir = %dir.display() }, "skipping missing MIB directory");
            return Ok(());
        }

        let mib_io = |path: &Path, source| Error::MibIo {
            path: path.to_path_buf(),
            source,
        };

        let mut files: Vec<PathBuf> = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(|e| mib_io(dir, e).boxed())? {
            let path = entry.map_err(|e| mib_io(dir, e).boxed())?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();

        for path in files {
            let Some(name) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.split('.').next())
            else {
                continue;
            };
            tracing::debug!(target: "snmp_cache::mib", { mib.file = %path.display() }, "Loading MIB {}...", name);

            let text = std::fs::read_to_string(&path).map_err(|e| mib_io(&path, e).boxed())?;
            let document: MibDocument =
                serde_json::from_str(&text).map_err(|source| Error::MibParse {
                    path: path.clone(),
                    source,
                })?;
            self.insert(name.to_string(), document);
        }
        Ok(())
    }

    /// Add or replace a MIB. A replaced MIB keeps its load position.
    ///
    /// Imports are not re-resolved.
    pub fn insert(&mut self, name: String, document: MibDocument) {
        match self.mibs.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = document,
            None => self.mibs.push((name, document)),
        }
    }

    /// Replace the syntax of objects typed by an imported textual convention.
    fn resolve_imports(&mut self) {
        let mut replacements: Vec<(usize, String, JsonValue)> = Vec::new();

        for (mib_idx, (mib_name, document)) in self.mibs.iter().enumerate() {
            let Some(imports) = document.get("imports").and_then(JsonValue::as_object) else {
                continue;
            };

            for (key, item) in document {
                if item.get("class").and_then(JsonValue::as_str) != Some("objecttype") {
                    continue;
                }
                let Some(mut syntax) = item.get("syntax").filter(|s| {
                    s.get("class").and_then(JsonValue::as_str) == Some("type")
                }) else {
                    continue;
                };
                let mut changed = false;

                for (import_mib, symbols) in imports {
                    if import_mib == "class" || import_mib.starts_with("SNMP") {
                        continue;
                    }
                    let Some(type_name) = syntax.get("type").and_then(JsonValue::as_str) else {
                        break;
                    };
                    if !imports_symbol(symbols, type_name) {
                        continue;
                    }
                    let Some(resolved) = self
                        .object(import_mib, type_name)
                        .and_then(|tc| tc.get("type"))
                    else {
                        continue;
                    };

                    tracing::debug!(
                        target: "snmp_cache::mib",
                        "{}: {}: matched type '{}' from MIB {}",
                        mib_name, key, type_name, import_mib
                    );
                    syntax = resolved;
                    changed = true;
                }

                if changed {
                    replacements.push((mib_idx, key.clone(), syntax.clone()));
                }
            }
        }

        for (mib_idx, key, syntax) in replacements {
            if let Some(item) = self.mibs[mib_idx].1.get_mut(&key).and_then(JsonValue::as_object_mut) {
                item.insert("syntax".to_string(), syntax);
            }
        }
    }

    pub fn get(&self, mib: &str) -> Option<&MibDocument> {
        self.mibs.iter().find(|(n, _)| n == mib).map(|(_, d)| d)
    }

    pub fn contains(&self, mib: &str) -> bool {
        self.get(mib).is_some()
    }

    /// An object definition, e.g. `object("IF-MIB", "ifTable")`.
    pub fn object(&self, mib: &str, name: &str) -> Option<&JsonValue> {
        self.get(mib)?.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.mibs.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.mibs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mibs.is_empty()
    }
}

/// `[A, B, C]`
impl fmt::Display for MibSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, name) in self.names().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(name)?;
        }
        f.write_str("]")
    }
}

/// Import entries are symbol lists; a bare string is compared whole.
fn imports_symbol(symbols: &JsonValue, name: &str) -> bool {
    match symbols {
        JsonValue::Array(items) => items.iter().any(|s| s.as_str() == Some(name)),
        JsonValue::String(s) => s == name,
        JsonValue::Object(map) => map.contains_key(name),
        _ => false,
    }
}

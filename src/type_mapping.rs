use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{debug, error};

use crate::error::{JvfError, Result};

/// Object type (`"{code} {label}"`) to the attributes that discriminate its
/// sub-types, in priority order.
#[derive(Debug, Clone, Default)]
pub struct TypeMappingTable {
    entries: HashMap<String, Vec<String>>,
}

impl TypeMappingTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reads a `code|attribute;attribute` table. Errors are logged and produce
    /// an empty table, which disables sub-type discrimination.
    pub fn load(path: &Path) -> Self {
        let loaded = File::open(path)
            .map_err(JvfError::from)
            .and_then(Self::from_reader);
        match loaded {
            Ok(table) => {
                debug!("Loaded {} type mapping rows from {:?}", table.len(), path);
                table
            }
            Err(e) => {
                error!("Error loading type mapping {:?}: {}", path, e);
                Self::empty()
            }
        }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'|')
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut entries = HashMap::new();
        for record in reader.records() {
            let record = record?;
            let Some(code) = record.get(0).map(str::trim) else {
                continue;
            };
            if code.is_empty() {
                continue;
            }
            let attributes = record
                .get(1)
                .map(|cell| {
                    cell.split(';')
                        .map(str::trim)
                        .filter(|a| !a.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            // first row wins, like a first-match table lookup
            entries.entry(code.to_string()).or_insert(attributes);
        }
        Ok(Self { entries })
    }

    pub fn from_entries<I, K, A>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<A>)>,
        K: Into<String>,
        A: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, attrs)| (k.into(), attrs.into_iter().map(Into::into).collect()))
                .collect(),
        }
    }

    /// Exact-match lookup on `"{code} {label}"`; unknown types yield an empty slice.
    pub fn lookup(&self, object_type_code: &str, object_type_label: &str) -> &[String] {
        self.entries
            .get(&format!("{} {}", object_type_code, object_type_label))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

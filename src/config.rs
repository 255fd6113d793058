use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;

/// Default local name of the top-level data block element.
pub const DEFAULT_BLOCK_TAG: &str = "DataJVFDTM";

/// Records carry at most this many geometries (scale geometry + display geometry).
pub const MAX_GEOMETRIES_PER_RECORD: usize = 2;

/// Locations of the read-only lookup tables.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// XSD schema with field documentation and enumerations.
    pub xsd_attributes: Option<PathBuf>,
    /// Pipe-delimited `key|qgis_symbol` style table.
    pub styles: Option<PathBuf>,
    /// Pipe-delimited `code|attr;attr` type mapping table.
    pub type_mapping: Option<PathBuf>,
}

impl Config {
    /// Reads a JSON config file. Relative paths are resolved against the
    /// directory containing the file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&text)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.resolve_relative(base);
        Ok(config)
    }

    fn resolve_relative(&mut self, base: &Path) {
        for slot in [&mut self.xsd_attributes, &mut self.styles, &mut self.type_mapping] {
            if let Some(path) = slot.as_mut() {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        }
    }
}

/// How a discriminating attribute whose raw value is `"0"` is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroDiscriminantPolicy {
    /// `"0"` resolves like any other code.
    #[default]
    Keep,
    /// Children with the raw value `"0"` never count as a match.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    pub block_tag: String,
    pub zero_discriminant: ZeroDiscriminantPolicy,
    /// Prefix every group path with the source file stem.
    pub file_root_group: bool,
    pub max_geometries_per_record: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            block_tag: DEFAULT_BLOCK_TAG.to_string(),
            zero_discriminant: ZeroDiscriminantPolicy::default(),
            file_root_group: false,
            max_geometries_per_record: MAX_GEOMETRIES_PER_RECORD,
        }
    }
}

//! Style table lookups with placeholder and sub-type fallbacks.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{debug, error, warn};

use crate::error::{JvfError, Result};
use crate::symbol::SymbolDefinition;

/// Compound placeholder label: value not collected or not applicable.
pub const UNDETERMINED: &str = "nezjištěno/neurčeno";
/// Placeholder variant: value not collected.
pub const NOT_COLLECTED: &str = "nezjištěno";
/// Placeholder variant: value not applicable.
pub const NOT_APPLICABLE: &str = "neurčeno";

/// Separates the object type name from its sub-type label in layer names.
pub const SUBTYPE_SEPARATOR: &str = " - ";

/// Which lookup produced a style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleMatch {
    Exact,
    NotCollected,
    NotApplicable,
    WithoutSubtype,
}

#[derive(Debug, Clone, Default)]
pub struct StyleCatalog {
    styles: HashMap<String, String>,
}

impl StyleCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reads the pipe-delimited style table. Failure leaves the catalog empty,
    /// so every layer ends up without style rules.
    pub fn load(path: &Path) -> Self {
        let loaded = File::open(path)
            .map_err(JvfError::from)
            .and_then(Self::from_reader);
        match loaded {
            Ok(catalog) => {
                debug!("Loaded {} styles from {:?}", catalog.len(), path);
                catalog
            }
            Err(e) => {
                error!("Error loading styles {:?}: {}", path, e);
                Self::empty()
            }
        }
    }

    /// Expects a header row naming the `key` and `qgis_symbol` columns.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'|')
            .quote(b'"')
            .flexible(true)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| JvfError::Config(format!("style table has no '{}' column", name)))
        };
        let key_col = column("key")?;
        let symbol_col = column("qgis_symbol")?;

        let mut styles = HashMap::new();
        for record in reader.records() {
            let record = record?;
            let (Some(key), Some(symbol)) = (record.get(key_col), record.get(symbol_col)) else {
                continue;
            };
            styles.insert(key.to_string(), symbol.to_string());
        }
        Ok(Self { styles })
    }

    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            styles: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.styles.contains_key(key)
    }

    /// Resolves a style key to its raw table entry, trying in order: the exact
    /// key, the two single-placeholder variants, and the key without sub-type.
    pub fn resolve(&self, style_key: &str) -> Option<(&str, StyleMatch)> {
        if let Some(raw) = self.styles.get(style_key) {
            return Some((raw.as_str(), StyleMatch::Exact));
        }

        if style_key.contains(UNDETERMINED) {
            for (variant, how) in [
                (NOT_COLLECTED, StyleMatch::NotCollected),
                (NOT_APPLICABLE, StyleMatch::NotApplicable),
            ] {
                if let Some(raw) = self.styles.get(&style_key.replace(UNDETERMINED, variant)) {
                    return Some((raw.as_str(), how));
                }
            }
        }

        without_subtype(style_key)
            .and_then(|key| self.styles.get(&key))
            .map(|raw| (raw.as_str(), StyleMatch::WithoutSubtype))
    }

    /// Resolves and decodes a symbol. A table entry that fails to decode counts as
    /// no style.
    pub fn get(&self, style_key: &str) -> Option<SymbolDefinition> {
        let (raw, how) = self.resolve(style_key)?;
        debug!("Style '{}' resolved via {:?}", style_key, how);
        decode_symbol(style_key, raw)
    }
}

/// Decodes a resolved table entry; a broken definition is logged and dropped.
pub fn decode_symbol(style_key: &str, raw: &str) -> Option<SymbolDefinition> {
    match SymbolDefinition::parse(raw) {
        Ok(symbol) => Some(symbol),
        Err(e) => {
            warn!("Invalid symbol definition for '{}': {}", style_key, e);
            None
        }
    }
}

/// `"{type} - {subtype}_{geom}_{band}"` becomes `"{type}_{geom}_{band}"`.
fn without_subtype(style_key: &str) -> Option<String> {
    let (base, rest) = style_key.split_once(SUBTYPE_SEPARATOR)?;
    let mut tail = rest.rsplitn(3, '_');
    let band = tail.next()?;
    let geom = tail.next()?;
    tail.next()?;
    Some(format!("{}_{}_{}", base, geom, band))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILL: &str = r#"{"type": "fill", "layers": [{"type": "SimpleFill", "color": "0,128,0"}]}"#;

    #[test]
    fn test_exact_match() {
        let catalog = StyleCatalog::from_entries([("07 Plot - orchard_Polygon_5000", FILL)]);
        let (_, how) = catalog.resolve("07 Plot - orchard_Polygon_5000").unwrap();
        assert_eq!(how, StyleMatch::Exact);
        assert!(catalog.get("07 Plot - orchard_Polygon_5000").is_some());
    }

    #[test]
    fn test_fallback_without_subtype() {
        let catalog = StyleCatalog::from_entries([("07 Plot_Polygon_5000", FILL)]);
        let (_, how) = catalog.resolve("07 Plot - orchard_Polygon_5000").unwrap();
        assert_eq!(how, StyleMatch::WithoutSubtype);
        assert!(catalog.resolve("07 Plot - orchard_Polygon_500").is_none());
    }

    #[test]
    fn test_subtype_with_underscore() {
        let catalog = StyleCatalog::from_entries([("07 Plot_Polygon_500", FILL)]);
        let (_, how) = catalog.resolve("07 Plot - a_b_Polygon_500").unwrap();
        assert_eq!(how, StyleMatch::WithoutSubtype);
    }

    #[test]
    fn test_placeholder_variants_in_order() {
        let key = "10 Zed - nezjištěno/neurčeno_LineString_500";
        let both = StyleCatalog::from_entries([
            ("10 Zed - neurčeno_LineString_500", FILL),
            ("10 Zed - nezjištěno_LineString_500", FILL),
        ]);
        assert_eq!(both.resolve(key).unwrap().1, StyleMatch::NotCollected);

        let second = StyleCatalog::from_entries([("10 Zed - neurčeno_LineString_500", FILL)]);
        assert_eq!(second.resolve(key).unwrap().1, StyleMatch::NotApplicable);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let catalog = StyleCatalog::from_entries([
            ("07 Plot_Polygon_5000", FILL),
            ("07 Plot - nezjištěno_Polygon_5000", FILL),
        ]);
        let key = "07 Plot - nezjištěno/neurčeno_Polygon_5000";
        let first = catalog.resolve(key).map(|(_, how)| how);
        for _ in 0..10 {
            assert_eq!(catalog.resolve(key).map(|(_, how)| how), first);
        }
        assert_eq!(first, Some(StyleMatch::NotCollected));
    }

    #[test]
    fn test_invalid_json_is_no_style() {
        let catalog = StyleCatalog::from_entries([("x_Point_500", "{broken")]);
        assert!(catalog.resolve("x_Point_500").is_some());
        assert!(catalog.get("x_Point_500").is_none());
    }

    #[test]
    fn test_from_reader_with_quoted_json() {
        let table = "key|qgis_symbol\n\"07 Plot_Polygon_500\"|\"{\"\"type\"\": \"\"fill\"\", \"\"layers\"\": []}\"\n";
        let catalog = StyleCatalog::from_reader(table.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 1);
        let symbol = catalog.get("07 Plot_Polygon_500").unwrap();
        assert!(symbol.layers.is_empty());
    }

    #[test]
    fn test_from_reader_requires_columns() {
        let table = "name|symbol\na|b\n";
        assert!(matches!(
            StyleCatalog::from_reader(table.as_bytes()),
            Err(JvfError::Config(_))
        ));
    }
}

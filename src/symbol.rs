use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolType {
    Marker,
    Line,
    Fill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolLayerType {
    SimpleMarker,
    SvgMarker,
    SimpleLine,
    SimpleFill,
    #[serde(other)]
    Unsupported,
}

impl SymbolLayerType {
    fn fits(&self, symbol: SymbolType) -> bool {
        matches!(
            (self, symbol),
            (SymbolLayerType::SimpleMarker, SymbolType::Marker)
                | (SymbolLayerType::SvgMarker, SymbolType::Marker)
                | (SymbolLayerType::SimpleLine, SymbolType::Line)
                | (SymbolLayerType::SimpleFill, SymbolType::Fill)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolLayer {
    #[serde(rename = "type")]
    pub layer_type: SymbolLayerType,
    /// Renderer properties (`color`, `width`, `size`, ...), passed through untouched.
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl SymbolLayer {
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }
}

/// Decoded style-table symbol, the handle handed to the external renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolDefinition {
    #[serde(rename = "type")]
    pub symbol_type: SymbolType,
    #[serde(default)]
    pub layers: Vec<SymbolLayer>,
}

impl SymbolDefinition {
    /// Decodes a style-table cell. Unsupported symbol layers and layers that do
    /// not fit the symbol type are dropped.
    pub fn parse(json: &str) -> Result<Self> {
        let mut definition: SymbolDefinition = serde_json::from_str(json)?;
        let symbol_type = definition.symbol_type;
        definition.layers.retain(|layer| {
            let keep = layer.layer_type.fits(symbol_type);
            if !keep {
                warn!(
                    "Dropping symbol layer {:?} from {:?} symbol",
                    layer.layer_type, symbol_type
                );
            }
            keep
        });
        Ok(definition)
    }
}

//! Scale-band symbology rules and layer naming.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::model::{GeometryKind, ObjectType};
use crate::schema::SchemaCatalog;
use crate::style::{decode_symbol, StyleCatalog, SUBTYPE_SEPARATOR};
use crate::symbol::SymbolDefinition;

/// Enumeration label of values withheld from publication.
pub const NON_PUBLIC: &str = "neveřejný údaj";

/// Appended to the name of a layer for which no band resolved a style.
pub const STYLE_NOT_FOUND: &str = " (nenalezen styl)";

/// Enumeration codes tried, in order, for a default sub-type label.
const DEFAULT_SUBTYPE_CODES: [&str; 3] = ["0", "98", "99"];

/// A map scale range; values are scale denominators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScaleBand {
    pub id: &'static str,
    pub min_scale: u32,
    pub max_scale: u32,
}

impl ScaleBand {
    /// `"0 - 1:500"` for the most detailed band, `"1:501 - 1:5000"` otherwise.
    pub fn range_label(&self) -> String {
        if self.min_scale == 0 {
            format!("0 - 1:{}", self.max_scale)
        } else {
            format!("1:{} - 1:{}", self.min_scale, self.max_scale)
        }
    }
}

pub const SCALE_BANDS: [ScaleBand; 4] = [
    ScaleBand { id: "500", min_scale: 0, max_scale: 500 },
    ScaleBand { id: "5000", min_scale: 501, max_scale: 5000 },
    ScaleBand { id: "10000", min_scale: 5001, max_scale: 10000 },
    ScaleBand { id: "25000", min_scale: 10001, max_scale: 25000 },
];

/// A symbol bound to one scale band.
///
/// `minimum_scale` is the most zoomed-out denominator at which the rule draws
/// and `maximum_scale` the most zoomed-in one, so they mirror the band's bounds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaleRule {
    pub band: ScaleBand,
    pub minimum_scale: u32,
    pub maximum_scale: u32,
    pub label: String,
    pub description: String,
    pub symbol: SymbolDefinition,
}

impl ScaleRule {
    pub fn new(band: ScaleBand, symbol: SymbolDefinition) -> Self {
        let label = band.range_label();
        Self {
            band,
            minimum_scale: band.max_scale,
            maximum_scale: band.min_scale,
            description: label.clone(),
            label,
            symbol,
        }
    }

    /// Zero on either bound leaves that side open.
    pub fn visible_at(&self, scale_denominator: u32) -> bool {
        (self.maximum_scale == 0 || scale_denominator > self.maximum_scale)
            && (self.minimum_scale == 0 || scale_denominator <= self.minimum_scale)
    }
}

/// Every name derived for one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerNames {
    /// `"{code} {label}_{kind}"`, without sub-type.
    pub base: String,
    /// `"{code} {label}"` plus the sub-type when one applies.
    pub name: String,
    /// `name` followed by the geometry kind.
    pub base_with_subtype: String,
    /// Name of the layer that carries the scale rules.
    pub scale_layer: String,
}

impl LayerNames {
    pub fn new(
        object_type: &ObjectType,
        tag_name: Option<&str>,
        type_value: Option<&str>,
        kind: GeometryKind,
        schema: &SchemaCatalog,
    ) -> Self {
        let name = layer_name(object_type, tag_name, type_value, schema);
        Self {
            base: format!("{}_{}", object_type.display_name(), kind),
            base_with_subtype: format!("{}_{}", name, kind),
            scale_layer: format!("{}_{}", name, object_type.config_label()),
            name,
        }
    }

    pub fn second_layer(&self, second_kind: GeometryKind) -> String {
        format!("{}_{}", self.name, second_kind)
    }
}

/// Display name of a bucket's layers.
///
/// A published sub-type label is appended when its attribute has an
/// enumeration. Otherwise the attribute's default label is used: code `"0"`
/// unless it is non-public, else `"98"`, else `"99"`.
pub fn layer_name(
    object_type: &ObjectType,
    tag_name: Option<&str>,
    type_value: Option<&str>,
    schema: &SchemaCatalog,
) -> String {
    let base = object_type.display_name();
    let Some(labels) = tag_name.and_then(|tag| schema.enumeration(tag)) else {
        return base;
    };

    if let Some(type_value) = type_value.filter(|v| *v != NON_PUBLIC) {
        return format!("{}{}{}", base, SUBTYPE_SEPARATOR, type_value);
    }

    let default = DEFAULT_SUBTYPE_CODES
        .iter()
        .filter_map(|code| labels.get(*code).map(|label| (*code, label)))
        .find(|(code, label)| !(*code == "0" && label.as_str() == NON_PUBLIC))
        .map(|(_, label)| label);

    match default {
        Some(label) if !label.is_empty() => format!("{}{}{}", base, SUBTYPE_SEPARATOR, label),
        _ => base,
    }
}

/// Builds the per-band rule set for a layer.
#[derive(Debug, Clone)]
pub struct ScaleRuleResolver {
    styles: Arc<StyleCatalog>,
}

impl ScaleRuleResolver {
    pub fn new(styles: Arc<StyleCatalog>) -> Self {
        Self { styles }
    }

    /// One rule per band that resolves a style, in band order. Each band tries
    /// `"{base_with_subtype}_{band}"` through the catalog's fallbacks and then
    /// `"{base}_{band}"`. The first table entry found decides the band: if its
    /// symbol does not decode, the band gets no rule.
    pub fn resolve(&self, names: &LayerNames) -> Vec<ScaleRule> {
        SCALE_BANDS
            .iter()
            .filter_map(|band| {
                let key = format!("{}_{}", names.base_with_subtype, band.id);
                let base_key = format!("{}_{}", names.base, band.id);
                let found = [key.as_str(), base_key.as_str()]
                    .into_iter()
                    .find_map(|k| self.styles.resolve(k).map(|(raw, _)| (k, raw)));
                let Some((found, raw)) = found else {
                    debug!("No style for '{}'", key);
                    return None;
                };
                decode_symbol(found, raw).map(|symbol| ScaleRule::new(*band, symbol))
            })
            .collect()
    }
}

use std::fmt;
use std::sync::Arc;

use geo_types::Geometry;

use crate::scale::ScaleRule;

/// Name of the implicit identity field that leads every field list.
pub const IDENTITY_FIELD: &str = "gml_id";

/// Coarse geometry classification used for layer grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
}

impl GeometryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryKind::Point => "Point",
            GeometryKind::LineString => "LineString",
            GeometryKind::Polygon => "Polygon",
        }
    }

    /// Maps a concrete geometry to its kind. Multi-part variants collapse onto
    /// their single-part kind; anything else is unclassifiable.
    pub fn classify(geometry: &Geometry<f64>) -> Option<Self> {
        match geometry {
            Geometry::Point(_) | Geometry::MultiPoint(_) => Some(GeometryKind::Point),
            Geometry::LineString(_) | Geometry::MultiLineString(_) | Geometry::Line(_) => {
                Some(GeometryKind::LineString)
            }
            Geometry::Polygon(_)
            | Geometry::MultiPolygon(_)
            | Geometry::Rect(_)
            | Geometry::Triangle(_) => Some(GeometryKind::Polygon),
            Geometry::GeometryCollection(_) => None,
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed geometry together with its GML identity.
///
/// Records are shared through `Arc`; two lookups of the same identity within
/// one session hand out the same allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryRecord {
    pub identity: String,
    pub geometry: Geometry<f64>,
    pub kind: GeometryKind,
}

/// Object type header of a data object (`ObjektovyTypNazev`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectType {
    pub code_base: String,
    pub code_suffix: String,
    pub label: String,
}

impl ObjectType {
    /// Numeric part of `code_base` (the first seven characters are a fixed prefix).
    pub fn code_num(&self) -> &str {
        match self.code_base.char_indices().nth(7) {
            Some((idx, _)) => &self.code_base[idx..],
            None => "",
        }
    }

    /// Geometry label configured for the object's `code_suffix`.
    pub fn config_label(&self) -> &'static str {
        match self.code_suffix.as_str() {
            "01" => "Point",
            "02" => "LineString",
            "03" => "Polygon",
            "04" => "DB",
            _ => "",
        }
    }

    /// `"{code} {label}"`, the key used by the type mapping table and layer names.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.code_num(), self.label)
    }
}

/// Hierarchical address of a layer group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupPath {
    parts: Vec<String>,
}

impl GroupPath {
    pub fn new(parts: Vec<String>) -> Self {
        Self { parts }
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn depth(&self) -> usize {
        self.parts.len()
    }

    /// Every ancestor path including this one, root first.
    pub fn prefixes(&self) -> impl Iterator<Item = GroupPath> + '_ {
        (1..=self.parts.len()).map(|n| GroupPath::new(self.parts[..n].to_vec()))
    }
}

impl fmt::Display for GroupPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parts.join("/"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    /// Schema documentation label, or the raw name when undocumented.
    pub alias: String,
}

impl FieldDescriptor {
    pub fn identity() -> Self {
        Self {
            name: IDENTITY_FIELD.to_string(),
            alias: IDENTITY_FIELD.to_string(),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.name == IDENTITY_FIELD
    }
}

#[derive(Debug, Clone)]
pub struct Feature {
    /// Values in field order; index 0 is the geometry identity.
    pub attributes: Vec<Option<String>>,
    pub geometry: Arc<GeometryRecord>,
}

impl Feature {
    pub fn id(&self) -> &str {
        &self.geometry.identity
    }
}

/// Everything the host needs to materialise one map layer.
#[derive(Debug, Clone)]
pub struct LayerDescriptor {
    pub name: String,
    pub kind: GeometryKind,
    pub fields: Vec<FieldDescriptor>,
    pub features: Vec<Feature>,
    pub rules: Vec<ScaleRule>,
    pub group_path: GroupPath,
    pub visible: bool,
    /// Set when no scale band resolved a style.
    pub style_missing: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{line_string, point, polygon, MultiPolygon};

    #[test]
    fn test_object_type_code_num_strips_prefix() {
        let obj = ObjectType {
            code_base: "ObjTyp_0107".to_string(),
            code_suffix: "03".to_string(),
            label: "Plot".to_string(),
        };
        assert_eq!(obj.code_num(), "0107");
        assert_eq!(obj.display_name(), "0107 Plot");
        assert_eq!(obj.config_label(), "Polygon");
    }

    #[test]
    fn test_object_type_short_code_base() {
        let obj = ObjectType {
            code_base: "abc".to_string(),
            code_suffix: "99".to_string(),
            label: "X".to_string(),
        };
        assert_eq!(obj.code_num(), "");
        assert_eq!(obj.config_label(), "");
    }

    #[test]
    fn test_geometry_kind_collapses_multi_parts() {
        let poly = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)];
        let multi = Geometry::MultiPolygon(MultiPolygon(vec![poly.clone()]));
        assert_eq!(GeometryKind::classify(&Geometry::Polygon(poly)), Some(GeometryKind::Polygon));
        assert_eq!(GeometryKind::classify(&multi), Some(GeometryKind::Polygon));
        assert_eq!(
            GeometryKind::classify(&Geometry::Point(point!(x: 1.0, y: 2.0))),
            Some(GeometryKind::Point)
        );
        let line = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)];
        assert_eq!(
            GeometryKind::classify(&Geometry::LineString(line)),
            Some(GeometryKind::LineString)
        );
    }

    #[test]
    fn test_group_path_prefixes() {
        let path = GroupPath::new(vec!["a".into(), "b".into(), "c".into()]);
        let prefixes: Vec<String> = path.prefixes().map(|p| p.to_string()).collect();
        assert_eq!(prefixes, vec!["a", "a/b", "a/b/c"]);
        assert_eq!(path.depth(), 3);
    }
}

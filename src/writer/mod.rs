use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use geo_types::{Coord, Geometry, LineString, Polygon};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::error::Result;
use crate::model::{FieldDescriptor, GroupPath, LayerDescriptor};
use crate::scale::ScaleRule;
use crate::task::LayerSink;

/// S-JTSK / Krovak East North, the reference system of JVF DTM data.
pub const DEFAULT_CRS: &str = "EPSG:5514";

pub const MANIFEST_FILE: &str = "layers.json";

#[derive(Debug, Serialize)]
struct ManifestLayer {
    name: String,
    file: String,
    group: Vec<String>,
    kind: String,
    visible: bool,
    style_missing: bool,
    features: usize,
    fields: Vec<ManifestField>,
    rules: Vec<ScaleRule>,
}

#[derive(Debug, Serialize)]
struct ManifestField {
    name: String,
    alias: String,
}

impl From<&FieldDescriptor> for ManifestField {
    fn from(field: &FieldDescriptor) -> Self {
        Self {
            name: field.name.clone(),
            alias: field.alias.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    crs: &'a str,
    groups: &'a [Vec<String>],
    layers: &'a [ManifestLayer],
}

/// Writes each layer as a GeoJSON FeatureCollection and describes the layer
/// tree in a `layers.json` manifest.
pub struct GeoJsonSink {
    output_dir: PathBuf,
    crs: String,
    groups: Vec<Vec<String>>,
    layers: Vec<ManifestLayer>,
}

impl GeoJsonSink {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir)?;
        Ok(Self {
            output_dir,
            crs: DEFAULT_CRS.to_string(),
            groups: Vec::new(),
            layers: Vec::new(),
        })
    }

    pub fn with_crs(mut self, crs: &str) -> Self {
        self.crs = crs.to_string();
        self
    }

    /// Writes the manifest. Returns its path.
    pub fn finish(self) -> Result<PathBuf> {
        let path = self.output_dir.join(MANIFEST_FILE);
        let manifest = Manifest {
            crs: &self.crs,
            groups: &self.groups,
            layers: &self.layers,
        };
        serde_json::to_writer_pretty(BufWriter::new(File::create(&path)?), &manifest)?;
        info!("Written manifest with {} layers: {:?}", self.layers.len(), path);
        Ok(path)
    }

    fn layer_file_name(&self, layer: &LayerDescriptor) -> String {
        format!("{:04}_{}.geojson", self.layers.len() + 1, sanitize(&layer.name))
    }
}

impl LayerSink for GeoJsonSink {
    fn add_group(&mut self, path: &GroupPath) -> Result<()> {
        self.groups.push(path.parts().to_vec());
        Ok(())
    }

    fn add_layer(&mut self, layer: &LayerDescriptor) -> Result<()> {
        let file = self.layer_file_name(layer);
        let output_path = self.output_dir.join(&file);
        let collection = feature_collection(layer, &self.crs);
        serde_json::to_writer(BufWriter::new(File::create(&output_path)?), &collection)?;
        info!("Written layer {} ({} features): {:?}", layer.name, layer.features.len(), output_path);

        self.layers.push(ManifestLayer {
            name: layer.name.clone(),
            file,
            group: layer.group_path.parts().to_vec(),
            kind: layer.kind.to_string(),
            visible: layer.visible,
            style_missing: layer.style_missing,
            features: layer.features.len(),
            fields: layer.fields.iter().map(ManifestField::from).collect(),
            rules: layer.rules.clone(),
        });
        Ok(())
    }
}

/// Keeps letters, digits and a few separators; anything else becomes `_`.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn feature_collection(layer: &LayerDescriptor, crs: &str) -> Value {
    let features: Vec<Value> = layer
        .features
        .iter()
        .map(|feature| {
            let properties: Map<String, Value> = layer
                .fields
                .iter()
                .zip(&feature.attributes)
                .map(|(field, value)| {
                    let value = value.clone().map(Value::String).unwrap_or(Value::Null);
                    (field.name.clone(), value)
                })
                .collect();
            json!({
                "type": "Feature",
                "id": feature.id(),
                "geometry": geometry_json(&feature.geometry.geometry),
                "properties": properties,
            })
        })
        .collect();

    json!({
        "type": "FeatureCollection",
        "name": layer.name,
        "crs": { "type": "name", "properties": { "name": crs } },
        "features": features,
    })
}

fn position(c: &Coord<f64>) -> Value {
    json!([c.x, c.y])
}

fn line_coords(line: &LineString<f64>) -> Value {
    Value::Array(line.coords().map(position).collect())
}

fn polygon_coords(polygon: &Polygon<f64>) -> Value {
    let rings = std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(line_coords)
        .collect();
    Value::Array(rings)
}

fn geometry_json(geometry: &Geometry<f64>) -> Value {
    match geometry {
        Geometry::Point(p) => json!({ "type": "Point", "coordinates": position(&p.0) }),
        Geometry::Line(l) => json!({
            "type": "LineString",
            "coordinates": [position(&l.start), position(&l.end)],
        }),
        Geometry::LineString(l) => json!({ "type": "LineString", "coordinates": line_coords(l) }),
        Geometry::Polygon(p) => json!({ "type": "Polygon", "coordinates": polygon_coords(p) }),
        Geometry::MultiPoint(mp) => json!({
            "type": "MultiPoint",
            "coordinates": mp.0.iter().map(|p| position(&p.0)).collect::<Vec<_>>(),
        }),
        Geometry::MultiLineString(ml) => json!({
            "type": "MultiLineString",
            "coordinates": ml.0.iter().map(line_coords).collect::<Vec<_>>(),
        }),
        Geometry::MultiPolygon(mp) => json!({
            "type": "MultiPolygon",
            "coordinates": mp.0.iter().map(polygon_coords).collect::<Vec<_>>(),
        }),
        Geometry::Rect(r) => geometry_json(&Geometry::Polygon(r.to_polygon())),
        Geometry::Triangle(t) => geometry_json(&Geometry::Polygon(t.to_polygon())),
        Geometry::GeometryCollection(gc) => json!({
            "type": "GeometryCollection",
            "geometries": gc.0.iter().map(geometry_json).collect::<Vec<_>>(),
        }),
    }
}

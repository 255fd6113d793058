//! GML geometry extraction with a per-session identity cache.
//!
//! Every descendant of a geometry container that carries a `gml:id` is turned
//! into a [`GeometryRecord`]. The first occurrence of an identity is parsed and
//! cached; later occurrences hand out the cached `Arc` without touching the XML.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::Arc;

use geo::Validation;
use geo_types::{
    Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon,
};
use roxmltree::{Descendants, Node};
use tracing::{debug, warn};

use crate::error::{JvfError, Result};
use crate::model::{GeometryKind, GeometryRecord};

const GML_NS_PREFIX: &str = "http://www.opengis.net/gml";

/// Angular step used when stroking circular arcs.
const ARC_STEP: f64 = PI / 45.0;

#[derive(Debug, Default)]
pub struct GeometryResolver {
    cache: HashMap<String, Arc<GeometryRecord>>,
    hits: usize,
    failures: usize,
}

impl GeometryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lazily yields the geometries below `container`. Consumers may stop early;
    /// unvisited elements are never parsed.
    pub fn process<'r, 'a, 'input>(
        &'r mut self,
        container: Option<Node<'a, 'input>>,
    ) -> Geometries<'r, 'a, 'input> {
        let nodes = container.map(|c| {
            let mut nodes = c.descendants();
            // descendants() starts with the container itself
            nodes.next();
            nodes
        });
        Geometries {
            resolver: self,
            nodes,
        }
    }

    pub fn cache_hits(&self) -> usize {
        self.hits
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    fn resolve(&mut self, node: Node, identity: &str) -> Option<Arc<GeometryRecord>> {
        if let Some(record) = self.cache.get(identity) {
            self.hits += 1;
            return Some(Arc::clone(record));
        }

        let record = match parse_record(node, identity) {
            Ok(record) => Arc::new(record),
            Err(e) => {
                self.failures += 1;
                warn!("Skipping geometry '{}': {}", identity, e);
                return None;
            }
        };

        if !identity.is_empty() {
            self.cache.insert(identity.to_string(), Arc::clone(&record));
        }
        Some(record)
    }
}

pub struct Geometries<'r, 'a, 'input> {
    resolver: &'r mut GeometryResolver,
    nodes: Option<Descendants<'a, 'input>>,
}

impl Iterator for Geometries<'_, '_, '_> {
    type Item = Arc<GeometryRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let nodes = self.nodes.as_mut()?;
        for node in nodes.by_ref() {
            if !node.is_element() {
                continue;
            }
            let Some(identity) = gml_id(node) else {
                continue;
            };
            if let Some(record) = self.resolver.resolve(node, identity) {
                return Some(record);
            }
        }
        None
    }
}

/// The `gml:id` of an element, for any GML namespace version.
pub fn gml_id<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    node.attributes()
        .find(|a| {
            a.name() == "id"
                && a.namespace()
                    .is_some_and(|ns| ns.starts_with(GML_NS_PREFIX))
        })
        .map(|a| a.value())
}

fn parse_record(node: Node, identity: &str) -> Result<GeometryRecord> {
    let geometry = parse_gml(node)?;
    let kind = GeometryKind::classify(&geometry).ok_or_else(|| {
        JvfError::InvalidGeometry(format!("unclassifiable <{}>", node.tag_name().name()))
    })?;
    validate(&geometry)?;
    debug!("Parsed {} '{}'", kind, identity);
    Ok(GeometryRecord {
        identity: identity.to_string(),
        geometry,
        kind,
    })
}

/// Converts a GML geometry element into a planar geometry.
pub fn parse_gml(node: Node) -> Result<Geometry<f64>> {
    let geometry = match node.tag_name().name() {
        "Point" => Geometry::Point(Point(single_coord(node)?)),
        "LineString" | "Curve" | "CompositeCurve" | "OrientableCurve" | "LineStringSegment"
        | "Arc" | "ArcString" | "Circle" => Geometry::LineString(curve(node)?),
        "Polygon" | "Surface" | "PolygonPatch" => Geometry::Polygon(polygon(node)?),
        "MultiPoint" => {
            let points = members(node, &["pointMember", "pointMembers"])
                .map(|p| single_coord(p).map(Point))
                .collect::<Result<Vec<_>>>()?;
            Geometry::MultiPoint(MultiPoint(points))
        }
        "MultiCurve" | "MultiLineString" => {
            let lines = members(node, &["curveMember", "curveMembers", "lineStringMember"])
                .map(curve)
                .collect::<Result<Vec<_>>>()?;
            Geometry::MultiLineString(MultiLineString(lines))
        }
        "MultiSurface" | "MultiPolygon" | "CompositeSurface" => {
            let polygons = members(
                node,
                &["surfaceMember", "surfaceMembers", "polygonMember"],
            )
            .map(polygon)
            .collect::<Result<Vec<_>>>()?;
            Geometry::MultiPolygon(MultiPolygon(polygons))
        }
        other => {
            return Err(JvfError::InvalidGeometry(format!(
                "unsupported GML element <{}>",
                other
            )))
        }
    };
    Ok(geometry)
}

fn child_elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

fn child<'a, 'input>(node: Node<'a, 'input>, local: &str) -> Option<Node<'a, 'input>> {
    child_elements(node).find(|n| n.tag_name().name() == local)
}

/// Geometry elements held by the given member properties.
fn members<'a, 'input>(
    node: Node<'a, 'input>,
    properties: &'static [&'static str],
) -> impl Iterator<Item = Node<'a, 'input>> {
    child_elements(node)
        .filter(move |n| properties.iter().any(|p| *p == n.tag_name().name()))
        .flat_map(|n| child_elements(n))
}

fn srs_dimension(node: Node) -> usize {
    node.ancestors()
        .filter_map(|n| n.attribute("srsDimension"))
        .find_map(|d| d.trim().parse::<usize>().ok())
        .filter(|d| *d >= 2)
        .unwrap_or(2)
}

fn parse_numbers(text: &str) -> Result<Vec<f64>> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.parse::<f64>()
                .map_err(|_| JvfError::InvalidGeometry(format!("bad coordinate '{}'", t)))
        })
        .collect()
}

fn to_coords(values: &[f64], dim: usize) -> Result<Vec<Coord<f64>>> {
    if values.len() % dim != 0 {
        return Err(JvfError::InvalidGeometry(format!(
            "{} ordinates do not split into {}D positions",
            values.len(),
            dim
        )));
    }
    Ok(values
        .chunks(dim)
        .map(|c| Coord { x: c[0], y: c[1] })
        .collect())
}

/// Positions directly held by `node` (`posList`, `pos`, `coordinates`, `pointProperty`).
fn positions(node: Node) -> Result<Vec<Coord<f64>>> {
    if let Some(list) = child(node, "posList") {
        return to_coords(&parse_numbers(list.text().unwrap_or(""))?, srs_dimension(list));
    }
    if let Some(coords) = child(node, "coordinates") {
        let text = coords.text().unwrap_or("");
        return text
            .split_whitespace()
            .map(|tuple| {
                let values = parse_numbers(tuple)?;
                if values.len() < 2 {
                    return Err(JvfError::InvalidGeometry(format!("bad tuple '{}'", tuple)));
                }
                Ok(Coord {
                    x: values[0],
                    y: values[1],
                })
            })
            .collect();
    }

    let mut coords = Vec::new();
    for item in child_elements(node) {
        match item.tag_name().name() {
            "pos" => {
                let dim = srs_dimension(item);
                let values = parse_numbers(item.text().unwrap_or(""))?;
                coords.extend(to_coords(&values, dim)?);
            }
            "pointProperty" | "pointRep" => {
                if let Some(point) = child(item, "Point") {
                    coords.push(single_coord(point)?);
                }
            }
            _ => {}
        }
    }
    Ok(coords)
}

fn single_coord(node: Node) -> Result<Coord<f64>> {
    let coords = positions(node)?;
    match coords.as_slice() {
        [c] => Ok(*c),
        _ => Err(JvfError::InvalidGeometry(format!(
            "point with {} positions",
            coords.len()
        ))),
    }
}

/// Appends `part` to `line`, skipping the shared junction position.
fn join(line: &mut Vec<Coord<f64>>, part: Vec<Coord<f64>>) {
    let skip = usize::from(matches!((line.last(), part.first()), (Some(a), Some(b)) if a == b));
    line.extend(part.into_iter().skip(skip));
}

fn curve(node: Node) -> Result<LineString<f64>> {
    curve_coords(node).map(LineString::from)
}

fn curve_coords(node: Node) -> Result<Vec<Coord<f64>>> {
    match node.tag_name().name() {
        "LineString" | "LineStringSegment" | "LinearRing" | "GeodesicString" => positions(node),
        "Arc" | "ArcString" => stroke_arc_string(&positions(node)?),
        "Circle" => {
            let coords = positions(node)?;
            match coords.as_slice() {
                [a, b, c] => Ok(stroke_circle(*a, *b, *c)),
                _ => Err(JvfError::InvalidGeometry("circle needs three positions".into())),
            }
        }
        "Curve" => {
            let segments = child(node, "segments").ok_or_else(|| {
                JvfError::InvalidGeometry("curve without segments".into())
            })?;
            let mut coords = Vec::new();
            for segment in child_elements(segments) {
                join(&mut coords, curve_coords(segment)?);
            }
            Ok(coords)
        }
        "CompositeCurve" | "Ring" => {
            let mut coords = Vec::new();
            for member in members(node, &["curveMember"]) {
                join(&mut coords, curve_coords(member)?);
            }
            Ok(coords)
        }
        "OrientableCurve" => {
            let base = members(node, &["baseCurve"]).next().ok_or_else(|| {
                JvfError::InvalidGeometry("orientable curve without base".into())
            })?;
            let mut coords = curve_coords(base)?;
            if node.attribute("orientation") == Some("-") {
                coords.reverse();
            }
            Ok(coords)
        }
        other => Err(JvfError::InvalidGeometry(format!(
            "unsupported curve <{}>",
            other
        ))),
    }
}

fn polygon(node: Node) -> Result<Polygon<f64>> {
    if node.tag_name().name() == "Surface" {
        let patch = child(node, "patches")
            .and_then(|p| child_elements(p).next())
            .ok_or_else(|| JvfError::InvalidGeometry("surface without patches".into()))?;
        return polygon(patch);
    }

    let ring = |property: Node| -> Result<LineString<f64>> {
        let ring = child_elements(property)
            .next()
            .ok_or_else(|| JvfError::InvalidGeometry("empty ring property".into()))?;
        let coords = curve_coords(ring)?;
        if coords.len() < 4 || coords.first() != coords.last() {
            return Err(JvfError::InvalidGeometry("ring is not closed".into()));
        }
        Ok(LineString::from(coords))
    };

    let exterior = child(node, "exterior")
        .ok_or_else(|| JvfError::InvalidGeometry("polygon without exterior".into()))
        .and_then(ring)?;
    let interiors = child_elements(node)
        .filter(|n| n.tag_name().name() == "interior")
        .map(ring)
        .collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn circumcircle(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>) -> Option<(Coord<f64>, f64)> {
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    if d.abs() < 1e-12 {
        return None;
    }
    let a2 = a.x * a.x + a.y * a.y;
    let b2 = b.x * b.x + b.y * b.y;
    let c2 = c.x * c.x + c.y * c.y;
    let center = Coord {
        x: (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d,
        y: (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d,
    };
    let radius = ((a.x - center.x).powi(2) + (a.y - center.y).powi(2)).sqrt();
    Some((center, radius))
}

fn normalize_angle(angle: f64) -> f64 {
    let a = angle.rem_euclid(2.0 * PI);
    if a == 0.0 {
        2.0 * PI
    } else {
        a
    }
}

fn stroke(center: Coord<f64>, radius: f64, start: f64, sweep: f64) -> Vec<Coord<f64>> {
    let steps = (sweep.abs() / ARC_STEP).ceil().max(1.0) as usize;
    (0..=steps)
        .map(|i| {
            let angle = start + sweep * i as f64 / steps as f64;
            Coord {
                x: center.x + radius * angle.cos(),
                y: center.y + radius * angle.sin(),
            }
        })
        .collect()
}

/// Linearises a circular arc through three positions.
fn stroke_arc(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>) -> Vec<Coord<f64>> {
    let Some((center, radius)) = circumcircle(a, b, c) else {
        return vec![a, b, c];
    };
    let angle = |p: Coord<f64>| (p.y - center.y).atan2(p.x - center.x);
    let counter_clockwise = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x) > 0.0;
    let start = angle(a);
    let sweep = if counter_clockwise {
        normalize_angle(angle(c) - start)
    } else {
        -normalize_angle(start - angle(c))
    };
    let mut coords = stroke(center, radius, start, sweep);
    // pin the exact end positions
    if let Some(first) = coords.first_mut() {
        *first = a;
    }
    if let Some(last) = coords.last_mut() {
        *last = c;
    }
    coords
}

/// Consecutive arcs share their end positions, so a valid string holds
/// `2n + 1` positions.
fn stroke_arc_string(coords: &[Coord<f64>]) -> Result<Vec<Coord<f64>>> {
    if coords.len() < 3 || (coords.len() - 1) % 2 != 0 {
        return Err(JvfError::InvalidGeometry(format!(
            "arc string with {} positions",
            coords.len()
        )));
    }
    let mut out = Vec::new();
    for arc in coords.windows(3).step_by(2) {
        join(&mut out, stroke_arc(arc[0], arc[1], arc[2]));
    }
    Ok(out)
}

fn stroke_circle(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>) -> Vec<Coord<f64>> {
    let Some((center, radius)) = circumcircle(a, b, c) else {
        return vec![a, b, c];
    };
    let counter_clockwise = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x) > 0.0;
    let start = (a.y - center.y).atan2(a.x - center.x);
    let sweep = if counter_clockwise { 2.0 * PI } else { -2.0 * PI };
    let mut coords = stroke(center, radius, start, sweep);
    if let (Some(first), Some(last)) = (coords.first().copied(), coords.last_mut()) {
        *last = first;
    }
    coords
}

/// Rejects empty collections and anything `geo` does not consider valid
/// (self-intersecting rings, holes outside their shell, non-finite ordinates).
fn validate(geometry: &Geometry<f64>) -> Result<()> {
    let empty = match geometry {
        Geometry::MultiPoint(mp) => mp.0.is_empty(),
        Geometry::MultiLineString(ml) => ml.0.is_empty(),
        Geometry::MultiPolygon(mp) => mp.0.is_empty(),
        _ => false,
    };
    if empty {
        return Err(JvfError::InvalidGeometry("empty geometry collection".into()));
    }
    geometry
        .check_validation()
        .map_err(|e| JvfError::InvalidGeometry(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use roxmltree::Document;

    fn wrap(inner: &str) -> String {
        format!(
            r#"<GeometrieObjektu xmlns:gml="http://www.opengis.net/gml/3.2">{}</GeometrieObjektu>"#,
            inner
        )
    }

    #[test]
    fn test_point_and_polygon() {
        let xml = wrap(
            r#"<gml:Point gml:id="P1" srsDimension="2"><gml:pos>-700000.5 -1000000.25</gml:pos></gml:Point>
               <gml:Polygon gml:id="S1"><gml:exterior><gml:LinearRing>
                 <gml:posList>0 0 10 0 10 10 0 10 0 0</gml:posList>
               </gml:LinearRing></gml:exterior></gml:Polygon>"#,
        );
        let doc = Document::parse(&xml).unwrap();
        let mut resolver = GeometryResolver::new();
        let records: Vec<_> = resolver.process(Some(doc.root_element())).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].identity, "P1");
        assert_eq!(records[0].kind, GeometryKind::Point);
        assert_eq!(
            records[0].geometry,
            Geometry::Point(Point::new(-700000.5, -1000000.25))
        );
        assert_eq!(records[1].kind, GeometryKind::Polygon);
    }

    #[test]
    fn test_identity_cache_returns_same_allocation() {
        let xml = wrap(
            r#"<gml:LineString gml:id="L1"><gml:posList>0 0 1 1</gml:posList></gml:LineString>"#,
        );
        let doc = Document::parse(&xml).unwrap();
        let mut resolver = GeometryResolver::new();
        let first = resolver.process(Some(doc.root_element())).next().unwrap();
        let second = resolver.process(Some(doc.root_element())).next().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.cache_hits(), 1);
        assert_eq!(resolver.cached(), 1);
    }

    #[test]
    fn test_cache_hit_skips_parsing() {
        // The second document reuses the identity with broken content; the cached
        // record is returned instead of a parse failure.
        let good = wrap(r#"<gml:Point gml:id="X"><gml:pos>1 2</gml:pos></gml:Point>"#);
        let bad = wrap(r#"<gml:Point gml:id="X"><gml:pos>oops</gml:pos></gml:Point>"#);
        let good_doc = Document::parse(&good).unwrap();
        let bad_doc = Document::parse(&bad).unwrap();
        let mut resolver = GeometryResolver::new();
        let a = resolver.process(Some(good_doc.root_element())).next().unwrap();
        let b = resolver.process(Some(bad_doc.root_element())).next().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(resolver.failures(), 0);
    }

    #[test]
    fn test_invalid_geometry_is_skipped() {
        let xml = wrap(
            r#"<gml:LineString gml:id="BAD"><gml:posList>0 0</gml:posList></gml:LineString>
               <gml:Point gml:id="OK"><gml:pos>5 5</gml:pos></gml:Point>"#,
        );
        let doc = Document::parse(&xml).unwrap();
        let mut resolver = GeometryResolver::new();
        let ids: Vec<String> = resolver
            .process(Some(doc.root_element()))
            .map(|r| r.identity.clone())
            .collect();
        assert_eq!(ids, vec!["OK"]);
        assert_eq!(resolver.failures(), 1);
    }

    #[test]
    fn test_empty_identity_is_not_cached() {
        let xml = wrap(r#"<gml:Point gml:id=""><gml:pos>1 1</gml:pos></gml:Point>"#);
        let doc = Document::parse(&xml).unwrap();
        let mut resolver = GeometryResolver::new();
        let a = resolver.process(Some(doc.root_element())).next().unwrap();
        let b = resolver.process(Some(doc.root_element())).next().unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(resolver.cached(), 0);
    }

    #[test]
    fn test_missing_container_yields_nothing() {
        let mut resolver = GeometryResolver::new();
        assert_eq!(resolver.process(None).count(), 0);
    }

    #[test]
    fn test_early_termination_leaves_rest_unparsed() {
        let xml = wrap(
            r#"<gml:Point gml:id="A"><gml:pos>1 1</gml:pos></gml:Point>
               <gml:Point gml:id="B"><gml:pos>2 2</gml:pos></gml:Point>
               <gml:Point gml:id="C"><gml:pos>3 3</gml:pos></gml:Point>"#,
        );
        let doc = Document::parse(&xml).unwrap();
        let mut resolver = GeometryResolver::new();
        let taken: Vec<_> = resolver.process(Some(doc.root_element())).take(2).collect();
        assert_eq!(taken.len(), 2);
        assert_eq!(resolver.cached(), 2);
    }

    #[test]
    fn test_curve_with_arc_segment() {
        let xml = wrap(
            r#"<gml:Curve gml:id="C1"><gml:segments>
                 <gml:LineStringSegment><gml:posList>-10 0 -1 0</gml:posList></gml:LineStringSegment>
                 <gml:Arc><gml:posList>-1 0 0 1 1 0</gml:posList></gml:Arc>
               </gml:segments></gml:Curve>"#,
        );
        let doc = Document::parse(&xml).unwrap();
        let mut resolver = GeometryResolver::new();
        let record = resolver.process(Some(doc.root_element())).next().unwrap();
        assert_eq!(record.kind, GeometryKind::LineString);
        let Geometry::LineString(line) = &record.geometry else {
            panic!("expected a line string");
        };
        assert_eq!(line.0.first(), Some(&Coord { x: -10.0, y: 0.0 }));
        assert_eq!(line.0.last(), Some(&Coord { x: 1.0, y: 0.0 }));
        // the stroked arc stays on the unit circle
        for c in &line.0[1..] {
            assert!(((c.x * c.x + c.y * c.y).sqrt() - 1.0).abs() < 1e-9);
        }
        assert!(line.0.len() > 4);
        // the arc passes over the top of the circle
        assert!(line.0.iter().any(|c| c.y > 0.99));
    }

    #[test]
    fn test_multi_surface_collapses_to_polygon_kind() {
        let xml = wrap(
            r#"<gml:MultiSurface gml:id="MS"><gml:surfaceMember><gml:Polygon>
                 <gml:exterior><gml:LinearRing><gml:posList srsDimension="3">0 0 5 1 0 5 1 1 5 0 0 5</gml:posList></gml:LinearRing></gml:exterior>
               </gml:Polygon></gml:surfaceMember></gml:MultiSurface>"#,
        );
        let doc = Document::parse(&xml).unwrap();
        let mut resolver = GeometryResolver::new();
        let records: Vec<_> = resolver.process(Some(doc.root_element())).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, GeometryKind::Polygon);
        let Geometry::MultiPolygon(mp) = &records[0].geometry else {
            panic!("expected a multipolygon");
        };
        assert_eq!(mp.0[0].exterior().0.len(), 4);
    }

    #[test]
    fn test_unclosed_ring_is_invalid() {
        let xml = wrap(
            r#"<gml:Polygon gml:id="U"><gml:exterior><gml:LinearRing>
                 <gml:posList>0 0 1 0 1 1 0 1</gml:posList>
               </gml:LinearRing></gml:exterior></gml:Polygon>"#,
        );
        let doc = Document::parse(&xml).unwrap();
        let node = doc.root_element().first_element_child().unwrap();
        assert!(parse_record(node, "U").is_err());
    }

    #[test]
    fn test_self_intersecting_polygon_is_skipped() {
        let xml = wrap(
            r#"<gml:Polygon gml:id="BOW"><gml:exterior><gml:LinearRing>
                 <gml:posList>0 0 10 10 10 0 0 10 0 0</gml:posList>
               </gml:LinearRing></gml:exterior></gml:Polygon>
               <gml:Point gml:id="OK"><gml:pos>5 5</gml:pos></gml:Point>"#,
        );
        let doc = Document::parse(&xml).unwrap();
        let mut resolver = GeometryResolver::new();
        let ids: Vec<String> = resolver
            .process(Some(doc.root_element()))
            .map(|r| r.identity.clone())
            .collect();
        assert_eq!(ids, vec!["OK"]);
        assert_eq!(resolver.failures(), 1);
    }

    #[test]
    fn test_arc_string_with_dangling_position_is_invalid() {
        let xml = wrap(
            r#"<gml:Curve gml:id="A4"><gml:segments>
                 <gml:ArcString><gml:posList>-1 0 0 1 1 0 2 0</gml:posList></gml:ArcString>
               </gml:segments></gml:Curve>"#,
        );
        let doc = Document::parse(&xml).unwrap();
        let node = doc.root_element().first_element_child().unwrap();
        assert!(parse_record(node, "A4").is_err());

        let five = [
            Coord { x: -1.0, y: 0.0 },
            Coord { x: 0.0, y: 1.0 },
            Coord { x: 1.0, y: 0.0 },
            Coord { x: 2.0, y: -1.0 },
            Coord { x: 3.0, y: 0.0 },
        ];
        let line = stroke_arc_string(&five).unwrap();
        assert_eq!(line.last(), Some(&Coord { x: 3.0, y: 0.0 }));
    }

    #[test]
    fn test_circle_is_closed() {
        let coords = stroke_circle(
            Coord { x: 1.0, y: 0.0 },
            Coord { x: 0.0, y: 1.0 },
            Coord { x: -1.0, y: 0.0 },
        );
        assert_eq!(coords.first(), coords.last());
        assert!(coords.len() > 10);
    }
}

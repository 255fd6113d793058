//! Per-data-object aggregation of classified records into type buckets.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use roxmltree::Node;
use tracing::warn;

use crate::classifier::Classification;
use crate::model::{GeometryKind, GeometryRecord};

/// Composite bucket key. Equality is structural: an absent tag never shares a
/// bucket with a tag whose name happens to render the same way. Such pairs are
/// reported by [`Aggregator::store`] and counted as key collisions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub tag_name: Option<String>,
    pub record_type: Option<String>,
    pub kind: GeometryKind,
}

impl BucketKey {
    pub fn new(classification: &Classification, kind: GeometryKind) -> Self {
        Self {
            tag_name: classification.tag_name.clone(),
            record_type: classification.record_type.clone(),
            kind,
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.tag_name.as_deref().unwrap_or("None");
        match (&self.tag_name, &self.record_type) {
            (Some(_), Some(record_type)) => write!(f, "{}_{}_{}", tag, record_type, self.kind),
            _ => write!(f, "{}_{}", tag, self.kind),
        }
    }
}

/// A record paired with one of its geometries.
#[derive(Debug, Clone)]
pub struct FeatureEntry<'a, 'input> {
    pub record: Node<'a, 'input>,
    pub geometry: Arc<GeometryRecord>,
}

#[derive(Debug, Default)]
pub struct TypeBucket<'a, 'input> {
    /// Second geometries of two-geometry records.
    pub features: Vec<FeatureEntry<'a, 'input>>,
    /// Primary geometries, rendered with scale rules.
    pub scale_features: Vec<FeatureEntry<'a, 'input>>,
    /// Template record for field derivation; set once.
    pub first_element: Option<Node<'a, 'input>>,
    pub tag_name: Option<String>,
    pub type_value: Option<String>,
    pub geom_kind: Option<GeometryKind>,
    pub second_geom_kind: Option<GeometryKind>,
    pub has_second_geom: bool,
}

impl<'a, 'input> TypeBucket<'a, 'input> {
    fn describe(
        &mut self,
        record: Node<'a, 'input>,
        classification: &Classification,
        kind: GeometryKind,
        second_kind: Option<GeometryKind>,
    ) {
        self.first_element = Some(record);
        self.tag_name = classification.tag_name.clone();
        self.type_value = classification.record_type.clone();
        self.geom_kind = Some(kind);
        self.second_geom_kind = second_kind;
        self.has_second_geom = second_kind.is_some();
    }
}

/// What happened to a record handed to [`Aggregator::store`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// No geometry; the record contributes nothing.
    Dropped,
    Stored,
    /// More geometries than a record may carry; the extra ones were ignored.
    Truncated,
}

/// Buckets for one data object, in first-seen key order.
#[derive(Debug)]
pub struct Aggregator<'a, 'input> {
    buckets: IndexMap<BucketKey, TypeBucket<'a, 'input>>,
    max_geometries: usize,
    arity_conflicts: usize,
    key_collisions: usize,
}

impl<'a, 'input> Aggregator<'a, 'input> {
    pub fn new(max_geometries: usize) -> Self {
        Self {
            buckets: IndexMap::new(),
            max_geometries,
            arity_conflicts: 0,
            key_collisions: 0,
        }
    }

    /// Returns the bucket for `key`, creating an empty one on first access.
    pub fn bucket_mut(&mut self, key: BucketKey) -> &mut TypeBucket<'a, 'input> {
        self.buckets.entry(key).or_default()
    }

    pub fn store(
        &mut self,
        record: Node<'a, 'input>,
        classification: &Classification,
        mut geometries: Vec<Arc<GeometryRecord>>,
    ) -> StoreOutcome {
        let mut outcome = StoreOutcome::Stored;
        if geometries.len() > self.max_geometries {
            warn!(
                "Record carries more than {} geometries, ignoring the rest",
                self.max_geometries
            );
            geometries.truncate(self.max_geometries);
            outcome = StoreOutcome::Truncated;
        }

        let mut geometries = geometries.into_iter();
        let Some(first) = geometries.next() else {
            return StoreOutcome::Dropped;
        };
        let second = geometries.next();
        let second_kind = second.as_ref().map(|g| g.kind);

        let key = BucketKey::new(classification, first.kind);
        if !self.buckets.contains_key(&key) {
            self.check_collision(&key);
        }
        let bucket = self.buckets.entry(key).or_default();
        if bucket.first_element.is_none() {
            bucket.describe(record, classification, first.kind, second_kind);
        } else if bucket.has_second_geom != second_kind.is_some() {
            warn!(
                "Bucket receives records with {} and {} geometries",
                if bucket.has_second_geom { 2 } else { 1 },
                if second_kind.is_some() { 2 } else { 1 }
            );
            self.arity_conflicts += 1;
        }

        bucket.scale_features.push(FeatureEntry {
            record,
            geometry: first,
        });
        if let Some(second) = second {
            bucket.features.push(FeatureEntry {
                record,
                geometry: second,
            });
        }
        outcome
    }

    /// Warns when `key` renders like a different key already present.
    fn check_collision(&mut self, key: &BucketKey) {
        let text = key.to_string();
        if let Some(existing) = self.buckets.keys().find(|k| k.to_string() == text) {
            warn!(
                "Bucket keys {:?} and {:?} both render as '{}'; kept as separate buckets",
                existing, key, text
            );
            self.key_collisions += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn arity_conflicts(&self) -> usize {
        self.arity_conflicts
    }

    pub fn key_collisions(&self) -> usize {
        self.key_collisions
    }

    pub fn get(&self, key: &BucketKey) -> Option<&TypeBucket<'a, 'input>> {
        self.buckets.get(key)
    }

    pub fn into_buckets(self) -> impl Iterator<Item = (BucketKey, TypeBucket<'a, 'input>)> {
        self.buckets.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{point, polygon, Geometry};
    use roxmltree::Document;

    fn point_record(id: &str) -> Arc<GeometryRecord> {
        Arc::new(GeometryRecord {
            identity: id.to_string(),
            geometry: Geometry::Point(point!(x: 1.0, y: 2.0)),
            kind: GeometryKind::Point,
        })
    }

    fn polygon_record(id: &str) -> Arc<GeometryRecord> {
        Arc::new(GeometryRecord {
            identity: id.to_string(),
            geometry: Geometry::Polygon(polygon![
                (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)
            ]),
            kind: GeometryKind::Polygon,
        })
    }

    fn classification(tag: Option<&str>, record_type: Option<&str>) -> Classification {
        Classification {
            record_type: record_type.map(str::to_string),
            tag_name: tag.map(str::to_string),
        }
    }

    const RECORDS: &str = "<r><a id='1'/><a id='2'/><a id='3'/></r>";

    #[test]
    fn test_key_display() {
        let full = BucketKey::new(&classification(Some("DruhPozemku"), Some("orchard")), GeometryKind::Polygon);
        assert_eq!(full.to_string(), "DruhPozemku_orchard_Polygon");
        let none = BucketKey::new(&classification(None, None), GeometryKind::Point);
        assert_eq!(none.to_string(), "None_Point");
        let literal = BucketKey::new(&classification(Some("None"), None), GeometryKind::Point);
        assert_eq!(literal.to_string(), none.to_string());
        assert_ne!(literal, none);
    }

    #[test]
    fn test_default_on_first_access() {
        let mut aggregator = Aggregator::new(2);
        let key = BucketKey::new(&classification(None, None), GeometryKind::Point);
        assert!(aggregator.get(&key).is_none());
        let bucket = aggregator.bucket_mut(key.clone());
        assert!(bucket.first_element.is_none());
        assert!(bucket.scale_features.is_empty());
        assert_eq!(aggregator.len(), 1);
    }

    #[test]
    fn test_first_record_describes_bucket() {
        let doc = Document::parse(RECORDS).unwrap();
        let records: Vec<_> = doc.root_element().children().filter(|n| n.is_element()).collect();
        let mut aggregator = Aggregator::new(2);
        let c = classification(Some("DruhPozemku"), Some("orchard"));

        aggregator.store(records[0], &c, vec![point_record("p1")]);
        aggregator.store(records[1], &c, vec![point_record("p2")]);
        aggregator.store(records[2], &c, vec![point_record("p3")]);

        assert_eq!(aggregator.len(), 1);
        let (_, bucket) = aggregator.into_buckets().next().unwrap();
        assert_eq!(bucket.first_element.unwrap().attribute("id"), Some("1"));
        assert_eq!(bucket.tag_name.as_deref(), Some("DruhPozemku"));
        assert_eq!(bucket.type_value.as_deref(), Some("orchard"));
        assert_eq!(bucket.geom_kind, Some(GeometryKind::Point));
        assert_eq!(bucket.scale_features.len(), 3);
        assert!(bucket.features.is_empty());
    }

    #[test]
    fn test_two_geometries_stay_in_one_bucket() {
        let doc = Document::parse(RECORDS).unwrap();
        let record = doc.root_element().first_element_child().unwrap();
        let mut aggregator = Aggregator::new(2);
        let outcome = aggregator.store(
            record,
            &classification(None, None),
            vec![polygon_record("a"), point_record("b")],
        );
        assert_eq!(outcome, StoreOutcome::Stored);
        assert_eq!(aggregator.len(), 1);
        let (key, bucket) = aggregator.into_buckets().next().unwrap();
        assert_eq!(key.kind, GeometryKind::Polygon);
        assert_eq!(bucket.scale_features.len(), 1);
        assert_eq!(bucket.features.len(), 1);
        assert_eq!(bucket.scale_features[0].geometry.identity, "a");
        assert_eq!(bucket.features[0].geometry.identity, "b");
        assert!(bucket.has_second_geom);
        assert_eq!(bucket.second_geom_kind, Some(GeometryKind::Point));
    }

    #[test]
    fn test_empty_and_oversized_records() {
        let doc = Document::parse(RECORDS).unwrap();
        let record = doc.root_element().first_element_child().unwrap();
        let mut aggregator = Aggregator::new(2);
        let c = classification(None, None);
        assert_eq!(aggregator.store(record, &c, Vec::new()), StoreOutcome::Dropped);
        assert!(aggregator.is_empty());

        let outcome = aggregator.store(
            record,
            &c,
            vec![point_record("a"), point_record("b"), point_record("c")],
        );
        assert_eq!(outcome, StoreOutcome::Truncated);
        let (_, bucket) = aggregator.into_buckets().next().unwrap();
        assert_eq!(bucket.scale_features.len() + bucket.features.len(), 2);
    }

    #[test]
    fn test_arity_conflict_is_counted() {
        let doc = Document::parse(RECORDS).unwrap();
        let records: Vec<_> = doc.root_element().children().filter(|n| n.is_element()).collect();
        let mut aggregator = Aggregator::new(2);
        let c = classification(None, None);
        aggregator.store(records[0], &c, vec![point_record("a")]);
        aggregator.store(records[1], &c, vec![point_record("b"), polygon_record("c")]);
        assert_eq!(aggregator.arity_conflicts(), 1);
        let (_, bucket) = aggregator.into_buckets().next().unwrap();
        assert!(!bucket.has_second_geom);
        assert_eq!(bucket.scale_features.len(), 2);
        assert_eq!(bucket.features.len(), 1);
    }

    #[test]
    fn test_same_rendered_key_is_flagged() {
        let doc = Document::parse(RECORDS).unwrap();
        let record = doc.root_element().first_element_child().unwrap();
        let mut aggregator = Aggregator::new(2);
        aggregator.store(record, &classification(None, None), vec![point_record("1")]);
        aggregator.store(record, &classification(Some("None"), None), vec![point_record("2")]);
        aggregator.store(record, &classification(Some("None"), None), vec![point_record("3")]);
        aggregator.store(record, &classification(Some("A"), Some("x")), vec![point_record("4")]);

        assert_eq!(aggregator.key_collisions(), 1);
        assert_eq!(aggregator.len(), 3);
    }

    #[test]
    fn test_key_order_is_first_seen() {
        let doc = Document::parse(RECORDS).unwrap();
        let record = doc.root_element().first_element_child().unwrap();
        let mut aggregator = Aggregator::new(2);
        aggregator.store(record, &classification(Some("B"), Some("x")), vec![point_record("1")]);
        aggregator.store(record, &classification(Some("A"), Some("y")), vec![point_record("2")]);
        aggregator.store(record, &classification(Some("B"), Some("x")), vec![point_record("3")]);
        let keys: Vec<String> = aggregator.into_buckets().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["B_x_Point", "A_y_Point"]);
    }
}

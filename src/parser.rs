//! Streaming ingestion of JVF DTM documents.
//!
//! The document is read with `quick-xml` one top-level data block at a time.
//! Each block is re-serialized on its own, with the namespace declarations in
//! scope at its position copied onto its start tag, and parsed into a small
//! `roxmltree` document. Records of every data object in the block are then
//! classified, grouped into buckets and turned into layer descriptors. Only one
//! block is held in memory at any time.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexSet;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use roxmltree::{Document, Node};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::aggregate::{Aggregator, FeatureEntry, StoreOutcome, TypeBucket};
use crate::attributes::{AttributeResolver, ATTRIBUTE_CONTAINER};
use crate::classifier::RecordClassifier;
use crate::config::{Config, IngestOptions};
use crate::error::{JvfError, Result};
use crate::geometry::GeometryResolver;
use crate::model::{Feature, FieldDescriptor, GroupPath, LayerDescriptor, ObjectType};
use crate::scale::{LayerNames, ScaleRuleResolver, STYLE_NOT_FOUND};
use crate::schema::SchemaCatalog;
use crate::style::StyleCatalog;
use crate::type_mapping::TypeMappingTable;

const DATA_CONTAINER: &str = "Data";
const OBJECT_TYPE: &str = "ObjektovyTypNazev";
const CONTENT_PART: &str = "ObsahovaCast";
const CATEGORY: &str = "KategorieObjektu";
const GROUP: &str = "SkupinaObjektu";
const RECORD_LIST: &str = "ZaznamyObjektu";
const RECORD: &str = "ZaznamObjektu";
const GEOMETRY_CONTAINER: &str = "GeometrieObjektu";

/// The read-only lookup tables shared by every session.
#[derive(Debug, Clone, Default)]
pub struct Catalogs {
    pub schema: Arc<SchemaCatalog>,
    pub type_mapping: Arc<TypeMappingTable>,
    pub styles: Arc<StyleCatalog>,
}

impl Catalogs {
    /// Loads every table named in `config`. Tables that are not configured or
    /// fail to load stay empty.
    pub fn load(config: &Config) -> Self {
        let schema = match &config.xsd_attributes {
            Some(path) => SchemaCatalog::load(path),
            None => {
                warn!("No XSD schema configured, attribute labels are unavailable");
                SchemaCatalog::empty()
            }
        };
        let type_mapping = match &config.type_mapping {
            Some(path) => TypeMappingTable::load(path),
            None => {
                warn!("No type mapping configured, records are not sub-typed");
                TypeMappingTable::empty()
            }
        };
        let styles = match &config.styles {
            Some(path) => StyleCatalog::load(path),
            None => {
                warn!("No style table configured, layers get no scale rules");
                StyleCatalog::empty()
            }
        };
        Self {
            schema: Arc::new(schema),
            type_mapping: Arc::new(type_mapping),
            styles: Arc::new(styles),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStatus {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub blocks: usize,
    pub skipped_blocks: usize,
    pub data_objects: usize,
    pub skipped_data_objects: usize,
    pub records: usize,
    pub processed_records: usize,
    /// Records without any usable geometry.
    pub dropped_records: usize,
    /// Records whose classification failed.
    pub failed_records: usize,
    pub truncated_records: usize,
    pub geometry_cache_hits: usize,
    pub geometry_failures: usize,
    pub arity_conflicts: usize,
    /// Distinct bucket keys that render to the same text.
    pub key_collisions: usize,
}

/// Everything a finished session hands to the layer sink.
#[derive(Debug, Clone, Default)]
pub struct IngestOutcome {
    /// Every group path a layer may be placed in, parents before children.
    pub groups: Vec<GroupPath>,
    pub layers: Vec<LayerDescriptor>,
    pub stats: IngestStats,
}

type Namespace = (Vec<u8>, Vec<u8>);

/// Splits an XML stream into self-contained top-level blocks.
pub struct BlockReader<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    block_tag: Vec<u8>,
    /// Namespace declarations of the open ancestors, outermost first.
    scopes: Vec<Vec<Namespace>>,
}

enum Found {
    Open(BytesStart<'static>),
    Empty(BytesStart<'static>),
    Nothing,
}

impl<R: BufRead> BlockReader<R> {
    pub fn new(reader: R, block_tag: &str) -> Self {
        Self {
            reader: Reader::from_reader(reader),
            buf: Vec::new(),
            block_tag: block_tag.as_bytes().to_vec(),
            scopes: Vec::new(),
        }
    }

    /// The next block as standalone XML text, or `None` at the end of input.
    pub fn next_block(&mut self) -> Result<Option<String>> {
        loop {
            let found = match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) if e.local_name().as_ref() == self.block_tag.as_slice() => {
                    Found::Open(inherit_namespaces(&e, &self.scopes)?)
                }
                Event::Empty(e) if e.local_name().as_ref() == self.block_tag.as_slice() => {
                    Found::Empty(inherit_namespaces(&e, &self.scopes)?)
                }
                Event::Start(e) => {
                    self.scopes.push(namespace_declarations(&e)?);
                    Found::Nothing
                }
                Event::End(_) => {
                    self.scopes.pop();
                    Found::Nothing
                }
                Event::Eof => return Ok(None),
                _ => Found::Nothing,
            };
            self.buf.clear();

            match found {
                Found::Open(start) => return self.capture(start).map(Some),
                Found::Empty(start) => {
                    let mut writer = Writer::new(Vec::new());
                    writer.write_event(Event::Empty(start))?;
                    return Ok(Some(String::from_utf8(writer.into_inner())?));
                }
                Found::Nothing => {}
            }
        }
    }

    /// Copies events up to and including the end tag matching `start`.
    fn capture(&mut self, start: BytesStart<'static>) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Start(start))?;
        let mut depth = 0usize;
        loop {
            let event = self.reader.read_event_into(&mut self.buf)?;
            let closed = match &event {
                Event::Start(_) => {
                    depth += 1;
                    false
                }
                Event::End(_) if depth == 0 => true,
                Event::End(_) => {
                    depth -= 1;
                    false
                }
                Event::Eof => {
                    return Err(JvfError::UnexpectedEof(
                        String::from_utf8_lossy(&self.block_tag).into_owned(),
                    ))
                }
                _ => false,
            };
            writer.write_event(event)?;
            self.buf.clear();
            if closed {
                break;
            }
        }
        Ok(String::from_utf8(writer.into_inner())?)
    }
}

fn namespace_declarations(start: &BytesStart) -> Result<Vec<Namespace>> {
    let mut declarations = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = attr.key.as_ref().to_vec();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            declarations.push((key, attr.value.into_owned()));
        }
    }
    Ok(declarations)
}

/// Owned copy of `start` that also declares every namespace inherited from
/// `scopes` it does not declare itself. Inner declarations shadow outer ones.
fn inherit_namespaces(start: &BytesStart, scopes: &[Vec<Namespace>]) -> Result<BytesStart<'static>> {
    let own = namespace_declarations(start)?;
    let mut declared: Vec<&[u8]> = own.iter().map(|(key, _)| key.as_slice()).collect();
    let mut element = start.clone().into_owned();
    for (key, value) in scopes.iter().rev().flatten() {
        if declared.contains(&key.as_slice()) {
            continue;
        }
        element.push_attribute((key.as_slice(), value.as_slice()));
        declared.push(key.as_slice());
    }
    Ok(element)
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn children_named<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

/// One parse session: caches and accumulated layers live as long as the
/// ingestor, so several inputs may feed the same session.
pub struct StreamingIngestor {
    catalogs: Catalogs,
    options: IngestOptions,
    classifier: RecordClassifier,
    geometry: GeometryResolver,
    attributes: AttributeResolver,
    rules: ScaleRuleResolver,
    groups: IndexSet<GroupPath>,
    layers: Vec<LayerDescriptor>,
    stats: IngestStats,
}

impl StreamingIngestor {
    pub fn new(catalogs: Catalogs, options: IngestOptions) -> Self {
        let classifier = RecordClassifier::new(
            Arc::clone(&catalogs.type_mapping),
            Arc::clone(&catalogs.schema),
            options.zero_discriminant,
        );
        let attributes = AttributeResolver::new(Arc::clone(&catalogs.schema));
        let rules = ScaleRuleResolver::new(Arc::clone(&catalogs.styles));
        Self {
            catalogs,
            options,
            classifier,
            geometry: GeometryResolver::new(),
            attributes,
            rules,
            groups: IndexSet::new(),
            layers: Vec::new(),
            stats: IngestStats::default(),
        }
    }

    pub fn ingest_path(&mut self, path: &Path, cancel: &AtomicBool) -> Result<IngestStatus> {
        let file = File::open(path)?;
        let source = path.to_string_lossy();
        self.ingest(BufReader::new(file), &source, cancel)
    }

    /// Streams one document into the session. `cancel` is polled before every
    /// block; a cancelled ingest leaves the session in an unspecified state.
    pub fn ingest<R: BufRead>(
        &mut self,
        reader: R,
        source_name: &str,
        cancel: &AtomicBool,
    ) -> Result<IngestStatus> {
        info!("Parsing {}", source_name);
        let root = self
            .options
            .file_root_group
            .then(|| file_stem(source_name));
        let mut blocks = BlockReader::new(reader, &self.options.block_tag);

        loop {
            if cancel.load(Ordering::Relaxed) {
                info!("Parsing of {} cancelled", source_name);
                return Ok(IngestStatus::Cancelled);
            }
            let Some(block) = blocks.next_block()? else {
                break;
            };
            self.stats.blocks += 1;
            if let Err(e) = self.process_block(&block, root.as_deref()) {
                error!("Error processing data block {}: {}", self.stats.blocks, e);
                self.stats.skipped_blocks += 1;
            }
        }

        self.stats.geometry_cache_hits = self.geometry.cache_hits();
        self.stats.geometry_failures = self.geometry.failures();
        info!(
            "Parsed {}: {} blocks, {} records, {} layers",
            source_name,
            self.stats.blocks,
            self.stats.records,
            self.layers.len()
        );
        Ok(IngestStatus::Completed)
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    pub fn finish(self) -> IngestOutcome {
        IngestOutcome {
            groups: self.groups.into_iter().collect(),
            layers: self.layers,
            stats: self.stats,
        }
    }

    fn process_block(&mut self, text: &str, root: Option<&str>) -> Result<()> {
        let doc = Document::parse(text)?;
        let data = child(doc.root_element(), DATA_CONTAINER).ok_or_else(|| {
            JvfError::MissingElement {
                element: DATA_CONTAINER,
                context: self.options.block_tag.clone(),
            }
        })?;

        let mut objects: Vec<Node> = data.children().filter(Node::is_element).collect();
        objects.sort_by_key(|object| {
            child(*object, OBJECT_TYPE)
                .and_then(|t| t.attribute("code_base"))
                .unwrap_or("")
        });

        for object in objects {
            self.stats.data_objects += 1;
            if let Err(e) = self.process_data_object(object, root) {
                error!("Error processing data object: {}", e);
                self.stats.skipped_data_objects += 1;
            }
        }
        Ok(())
    }

    fn process_data_object(&mut self, object: Node, root: Option<&str>) -> Result<()> {
        let Some(type_node) = child(object, OBJECT_TYPE) else {
            debug!("Data object <{}> has no object type", object.tag_name().name());
            return Ok(());
        };
        let object_type = ObjectType {
            code_base: type_node
                .attribute("code_base")
                .ok_or(JvfError::MissingAttribute {
                    attribute: "code_base",
                    element: OBJECT_TYPE,
                })?
                .to_string(),
            code_suffix: type_node.attribute("code_suffix").unwrap_or_default().to_string(),
            label: type_node.text().unwrap_or_default().trim().to_string(),
        };

        let group = group_path(object, root)?;
        for prefix in group.prefixes() {
            self.groups.insert(prefix);
        }

        let records: Vec<Node> = child(object, RECORD_LIST)
            .into_iter()
            .flat_map(|list| children_named(list, RECORD))
            .collect();
        if records.is_empty() {
            return Ok(());
        }

        let mut aggregator = Aggregator::new(self.options.max_geometries_per_record);
        for record in records {
            self.stats.records += 1;
            let classification = match self.classifier.classify(
                object_type.code_num(),
                &object_type.label,
                child(record, ATTRIBUTE_CONTAINER),
            ) {
                Ok(classification) => classification,
                Err(e) => {
                    warn!("Skipping record of {}: {}", object_type.display_name(), e);
                    self.stats.failed_records += 1;
                    continue;
                }
            };

            let geometries: Vec<_> = self
                .geometry
                .process(child(record, GEOMETRY_CONTAINER))
                .take(self.options.max_geometries_per_record + 1)
                .collect();
            match aggregator.store(record, &classification, geometries) {
                StoreOutcome::Dropped => self.stats.dropped_records += 1,
                StoreOutcome::Stored => self.stats.processed_records += 1,
                StoreOutcome::Truncated => {
                    self.stats.processed_records += 1;
                    self.stats.truncated_records += 1;
                }
            }
        }
        self.stats.arity_conflicts += aggregator.arity_conflicts();
        self.stats.key_collisions += aggregator.key_collisions();

        for (key, bucket) in aggregator.into_buckets() {
            match self.build_layers(&object_type, &group, bucket) {
                Some(layers) => self.layers.extend(layers),
                None => warn!("Bucket {} of {} is empty", key, object_type.display_name()),
            }
        }
        Ok(())
    }

    /// The optional second-geometry layer followed by the scale layer.
    fn build_layers(
        &mut self,
        object_type: &ObjectType,
        group: &GroupPath,
        bucket: TypeBucket,
    ) -> Option<Vec<LayerDescriptor>> {
        let template = bucket.first_element?;
        let kind = bucket.geom_kind?;
        let names = LayerNames::new(
            object_type,
            bucket.tag_name.as_deref(),
            bucket.type_value.as_deref(),
            kind,
            &self.catalogs.schema,
        );
        let fields = self.attributes.derive_fields(template);
        let mut layers = Vec::with_capacity(2);

        if let (true, Some(second_kind)) = (bucket.has_second_geom, bucket.second_geom_kind) {
            let features = self.features(&bucket.features, &fields);
            layers.push(LayerDescriptor {
                name: names.second_layer(second_kind),
                kind: second_kind,
                fields: fields.clone(),
                features,
                rules: Vec::new(),
                group_path: group.clone(),
                visible: false,
                style_missing: false,
            });
        }

        let rules = self.rules.resolve(&names);
        let style_missing = rules.is_empty();
        let mut name = names.scale_layer;
        if style_missing {
            debug!("No style found for any scale band of {}", name);
            name.push_str(STYLE_NOT_FOUND);
        }
        let features = self.features(&bucket.scale_features, &fields);
        layers.push(LayerDescriptor {
            name,
            kind,
            fields,
            features,
            rules,
            group_path: group.clone(),
            visible: true,
            style_missing,
        });
        Some(layers)
    }

    fn features(&mut self, entries: &[FeatureEntry], fields: &[FieldDescriptor]) -> Vec<Feature> {
        entries
            .iter()
            .map(|entry| {
                let mut attributes = self.attributes.extract_values(entry.record, fields);
                if let Some(identity) = attributes.first_mut() {
                    *identity = Some(entry.geometry.identity.clone())
                        .filter(|id| !id.is_empty());
                }
                Feature {
                    attributes,
                    geometry: Arc::clone(&entry.geometry),
                }
            })
            .collect()
    }
}

fn group_path(object: Node, root: Option<&str>) -> Result<GroupPath> {
    let mut parts = Vec::with_capacity(4);
    if let Some(root) = root {
        parts.push(root.to_string());
    }
    for element in [CONTENT_PART, CATEGORY, GROUP] {
        let node = child(object, element).ok_or_else(|| JvfError::MissingElement {
            element,
            context: object.tag_name().name().to_string(),
        })?;
        parts.push(node.text().unwrap_or_default().trim().to_string());
    }
    Ok(GroupPath::new(parts))
}

fn file_stem(source_name: &str) -> String {
    Path::new(source_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(source_name)
        .to_string()
}

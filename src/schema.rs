//! Field documentation and enumeration labels read from the JVF XSD.
//!
//! Every `xs:element` with a `name` contributes its `xs:documentation` text to the
//! documentation map. When the element carries coded values (inline, or through a
//! named `xs:simpleType` it references), each `xs:enumeration` with documentation
//! becomes a `code -> label` entry for that field name.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use roxmltree::{Document, Node};
use tracing::{debug, error};

use crate::error::Result;

const XS_NS: &str = "http://www.w3.org/2001/XMLSchema";

pub type EnumLabels = HashMap<String, String>;

#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    documentation: HashMap<String, String>,
    enumerations: HashMap<String, Arc<EnumLabels>>,
}

impl SchemaCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_maps(
        documentation: HashMap<String, String>,
        enumerations: HashMap<String, EnumLabels>,
    ) -> Self {
        Self {
            documentation,
            enumerations: enumerations
                .into_iter()
                .map(|(field, labels)| (field, Arc::new(labels)))
                .collect(),
        }
    }

    /// Loads the catalog from an XSD file. Any failure is logged and yields an
    /// empty catalog: missing labels are never fatal to a parse.
    pub fn load(path: &Path) -> Self {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                error!("Error loading XSD schema {:?}: {}", path, e);
                return Self::empty();
            }
        };
        match Self::from_xsd_str(&text) {
            Ok(catalog) => {
                debug!(
                    "Loaded schema: {} documented fields, {} enumerations",
                    catalog.documentation.len(),
                    catalog.enumerations.len()
                );
                catalog
            }
            Err(e) => {
                error!("Error parsing XSD schema {:?}: {}", path, e);
                Self::empty()
            }
        }
    }

    pub fn from_xsd_str(text: &str) -> Result<Self> {
        let doc = Document::parse(text)?;
        let root = doc.root_element();

        let named_types: HashMap<&str, Node> = root
            .children()
            .filter(|n| is_xs(n, "simpleType"))
            .filter_map(|n| n.attribute("name").map(|name| (name, n)))
            .collect();

        let mut documentation = HashMap::new();
        let mut enumerations = HashMap::new();

        for element in root.descendants().filter(|n| is_xs(n, "element")) {
            let Some(name) = element.attribute("name") else {
                continue;
            };

            if let Some(text) = own_documentation(element) {
                documentation.insert(name.to_string(), text);
            }

            let mut labels = enum_labels(element);
            if labels.is_empty() {
                if let Some(simple_type) = element
                    .attribute("type")
                    .map(strip_prefix)
                    .and_then(|type_name| named_types.get(type_name))
                {
                    labels = enum_labels(*simple_type);
                }
            }
            if !labels.is_empty() {
                enumerations.insert(name.to_string(), Arc::new(labels));
            }
        }

        Ok(Self {
            documentation,
            enumerations,
        })
    }

    pub fn documentation(&self, field: &str) -> Option<&str> {
        self.documentation.get(field).map(String::as_str)
    }

    pub fn enumeration(&self, field: &str) -> Option<&Arc<EnumLabels>> {
        self.enumerations.get(field)
    }

    pub fn label(&self, field: &str, code: &str) -> Option<&str> {
        self.enumerations
            .get(field)
            .and_then(|labels| labels.get(code))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.documentation.is_empty() && self.enumerations.is_empty()
    }
}

fn is_xs(node: &Node, local: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == local
        && node.tag_name().namespace() == Some(XS_NS)
}

fn strip_prefix(qname: &str) -> &str {
    qname.rsplit(':').next().unwrap_or(qname)
}

fn doc_text(node: Node) -> Option<String> {
    let text = node.text()?.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// First documentation under `element` that does not belong to an enumeration value.
fn own_documentation(element: Node) -> Option<String> {
    element
        .descendants()
        .filter(|n| is_xs(n, "documentation"))
        .find(|n| {
            !n.ancestors()
                .take_while(|a| a.id() != element.id())
                .any(|a| is_xs(&a, "enumeration"))
        })
        .and_then(doc_text)
}

fn enum_labels(scope: Node) -> EnumLabels {
    scope
        .descendants()
        .filter(|n| is_xs(n, "enumeration"))
        .filter_map(|n| {
            let value = n.attribute("value")?;
            let label = n
                .descendants()
                .find(|d| is_xs(d, "documentation"))
                .and_then(doc_text)?;
            Some((value.to_string(), label))
        })
        .collect()
}

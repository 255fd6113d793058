use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use roxmltree::Node;

use crate::model::FieldDescriptor;
use crate::schema::{EnumLabels, SchemaCatalog};

/// Local name of the element that holds a record's attributes.
pub const ATTRIBUTE_CONTAINER: &str = "AtributyObjektu";

/// Per field name: the enumeration used to label its values, resolved once.
#[derive(Debug, Clone)]
struct FieldLookup {
    labels: Option<Arc<EnumLabels>>,
}

/// Derives layer fields from a template record and extracts feature values.
#[derive(Debug)]
pub struct AttributeResolver {
    schema: Arc<SchemaCatalog>,
    lookups: HashMap<String, FieldLookup>,
}

impl AttributeResolver {
    pub fn new(schema: Arc<SchemaCatalog>) -> Self {
        Self {
            schema,
            lookups: HashMap::new(),
        }
    }

    /// The identity field followed by one field per distinct leaf name under the
    /// record's attribute container, in document order.
    pub fn derive_fields(&self, template: Node) -> Vec<FieldDescriptor> {
        let mut fields = vec![FieldDescriptor::identity()];
        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(crate::model::IDENTITY_FIELD);

        let containers = template
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == ATTRIBUTE_CONTAINER);
        for container in containers {
            for leaf in container
                .descendants()
                .filter(|n| n.is_element() && !n.children().any(|c| c.is_element()))
            {
                let name = leaf.tag_name().name();
                if name == ATTRIBUTE_CONTAINER || !seen.insert(name) {
                    continue;
                }
                fields.push(FieldDescriptor {
                    name: name.to_string(),
                    alias: self
                        .schema
                        .documentation(name)
                        .unwrap_or(name)
                        .to_string(),
                });
            }
        }
        fields
    }

    /// One value per field, in field order. The identity slot is always `None`;
    /// absent or blank elements are `None` as well.
    pub fn extract_values(
        &mut self,
        record: Node,
        fields: &[FieldDescriptor],
    ) -> Vec<Option<String>> {
        // first occurrence of every local name below the record
        let mut first: HashMap<&str, Node> = HashMap::new();
        for node in record.descendants().skip(1).filter(|n| n.is_element()) {
            first.entry(node.tag_name().name()).or_insert(node);
        }

        fields
            .iter()
            .map(|field| {
                if field.is_identity() {
                    return None;
                }
                let text = first.get(field.name.as_str())?.text()?.trim();
                if text.is_empty() {
                    return None;
                }
                let lookup = self.lookup(&field.name);
                Some(
                    lookup
                        .labels
                        .as_ref()
                        .and_then(|labels| labels.get(text))
                        .cloned()
                        .unwrap_or_else(|| text.to_string()),
                )
            })
            .collect()
    }

    fn lookup(&mut self, field: &str) -> &FieldLookup {
        if !self.lookups.contains_key(field) {
            let lookup = FieldLookup {
                labels: self.schema.enumeration(field).cloned(),
            };
            self.lookups.insert(field.to_string(), lookup);
        }
        &self.lookups[field]
    }

    pub fn cached_lookups(&self) -> usize {
        self.lookups.len()
    }
}

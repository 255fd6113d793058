use std::sync::Arc;

use roxmltree::Node;

use crate::config::ZeroDiscriminantPolicy;
use crate::error::{JvfError, Result};
use crate::schema::SchemaCatalog;
use crate::type_mapping::TypeMappingTable;

/// Sub-type of a record as determined from its discriminating attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Labels of every matched discriminator, space-joined in priority order.
    pub record_type: Option<String>,
    /// Local name of the first discriminator that matched.
    pub tag_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RecordClassifier {
    type_mapping: Arc<TypeMappingTable>,
    schema: Arc<SchemaCatalog>,
    zero_policy: ZeroDiscriminantPolicy,
}

impl RecordClassifier {
    pub fn new(
        type_mapping: Arc<TypeMappingTable>,
        schema: Arc<SchemaCatalog>,
        zero_policy: ZeroDiscriminantPolicy,
    ) -> Self {
        Self {
            type_mapping,
            schema,
            zero_policy,
        }
    }

    /// Walks the expected attributes of the object type in priority order. Each
    /// expected attribute takes its first matching child of `attributes`; every
    /// match contributes its enumeration label. A matched code without a label
    /// fails the record.
    pub fn classify(
        &self,
        object_type_code: &str,
        object_type_label: &str,
        attributes: Option<Node>,
    ) -> Result<Classification> {
        let Some(attributes) = attributes else {
            return Ok(Classification::default());
        };
        let expected = self.type_mapping.lookup(object_type_code, object_type_label);
        if expected.is_empty() {
            return Ok(Classification::default());
        }

        let mut result = Classification::default();
        for expected_attribute in expected {
            let matched = attributes.children().find(|child| {
                child.is_element()
                    && child.tag_name().name() == expected_attribute
                    && !(self.zero_policy == ZeroDiscriminantPolicy::Skip
                        && child.text().map(str::trim) == Some("0"))
            });
            let Some(child) = matched else {
                continue;
            };

            let code = child.text().unwrap_or("").trim();
            let label = self
                .schema
                .label(expected_attribute, code)
                .ok_or_else(|| JvfError::UnknownEnumValue {
                    field: expected_attribute.clone(),
                    code: code.to_string(),
                })?;

            match result.record_type.as_mut() {
                None => {
                    result.record_type = Some(label.to_string());
                    result.tag_name = Some(expected_attribute.clone());
                }
                Some(record_type) => {
                    record_type.push(' ');
                    record_type.push_str(label);
                }
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roxmltree::Document;
    use std::collections::HashMap;

    fn classifier(policy: ZeroDiscriminantPolicy) -> RecordClassifier {
        let mapping = TypeMappingTable::from_entries([
            ("07 Plot", vec!["DruhPozemku"]),
            ("08 Zed", vec!["Material", "Typ"]),
        ]);
        let enumerations = HashMap::from([
            (
                "DruhPozemku".to_string(),
                HashMap::from([
                    ("2".to_string(), "orchard".to_string()),
                    ("0".to_string(), "unknown".to_string()),
                ]),
            ),
            (
                "Material".to_string(),
                HashMap::from([("1".to_string(), "stone".to_string())]),
            ),
            (
                "Typ".to_string(),
                HashMap::from([("5".to_string(), "retaining".to_string())]),
            ),
        ]);
        RecordClassifier::new(
            Arc::new(mapping),
            Arc::new(SchemaCatalog::from_maps(HashMap::new(), enumerations)),
            policy,
        )
    }

    fn classify(c: &RecordClassifier, code: &str, label: &str, xml: &str) -> Result<Classification> {
        let doc = Document::parse(xml).unwrap();
        c.classify(code, label, Some(doc.root_element()))
    }

    #[test]
    fn test_single_discriminator() {
        let c = classifier(ZeroDiscriminantPolicy::Keep);
        let result = classify(
            &c,
            "07",
            "Plot",
            "<AtributyObjektu><Kod>1</Kod><DruhPozemku>2</DruhPozemku></AtributyObjektu>",
        )
        .unwrap();
        assert_eq!(result.record_type.as_deref(), Some("orchard"));
        assert_eq!(result.tag_name.as_deref(), Some("DruhPozemku"));
    }

    #[test]
    fn test_labels_join_in_priority_order() {
        let c = classifier(ZeroDiscriminantPolicy::Keep);
        let result = classify(
            &c,
            "08",
            "Zed",
            "<AtributyObjektu><Typ>5</Typ><Material>1</Material></AtributyObjektu>",
        )
        .unwrap();
        assert_eq!(result.record_type.as_deref(), Some("stone retaining"));
        assert_eq!(result.tag_name.as_deref(), Some("Material"));
    }

    #[test]
    fn test_tag_name_only_from_matching_attribute() {
        let c = classifier(ZeroDiscriminantPolicy::Keep);
        let result = classify(
            &c,
            "08",
            "Zed",
            "<AtributyObjektu><Typ>5</Typ></AtributyObjektu>",
        )
        .unwrap();
        assert_eq!(result.tag_name.as_deref(), Some("Typ"));
        assert_eq!(result.record_type.as_deref(), Some("retaining"));
    }

    #[test]
    fn test_first_child_occurrence_wins() {
        let c = classifier(ZeroDiscriminantPolicy::Keep);
        let result = classify(
            &c,
            "07",
            "Plot",
            "<AtributyObjektu><DruhPozemku>2</DruhPozemku><DruhPozemku>0</DruhPozemku></AtributyObjektu>",
        )
        .unwrap();
        assert_eq!(result.record_type.as_deref(), Some("orchard"));
    }

    #[test]
    fn test_unmapped_type_is_undetermined() {
        let c = classifier(ZeroDiscriminantPolicy::Keep);
        let result = classify(&c, "99", "Nic", "<AtributyObjektu><DruhPozemku>2</DruhPozemku></AtributyObjektu>")
            .unwrap();
        assert_eq!(result, Classification::default());
        assert_eq!(c.classify("07", "Plot", None).unwrap(), Classification::default());
    }

    #[test]
    fn test_zero_policy() {
        let xml = "<AtributyObjektu><DruhPozemku>0</DruhPozemku></AtributyObjektu>";
        let keep = classify(&classifier(ZeroDiscriminantPolicy::Keep), "07", "Plot", xml).unwrap();
        assert_eq!(keep.record_type.as_deref(), Some("unknown"));

        let skip = classify(&classifier(ZeroDiscriminantPolicy::Skip), "07", "Plot", xml).unwrap();
        assert_eq!(skip, Classification::default());
    }

    #[test]
    fn test_zero_skip_falls_through_to_next_child() {
        let xml = "<AtributyObjektu><DruhPozemku>0</DruhPozemku><DruhPozemku>2</DruhPozemku></AtributyObjektu>";
        let skip = classify(&classifier(ZeroDiscriminantPolicy::Skip), "07", "Plot", xml).unwrap();
        assert_eq!(skip.record_type.as_deref(), Some("orchard"));
    }

    #[test]
    fn test_unknown_code_fails_record() {
        let c = classifier(ZeroDiscriminantPolicy::Keep);
        let err = classify(
            &c,
            "07",
            "Plot",
            "<AtributyObjektu><DruhPozemku>42</DruhPozemku></AtributyObjektu>",
        )
        .unwrap_err();
        assert!(matches!(err, JvfError::UnknownEnumValue { .. }));
    }
}

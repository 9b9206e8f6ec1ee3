//! The required-field schema every output frontmatter document must satisfy.
//!
//! Both the field validator inside the normalizer and the output assembler
//! consume [`REQUIRED_FIELDS`]; nothing else enumerates these names.

use serde_yaml::Value;

use crate::types::{Category, Complexity, Document};

/// Shape and value predicate for one required field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A string with at least one non-whitespace character.
    NonEmptyString,
    /// One of the nine [`Category`] names.
    CategoryName,
    /// One of `low`, `medium`, `high`.
    ComplexityLevel,
    /// An integer in `[1, 5]`.
    DifficultyScore,
    /// An integer greater than zero.
    PositiveInteger,
    /// A non-empty list of non-empty strings.
    StringList,
    /// Any mapping (may be empty).
    Mapping,
    /// A mapping with a positive integer `id` and non-empty `name` and `country`.
    AuthorObject,
}

impl FieldKind {
    /// Check a value against this kind's predicate.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            Self::NonEmptyString => match value.as_str() {
                Some(s) if !s.trim().is_empty() => Ok(()),
                Some(_) => Err("empty string".into()),
                None => Err(format!("expected string, got {}", type_name(value))),
            },
            Self::CategoryName => {
                let s = value
                    .as_str()
                    .ok_or_else(|| format!("expected string, got {}", type_name(value)))?;
                // Must be the canonical lowercase spelling.
                match s.parse::<Category>() {
                    Ok(c) if c.as_str() == s => Ok(()),
                    _ => Err(format!("'{s}' is not a known category")),
                }
            }
            Self::ComplexityLevel => {
                let s = value
                    .as_str()
                    .ok_or_else(|| format!("expected string, got {}", type_name(value)))?;
                match s.parse::<Complexity>() {
                    Ok(c) if c.as_str() == s => Ok(()),
                    _ => Err(format!("'{s}' is not a complexity level")),
                }
            }
            Self::DifficultyScore => match value.as_i64() {
                Some(n) if (1..=5).contains(&n) => Ok(()),
                Some(n) => Err(format!("difficulty {n} outside [1, 5]")),
                None => Err(format!("expected integer, got {}", type_name(value))),
            },
            Self::PositiveInteger => match value.as_i64() {
                Some(n) if n > 0 => Ok(()),
                Some(n) => Err(format!("{n} is not positive")),
                None => Err(format!("expected integer, got {}", type_name(value))),
            },
            Self::StringList => {
                let items = value
                    .as_sequence()
                    .ok_or_else(|| format!("expected list, got {}", type_name(value)))?;
                if items.is_empty() {
                    return Err("empty list".into());
                }
                if items
                    .iter()
                    .any(|v| v.as_str().is_none_or(|s| s.trim().is_empty()))
                {
                    return Err("list contains a non-string or blank entry".into());
                }
                Ok(())
            }
            Self::Mapping => match value {
                Value::Mapping(_) => Ok(()),
                other => Err(format!("expected mapping, got {}", type_name(other))),
            },
            Self::AuthorObject => {
                let map = value
                    .as_mapping()
                    .ok_or_else(|| format!("expected mapping, got {}", type_name(value)))?;
                Self::PositiveInteger
                    .check(map.get("id").unwrap_or(&Value::Null))
                    .map_err(|e| format!("id: {e}"))?;
                for key in ["name", "country"] {
                    Self::NonEmptyString
                        .check(map.get(key).unwrap_or(&Value::Null))
                        .map_err(|e| format!("{key}: {e}"))?;
                }
                Ok(())
            }
        }
    }
}

/// A required top-level field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredField {
    pub name: &'static str,
    pub kind: FieldKind,
}

/// The ordered list of required fields.
#[derive(Debug, Clone, Copy)]
pub struct RequiredFieldSchema {
    fields: &'static [RequiredField],
}

impl RequiredFieldSchema {
    pub fn fields(&self) -> &'static [RequiredField] {
        self.fields
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        self.fields.iter().map(|f| f.name)
    }

    pub fn get(&self, name: &str) -> Option<&'static RequiredField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Required fields absent from the document.
    pub fn missing(&self, doc: &Document) -> Vec<&'static str> {
        self.names().filter(|name| !doc.contains_key(*name)).collect()
    }

    /// Required fields that are absent or fail their predicate, with the reason.
    pub fn violations(&self, doc: &Document) -> Vec<(&'static str, String)> {
        self.fields
            .iter()
            .filter_map(|field| match doc.get(field.name) {
                None => Some((field.name, "missing".to_string())),
                Some(value) => field.kind.check(value).err().map(|e| (field.name, e)),
            })
            .collect()
    }
}

pub const REQUIRED_FIELDS: RequiredFieldSchema = RequiredFieldSchema {
    fields: &[
        RequiredField { name: "name", kind: FieldKind::NonEmptyString },
        RequiredField { name: "category", kind: FieldKind::CategoryName },
        RequiredField { name: "complexity", kind: FieldKind::ComplexityLevel },
        RequiredField { name: "difficulty_score", kind: FieldKind::DifficultyScore },
        RequiredField { name: "author_id", kind: FieldKind::PositiveInteger },
        RequiredField { name: "title", kind: FieldKind::NonEmptyString },
        RequiredField { name: "headline", kind: FieldKind::NonEmptyString },
        RequiredField { name: "description", kind: FieldKind::NonEmptyString },
        RequiredField { name: "keywords", kind: FieldKind::StringList },
        RequiredField { name: "properties", kind: FieldKind::Mapping },
        RequiredField { name: "machineSettings", kind: FieldKind::Mapping },
        RequiredField { name: "applications", kind: FieldKind::StringList },
        RequiredField { name: "compatibility", kind: FieldKind::Mapping },
        RequiredField { name: "author_object", kind: FieldKind::AuthorObject },
    ],
};

/// Short human-readable name of a YAML value's type.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(src: &str) -> Value {
        serde_yaml::from_str(src).expect("parse yaml")
    }

    #[test]
    fn schema_lists_fourteen_fields() {
        assert_eq!(REQUIRED_FIELDS.fields().len(), 14);
        assert!(REQUIRED_FIELDS.get("author_object").is_some());
        assert!(REQUIRED_FIELDS.get("materialProperties").is_none());
    }

    #[test]
    fn category_predicate() {
        assert!(FieldKind::CategoryName.check(&yaml("metal")).is_ok());
        assert!(FieldKind::CategoryName.check(&yaml("Metal")).is_err());
        assert!(FieldKind::CategoryName.check(&yaml("alloy")).is_err());
        assert!(FieldKind::CategoryName.check(&Value::Null).is_err());
    }

    #[test]
    fn difficulty_predicate() {
        assert!(FieldKind::DifficultyScore.check(&yaml("1")).is_ok());
        assert!(FieldKind::DifficultyScore.check(&yaml("5")).is_ok());
        assert!(FieldKind::DifficultyScore.check(&yaml("0")).is_err());
        assert!(FieldKind::DifficultyScore.check(&yaml("6")).is_err());
        assert!(FieldKind::DifficultyScore.check(&yaml("2.5")).is_err());
    }

    #[test]
    fn string_list_predicate() {
        assert!(FieldKind::StringList.check(&yaml("[a, b]")).is_ok());
        assert!(FieldKind::StringList.check(&yaml("[]")).is_err());
        assert!(FieldKind::StringList.check(&yaml("[a, 3]")).is_err());
        assert!(FieldKind::StringList.check(&yaml("a")).is_err());
    }

    #[test]
    fn author_object_predicate() {
        assert!(FieldKind::AuthorObject
            .check(&yaml("{id: 1, name: A, country: B}"))
            .is_ok());
        let err = FieldKind::AuthorObject
            .check(&yaml("{id: 1, name: A}"))
            .unwrap_err();
        assert!(err.starts_with("country"));
    }

    #[test]
    fn violations_report_missing_and_invalid() {
        let doc = yaml("{name: Copper, category: metals}");
        let violations = REQUIRED_FIELDS.violations(doc.as_mapping().unwrap());
        assert_eq!(violations.len(), 13);
        assert!(violations.iter().any(|(f, _)| *f == "category"));
        assert!(!violations.iter().any(|(f, _)| *f == "name"));
        assert_eq!(REQUIRED_FIELDS.missing(doc.as_mapping().unwrap()).len(), 12);
    }
}

//! Per-domain audit schemas.

use serde_yaml::Value;

use matkb_data::Domain;

/// Expected shape of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Text,
    Integer,
    /// A list with at least `min` entries.
    List { min: usize },
    /// A mapping with at least `min` entries.
    Map { min: usize },
}

impl Shape {
    /// Describe why `value` does not fit, or `None` when it does.
    pub fn mismatch(&self, value: &Value) -> Option<String> {
        match (self, value) {
            (Self::Text, Value::String(_)) => None,
            (Self::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => None,
            (Self::List { min }, Value::Sequence(items)) => (items.len() < *min)
                .then(|| format!("expected at least {min} entries, found {}", items.len())),
            (Self::Map { min }, Value::Mapping(map)) => (map.len() < *min)
                .then(|| format!("expected at least {min} entries, found {}", map.len())),
            (shape, other) => Some(format!(
                "expected {}, found {}",
                shape.describe(),
                matkb_shared::type_name(other)
            )),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Self::Text => "string",
            Self::Integer => "integer",
            Self::List { .. } => "list",
            Self::Map { .. } => "mapping",
        }
    }
}

/// One checked field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub name: &'static str,
    pub shape: Shape,
    /// Absence is CRITICAL when set; otherwise the field is only
    /// shape-checked when present.
    pub required: bool,
}

const fn required(name: &'static str, shape: Shape) -> FieldRule {
    FieldRule {
        name,
        shape,
        required: true,
    }
}

const fn optional(name: &'static str, shape: Shape) -> FieldRule {
    FieldRule {
        name,
        shape,
        required: false,
    }
}

/// Fields whose values must start with an ISO-8601 date.
pub const DATE_FIELDS: &[&str] = &["dateModified", "datePublished", "dateCreated", "lastUpdated"];

/// Audit rules for one domain.
#[derive(Debug, Clone, Copy)]
pub struct DomainSchema {
    pub domain: Domain,
    pub fields: &'static [FieldRule],
}

const MATERIALS: &[FieldRule] = &[
    required("name", Shape::Text),
    required("category", Shape::Text),
    required("subcategory", Shape::Text),
    required("author", Shape::Map { min: 1 }),
    required("materialProperties", Shape::Map { min: 1 }),
    optional("applications", Shape::List { min: 1 }),
    optional("regulatoryStandards", Shape::List { min: 0 }),
    optional("machineSettings", Shape::Map { min: 0 }),
];

const CONTAMINANTS: &[FieldRule] = &[
    required("name", Shape::Text),
    required("description", Shape::Text),
    required("category", Shape::Text),
    required("validMaterials", Shape::List { min: 1 }),
];

const COMPOUNDS: &[FieldRule] = &[
    required("name", Shape::Text),
    required("chemical_formula", Shape::Text),
    required("category", Shape::Text),
    optional("health_effects", Shape::List { min: 1 }),
    optional("exposure_limits", Shape::Map { min: 0 }),
];

const SETTINGS: &[FieldRule] = &[required("machineSettings", Shape::Map { min: 1 })];

const AUTHORS: &[FieldRule] = &[
    required("id", Shape::Integer),
    required("name", Shape::Text),
    required("country", Shape::Text),
];

impl DomainSchema {
    pub fn for_domain(domain: Domain) -> Self {
        let fields = match domain {
            Domain::Materials => MATERIALS,
            Domain::Contaminants => CONTAMINANTS,
            Domain::Compounds => COMPOUNDS,
            Domain::Settings => SETTINGS,
            Domain::Authors => AUTHORS,
        };
        Self { domain, fields }
    }
}

//! Core domain types for the materials knowledge base.

use std::fmt;
use std::str::FromStr;

use serde_yaml::{Mapping, Value};

/// A frontmatter document: an insertion-ordered map from field name to value.
pub type Document = Mapping;

// ---------------------------------------------------------------------------
// Category / Complexity
// ---------------------------------------------------------------------------

/// The nine material categories known to the knowledge base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Ceramic,
    Composite,
    Glass,
    Masonry,
    Metal,
    Plastic,
    Semiconductor,
    Stone,
    Wood,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Self::Ceramic,
        Self::Composite,
        Self::Glass,
        Self::Masonry,
        Self::Metal,
        Self::Plastic,
        Self::Semiconductor,
        Self::Stone,
        Self::Wood,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ceramic => "ceramic",
            Self::Composite => "composite",
            Self::Glass => "glass",
            Self::Masonry => "masonry",
            Self::Metal => "metal",
            Self::Plastic => "plastic",
            Self::Semiconductor => "semiconductor",
            Self::Stone => "stone",
            Self::Wood => "wood",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| format!("unknown category '{s}'"))
    }
}

/// Content complexity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl FromStr for Complexity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown complexity '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Property values
// ---------------------------------------------------------------------------

/// A bare scalar as found in the source YAML.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ScalarValue {
    /// Convert a YAML scalar. Returns `None` for null, sequences, and mappings.
    pub fn from_yaml(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Self::Integer(i)),
                None => n.as_f64().map(Self::Float),
            },
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Tagged(tagged) => Self::from_yaml(&tagged.value),
            Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
        }
    }

    pub fn to_yaml(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Integer(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::Text(s) => Value::String(s.clone()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Bool(_) => None,
        }
    }
}

/// A structured property record (`{value, unit, confidence, ...}`).
///
/// Any `min`/`max` present in the material file are not carried: ranges
/// come from the category table only.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructuredValue {
    pub value: Option<ScalarValue>,
    pub unit: Option<String>,
    pub confidence: Option<f64>,
    pub description: Option<String>,
}

/// A property value exactly as the material file states it.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPropertyValue {
    Scalar(ScalarValue),
    Structured(StructuredValue),
}

impl RawPropertyValue {
    /// Classify a YAML value. Null and sequences are not property values.
    pub fn from_yaml(value: &Value) -> Option<Self> {
        match value {
            Value::Mapping(map) => Some(Self::Structured(StructuredValue {
                value: map.get("value").and_then(ScalarValue::from_yaml),
                unit: map.get("unit").and_then(Value::as_str).map(str::to_string),
                confidence: map.get("confidence").and_then(Value::as_f64),
                description: map
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })),
            Value::Tagged(tagged) => Self::from_yaml(&tagged.value),
            other => ScalarValue::from_yaml(other).map(Self::Scalar),
        }
    }
}

/// A property value annotated with its category range.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProperty {
    pub value: Option<ScalarValue>,
    pub unit: String,
    /// `None` means the category declares no range for this property.
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub confidence: f64,
    pub description: Option<String>,
}

impl ResolvedProperty {
    /// Render as a mapping. `min`/`max` are always present, as null when unranged.
    pub fn to_yaml(&self) -> Value {
        let mut map = Mapping::new();
        map.insert(
            "value".into(),
            self.value.as_ref().map_or(Value::Null, ScalarValue::to_yaml),
        );
        map.insert("unit".into(), Value::String(self.unit.clone()));
        map.insert("min".into(), self.min.map_or(Value::Null, Value::from));
        map.insert("max".into(), self.max.map_or(Value::Null, Value::from));
        map.insert("confidence".into(), Value::from(self.confidence));
        if let Some(desc) = &self.description {
            map.insert("description".into(), Value::String(desc.clone()));
        }
        Value::Mapping(map)
    }
}

// ---------------------------------------------------------------------------
// AuthorRecord
// ---------------------------------------------------------------------------

/// A validated author sub-record.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorRecord {
    pub id: u64,
    pub name: String,
    pub country: String,
    pub title: Option<String>,
    pub sex: Option<String>,
    pub expertise: Vec<String>,
    pub image: Option<String>,
}

impl AuthorRecord {
    /// Validate a raw author mapping.
    ///
    /// `id` must be a positive integer; `name` and `country` must be non-empty strings.
    pub fn from_mapping(map: &Mapping) -> std::result::Result<Self, String> {
        let id = match map.get("id") {
            Some(Value::Number(n)) => match n.as_u64() {
                Some(id) if id > 0 => id,
                _ => return Err(format!("author id must be a positive integer, got {n}")),
            },
            Some(other) => return Err(format!("author id must be an integer, got {other:?}")),
            None => return Err("author id is missing".into()),
        };

        let name = required_str(map, "name")?;
        let country = required_str(map, "country")?;

        let expertise = match map.get("expertise") {
            Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
            Some(Value::Sequence(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };

        Ok(Self {
            id,
            name,
            country,
            title: optional_str(map, "title"),
            sex: optional_str(map, "sex"),
            expertise,
            image: optional_str(map, "image"),
        })
    }

    /// The author substituted when nothing better is available.
    pub fn system_default() -> Self {
        Self {
            id: 1,
            name: "System Generated".into(),
            country: "International".into(),
            title: Some("Technical Writer".into()),
            sex: None,
            expertise: vec!["Laser Cleaning".into()],
            image: None,
        }
    }

    pub fn to_mapping(&self) -> Mapping {
        let mut map = Mapping::new();
        map.insert("id".into(), Value::from(self.id));
        map.insert("name".into(), Value::String(self.name.clone()));
        map.insert("country".into(), Value::String(self.country.clone()));
        if let Some(title) = &self.title {
            map.insert("title".into(), Value::String(title.clone()));
        }
        if let Some(sex) = &self.sex {
            map.insert("sex".into(), Value::String(sex.clone()));
        }
        if !self.expertise.is_empty() {
            map.insert(
                "expertise".into(),
                Value::Sequence(self.expertise.iter().cloned().map(Value::String).collect()),
            );
        }
        if let Some(image) = &self.image {
            map.insert("image".into(), Value::String(image.clone()));
        }
        map
    }
}

fn required_str(map: &Mapping, key: &str) -> std::result::Result<String, String> {
    match map.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) => Err(format!("author {key} is empty")),
        Some(_) => Err(format!("author {key} must be a string")),
        None => Err(format!("author {key} is missing")),
    }
}

fn optional_str(map: &Mapping, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// MaterialRecord
// ---------------------------------------------------------------------------

/// Read-only view over one raw material entry from `Materials.yaml`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MaterialRecord(Mapping);

impl MaterialRecord {
    pub fn new(raw: Mapping) -> Self {
        Self(raw)
    }

    /// Interpret an arbitrary YAML value as a material record, if it is a mapping.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_mapping().cloned().map(Self)
    }

    pub fn raw(&self) -> &Mapping {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Non-empty string field, trimmed.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn name(&self) -> Option<&str> {
        self.str_field("name")
    }

    pub fn category(&self) -> Option<&str> {
        self.str_field("category")
    }

    pub fn subcategory(&self) -> Option<&str> {
        self.str_field("subcategory")
    }

    pub fn author(&self) -> Option<&Mapping> {
        self.0.get("author").and_then(Value::as_mapping)
    }

    pub fn material_properties(&self) -> Option<&Mapping> {
        self.0.get("materialProperties").and_then(Value::as_mapping)
    }

    pub fn machine_settings(&self) -> Option<&Mapping> {
        self.0.get("machineSettings").and_then(Value::as_mapping)
    }

    pub fn regulatory_standards(&self) -> Option<&Vec<Value>> {
        self.0
            .get("regulatoryStandards")
            .and_then(Value::as_sequence)
    }

    pub fn images(&self) -> Option<&Mapping> {
        self.0.get("images").and_then(Value::as_mapping)
    }

    pub fn caption(&self) -> Option<&Value> {
        self.0.get("caption")
    }

    /// `applications` as a list of non-empty strings.
    pub fn applications(&self) -> Vec<String> {
        self.string_list("applications")
    }

    /// Any list-of-strings field; a single string is treated as a one-item list.
    pub fn string_list(&self, key: &str) -> Vec<String> {
        match self.0.get(key) {
            Some(Value::Sequence(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
            _ => Vec::new(),
        }
    }
}

/// Lowercase, dash-separated slug (`"Stainless Steel 316"` -> `"stainless-steel-316"`).
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

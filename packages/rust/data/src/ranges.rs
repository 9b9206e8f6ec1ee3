//! Category Range Table: category → property → `{min, max, unit}`.
//!
//! Loaded once from the category reference file and shared read-only by
//! every resolver. This table is the only source of `min`/`max` values in
//! generated documents.

use std::collections::BTreeMap;
use std::path::Path;

use serde_yaml::{Mapping, Value};
use tracing::{debug, info, instrument};

use matkb_shared::{MatKbError, Result};

/// Key under a category holding material property ranges.
const PROPERTY_RANGES_KEY: &str = "category_ranges";

/// Key under a category holding machine setting ranges.
const SETTING_RANGES_KEY: &str = "machine_settings_ranges";

/// The one range entry allowed to be a bare string.
const THERMAL_DESTRUCTION_KEY: &str = "thermalDestructionType";

/// A declared range for one property.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeSpec {
    pub min: f64,
    pub max: f64,
    pub unit: String,
}

/// Everything the reference file declares for one category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryRanges {
    pub properties: BTreeMap<String, RangeSpec>,
    pub settings: BTreeMap<String, RangeSpec>,
    pub thermal_destruction_type: Option<String>,
    pub description: Option<String>,
}

/// Immutable lookup table built from the `categories` map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryRangeTable {
    categories: BTreeMap<String, CategoryRanges>,
}

impl CategoryRangeTable {
    /// Load and validate the category reference file.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| MatKbError::io(path, e))?;
        let table = Self::from_yaml_str(&content)?;
        info!(categories = table.len(), "category ranges loaded");
        Ok(table)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let root: Value = serde_yaml::from_str(content)
            .map_err(|e| MatKbError::parse(format!("category file: {e}")))?;
        Self::from_yaml(&root)
    }

    /// Build from a parsed document with a top-level `categories` map.
    ///
    /// Fails fast on a range without a unit, with non-numeric bounds, or
    /// with `min >= max`. Nothing is defaulted.
    pub fn from_yaml(root: &Value) -> Result<Self> {
        let categories = root
            .get("categories")
            .and_then(Value::as_mapping)
            .ok_or_else(|| MatKbError::validation("category file has no 'categories' map"))?;

        let mut table = BTreeMap::new();
        for (key, entry) in categories {
            let name = key
                .as_str()
                .ok_or_else(|| MatKbError::validation(format!("non-string category key {key:?}")))?;
            let entry = entry.as_mapping().ok_or_else(|| {
                MatKbError::validation(format!("category '{name}' must be a mapping"))
            })?;
            table.insert(name.to_string(), parse_category(name, entry)?);
        }

        Ok(Self { categories: table })
    }

    pub fn contains(&self, category: &str) -> bool {
        self.categories.contains_key(category)
    }

    pub fn category(&self, category: &str) -> Option<&CategoryRanges> {
        self.categories.get(category)
    }

    /// Declared range for a material property, if the category has one.
    pub fn property_range(&self, category: &str, property: &str) -> Option<&RangeSpec> {
        self.categories.get(category)?.properties.get(property)
    }

    /// Declared range for a machine setting, if the category has one.
    pub fn setting_range(&self, category: &str, setting: &str) -> Option<&RangeSpec> {
        self.categories.get(category)?.settings.get(setting)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

fn parse_category(name: &str, entry: &Mapping) -> Result<CategoryRanges> {
    let mut ranges = CategoryRanges {
        description: entry
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        ..CategoryRanges::default()
    };

    if let Some(props) = entry.get(PROPERTY_RANGES_KEY) {
        let props = props.as_mapping().ok_or_else(|| {
            MatKbError::validation(format!("{name}.{PROPERTY_RANGES_KEY} must be a mapping"))
        })?;
        for (key, value) in props {
            let prop = key.as_str().ok_or_else(|| {
                MatKbError::validation(format!("non-string property key in '{name}'"))
            })?;
            if prop == THERMAL_DESTRUCTION_KEY {
                ranges.thermal_destruction_type = value.as_str().map(str::to_string);
                continue;
            }
            ranges
                .properties
                .insert(prop.to_string(), parse_range(name, prop, value)?);
        }
    } else {
        debug!(category = name, "category declares no property ranges");
    }

    if let Some(settings) = entry.get(SETTING_RANGES_KEY) {
        let settings = settings.as_mapping().ok_or_else(|| {
            MatKbError::validation(format!("{name}.{SETTING_RANGES_KEY} must be a mapping"))
        })?;
        for (key, value) in settings {
            let setting = key.as_str().ok_or_else(|| {
                MatKbError::validation(format!("non-string setting key in '{name}'"))
            })?;
            ranges
                .settings
                .insert(setting.to_string(), parse_range(name, setting, value)?);
        }
    }

    Ok(ranges)
}

fn parse_range(category: &str, property: &str, value: &Value) -> Result<RangeSpec> {
    let invalid = |message: String| MatKbError::InvalidRange {
        category: category.to_string(),
        property: property.to_string(),
        message,
    };

    let map = value
        .as_mapping()
        .ok_or_else(|| invalid("expected {min, max, unit}".into()))?;
    let min = map
        .get("min")
        .and_then(Value::as_f64)
        .ok_or_else(|| invalid("min missing or not numeric".into()))?;
    let max = map
        .get("max")
        .and_then(Value::as_f64)
        .ok_or_else(|| invalid("max missing or not numeric".into()))?;
    let unit = map
        .get("unit")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("unit missing".into()))?;

    if !min.is_finite() || !max.is_finite() {
        return Err(invalid(format!("bounds must be finite, got min {min} max {max}")));
    }
    if min >= max {
        return Err(invalid(format!("min {min} must be below max {max}")));
    }

    Ok(RangeSpec {
        min,
        max,
        unit: unit.to_string(),
    })
}

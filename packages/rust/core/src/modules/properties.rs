//! Property resolution: material values paired with category ranges.
//!
//! Values, units and confidence come from the material record. `min` and
//! `max` come from the [`CategoryRangeTable`] and nowhere else; a property
//! the category does not range keeps `min`/`max` as null. An unknown
//! category is the one hard failure.

use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

use matkb_data::{CategoryRangeTable, RangeSpec};
use matkb_shared::{
    Document, MatKbError, MaterialRecord, RawPropertyValue, ResolvedProperty, Result,
};

use super::{GenerationModule, ResolverContext, label_from_key};

/// Group that collects properties listed directly under `materialProperties`.
pub(crate) const UNGROUPED_KEY: &str = "other_properties";

/// Confidence assigned when the material file states none.
const DEFAULT_CONFIDENCE: f64 = 1.0;

/// One labelled group of resolved properties.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedGroup {
    pub key: String,
    pub label: String,
    pub description: Option<String>,
    pub percentage: Option<Value>,
    pub properties: Vec<(String, ResolvedProperty)>,
}

impl ResolvedGroup {
    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label_from_key(key),
            description: None,
            percentage: None,
            properties: Vec::new(),
        }
    }

    pub fn get(&self, property: &str) -> Option<&ResolvedProperty> {
        self.properties
            .iter()
            .find(|(name, _)| name == property)
            .map(|(_, p)| p)
    }

    pub fn to_yaml(&self) -> Value {
        let mut map = Mapping::new();
        map.insert("label".into(), Value::String(self.label.clone()));
        if let Some(desc) = &self.description {
            map.insert("description".into(), Value::String(desc.clone()));
        }
        if let Some(pct) = &self.percentage {
            map.insert("percentage".into(), pct.clone());
        }
        for (name, prop) in &self.properties {
            map.insert(Value::String(name.clone()), prop.to_yaml());
        }
        Value::Mapping(map)
    }
}

/// All resolved property groups for one material, in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedPropertyGroups {
    pub groups: Vec<ResolvedGroup>,
}

impl ResolvedPropertyGroups {
    pub fn group(&self, key: &str) -> Option<&ResolvedGroup> {
        self.groups.iter().find(|g| g.key == key)
    }

    /// First property with this name in any group.
    pub fn find(&self, property: &str) -> Option<&ResolvedProperty> {
        self.groups.iter().find_map(|g| g.get(property))
    }

    pub fn property_count(&self) -> usize {
        self.groups.iter().map(|g| g.properties.len()).sum()
    }

    /// Categorized mapping: `group -> {label, description?, prop -> resolved}`.
    pub fn to_mapping(&self) -> Mapping {
        let mut map = Mapping::new();
        for group in &self.groups {
            map.insert(Value::String(group.key.clone()), group.to_yaml());
        }
        map
    }
}

/// Pair one raw value with an optional category range.
pub fn resolve_value(raw: &RawPropertyValue, range: Option<&RangeSpec>) -> ResolvedProperty {
    let (min, max) = range.map_or((None, None), |r| (Some(r.min), Some(r.max)));
    match raw {
        RawPropertyValue::Scalar(value) => ResolvedProperty {
            value: Some(value.clone()),
            unit: String::new(),
            min,
            max,
            confidence: DEFAULT_CONFIDENCE,
            description: None,
        },
        RawPropertyValue::Structured(s) => ResolvedProperty {
            value: s.value.clone(),
            unit: s.unit.clone().unwrap_or_default(),
            min,
            max,
            confidence: s.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            description: s.description.clone(),
        },
    }
}

/// Resolve every property of a material against its category's ranges.
///
/// Fails only when the category is missing or not a key of `ranges`.
pub fn resolve_properties(
    material: &str,
    record: &MaterialRecord,
    ranges: &CategoryRangeTable,
) -> Result<ResolvedPropertyGroups> {
    let category = require_category(material, record, ranges)?;

    let Some(source) = record.material_properties() else {
        debug!(material, "no materialProperties");
        return Ok(ResolvedPropertyGroups::default());
    };

    let mut groups: Vec<ResolvedGroup> = Vec::new();
    let mut ungrouped = ResolvedGroup::new(UNGROUPED_KEY);

    for (key, value) in source {
        let Some(key) = key.as_str() else {
            warn!(material, ?key, "non-string property key, skipping");
            continue;
        };

        match value {
            Value::Mapping(map) if is_group(map) => {
                groups.push(resolve_group(material, category, key, map, ranges));
            }
            other => {
                if let Some(prop) = resolve_one(material, category, key, other, ranges) {
                    ungrouped.properties.push((key.to_string(), prop));
                }
            }
        }
    }

    if !ungrouped.properties.is_empty() {
        groups.push(ungrouped);
    }

    Ok(ResolvedPropertyGroups { groups })
}

/// Compact `{property: value}` view of a property map.
///
/// Accepts grouped or flat input, resolved or raw; group metadata keys are
/// skipped and the first occurrence of a property name wins.
pub fn summarize_properties(props: &Mapping) -> Mapping {
    let mut summary = Mapping::new();
    let mut add = |key: &Value, value: &Value| {
        let value = match value {
            Value::Mapping(m) => m.get("value").cloned().unwrap_or(Value::Null),
            other => other.clone(),
        };
        if !value.is_null() && !value.is_sequence() && !summary.contains_key(key) {
            summary.insert(key.clone(), value);
        }
    };

    for (key, value) in props {
        match value {
            Value::Mapping(map) if is_group(map) => {
                for (prop, v) in map {
                    let is_meta = prop
                        .as_str()
                        .is_some_and(|p| matches!(p, "label" | "description" | "percentage"));
                    if !is_meta {
                        add(prop, v);
                    }
                }
            }
            other => add(key, other),
        }
    }
    summary
}

/// Check the record's category against the range table.
pub(crate) fn require_category<'r>(
    material: &str,
    record: &'r MaterialRecord,
    ranges: &CategoryRangeTable,
) -> Result<&'r str> {
    let category = record.category().ok_or_else(|| {
        MatKbError::validation(format!("material '{material}' has no category"))
    })?;
    if !ranges.contains(category) {
        return Err(MatKbError::CategoryNotFound {
            material: material.to_string(),
            category: category.to_string(),
        });
    }
    Ok(category)
}

/// A mapping is a property record when it has a `value` key, or when it
/// carries `unit`/`confidence` and holds no nested mappings. Any other
/// mapping is a group.
fn is_group(map: &Mapping) -> bool {
    if map.contains_key("value") {
        return false;
    }
    let has_record_keys = map.contains_key("unit") || map.contains_key("confidence");
    !(has_record_keys && !map.values().any(Value::is_mapping))
}

fn resolve_group(
    material: &str,
    category: &str,
    key: &str,
    map: &Mapping,
    ranges: &CategoryRangeTable,
) -> ResolvedGroup {
    let mut group = ResolvedGroup::new(key);

    for (prop_key, value) in map {
        let Some(prop_key) = prop_key.as_str() else {
            continue;
        };
        match prop_key {
            "label" => {
                if let Some(label) = value.as_str().filter(|s| !s.trim().is_empty()) {
                    group.label = label.to_string();
                }
            }
            "description" => group.description = value.as_str().map(str::to_string),
            "percentage" => group.percentage = Some(value.clone()),
            _ => {
                if let Some(prop) = resolve_one(material, category, prop_key, value, ranges) {
                    group.properties.push((prop_key.to_string(), prop));
                }
            }
        }
    }

    group
}

fn resolve_one(
    material: &str,
    category: &str,
    property: &str,
    value: &Value,
    ranges: &CategoryRangeTable,
) -> Option<ResolvedProperty> {
    let Some(raw) = RawPropertyValue::from_yaml(value) else {
        warn!(material, property, "property value is null or a list, skipping");
        return None;
    };

    let range = ranges.property_range(category, property);
    if range.is_none() {
        debug!(material, category, property, "no declared range for property");
    }
    Some(resolve_value(&raw, range))
}

/// Emits `materialProperties`, plus `materialCharacteristics` when the
/// category declares a thermal destruction type.
pub struct PropertiesModule;

impl GenerationModule for PropertiesModule {
    fn generate(
        &self,
        material: &str,
        record: &MaterialRecord,
        ctx: &ResolverContext<'_>,
    ) -> Result<Document> {
        let resolved = resolve_properties(material, record, ctx.ranges)?;
        debug!(
            material,
            groups = resolved.groups.len(),
            properties = resolved.property_count(),
            "properties resolved"
        );

        let categorized = resolved.to_mapping();
        let mut doc = Document::new();
        doc.insert("properties".into(), Value::Mapping(summarize_properties(&categorized)));
        doc.insert("materialProperties".into(), Value::Mapping(categorized));

        let thermal = record
            .category()
            .and_then(|c| ctx.ranges.category(c))
            .and_then(|c| c.thermal_destruction_type.as_deref());
        if let Some(thermal) = thermal {
            let mut characteristics = Mapping::new();
            characteristics.insert(
                "thermalDestructionType".into(),
                Value::String(thermal.to_string()),
            );
            doc.insert(
                "materialCharacteristics".into(),
                Value::Mapping(characteristics),
            );
        }

        Ok(doc)
    }

    fn name(&self) -> &str {
        "properties"
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{Fixture, record};
    use super::*;
    use matkb_shared::ScalarValue;

    #[test]
    fn copper_density_takes_category_range() {
        let fx = Fixture::new();
        let copper = record(
            r#"
name: Copper
category: metal
materialProperties:
  material_characteristics:
    label: Material Characteristics
    density: {value: 8.96, unit: g/cm³, confidence: 0.95, min: 8.0, max: 9.5}
"#,
        );

        let resolved = resolve_properties("Copper", &copper, &fx.ranges).unwrap();
        let density = resolved.find("density").unwrap();
        assert_eq!(
            density,
            &ResolvedProperty {
                value: Some(ScalarValue::Float(8.96)),
                unit: "g/cm³".into(),
                min: Some(0.53),
                max: Some(22.6),
                confidence: 0.95,
                description: None,
            }
        );
    }

    #[test]
    fn unranged_property_has_null_bounds() {
        let fx = Fixture::new();
        let stucco = record(
            r#"
name: Stucco
category: masonry
materialProperties:
  material_characteristics:
    compressiveStrength: {value: 12, unit: MPa, confidence: 0.7}
"#,
        );

        let resolved = resolve_properties("Stucco", &stucco, &fx.ranges).unwrap();
        let strength = resolved.find("compressiveStrength").unwrap();
        assert_eq!(strength.value, Some(ScalarValue::Integer(12)));
        assert_eq!(strength.min, None);
        assert_eq!(strength.max, None);

        let rendered = resolved.to_mapping();
        let group = rendered
            .get("material_characteristics")
            .and_then(Value::as_mapping)
            .unwrap();
        let strength = group.get("compressiveStrength").and_then(Value::as_mapping).unwrap();
        assert_eq!(strength.get("min"), Some(&Value::Null));
        assert_eq!(strength.get("max"), Some(&Value::Null));
        assert_eq!(
            group.get("label").and_then(Value::as_str),
            Some("Material Characteristics")
        );
    }

    #[test]
    fn unknown_category_fails_fast() {
        let fx = Fixture::new();
        let bad = record("{name: Quartz, category: crystal, materialProperties: {density: 2.6}}");
        let err = resolve_properties("Quartz", &bad, &fx.ranges).unwrap_err();
        match err {
            MatKbError::CategoryNotFound { material, category } => {
                assert_eq!(material, "Quartz");
                assert_eq!(category, "crystal");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn known_category_without_properties_is_ok() {
        let fx = Fixture::new();
        let bare = record("{name: Brick, category: masonry}");
        let resolved = resolve_properties("Brick", &bare, &fx.ranges).unwrap();
        assert!(resolved.groups.is_empty());
    }

    #[test]
    fn scalar_gets_empty_unit_and_full_confidence() {
        let fx = Fixture::new();
        let flat = record("{name: Tin, category: metal, materialProperties: {density: 7.3, reflectivity: 0.7}}");
        let resolved = resolve_properties("Tin", &flat, &fx.ranges).unwrap();

        assert_eq!(resolved.groups.len(), 1);
        assert_eq!(resolved.groups[0].key, UNGROUPED_KEY);

        let density = resolved.find("density").unwrap();
        assert_eq!(density.unit, "");
        assert_eq!(density.confidence, 1.0);
        assert_eq!(density.min, Some(0.53));

        let reflectivity = resolved.find("reflectivity").unwrap();
        assert_eq!(reflectivity.min, None);
    }

    #[test]
    fn material_file_bounds_never_leak() {
        let fx = Fixture::new();
        let rec = record(
            "{name: Copper, category: metal, materialProperties: {g: {thermalConductivity: {value: 401, min: 1, max: 2}}}}",
        );
        let resolved = resolve_properties("Copper", &rec, &fx.ranges).unwrap();
        let k = resolved.find("thermalConductivity").unwrap();
        assert_eq!((k.min, k.max), (Some(6.0), Some(429.0)));
        assert_eq!(k.unit, "");
    }

    #[test]
    fn unit_comes_from_material_only() {
        let fx = Fixture::new();
        let rec = record(
            "{name: Copper, category: metal, materialProperties: {g: {density: {value: 8.96}, thermalConductivity: {value: 401, unit: W/mK}}}}",
        );
        let resolved = resolve_properties("Copper", &rec, &fx.ranges).unwrap();
        let density = resolved.find("density").unwrap();
        assert_eq!(density.unit, "");
        assert_eq!((density.min, density.max), (Some(0.53), Some(22.6)));
        assert_eq!(resolved.find("thermalConductivity").unwrap().unit, "W/mK");
    }

    #[test]
    fn flat_record_without_value_is_a_property() {
        let fx = Fixture::new();
        let rec = record(
            "{name: Copper, category: metal, materialProperties: {hardness: {unit: HV, confidence: 0.5}, g: {label: G, unit: {value: 1}}}}",
        );
        let resolved = resolve_properties("Copper", &rec, &fx.ranges).unwrap();
        assert!(resolved.group("hardness").is_none());
        let ungrouped = resolved.group(UNGROUPED_KEY).unwrap();
        let hardness = ungrouped.get("hardness").unwrap();
        assert_eq!(hardness.unit, "HV");
        assert_eq!(hardness.confidence, 0.5);
        assert_eq!(hardness.value, None);
        // A group that happens to hold a property named `unit` stays a group.
        assert!(resolved.group("g").unwrap().get("unit").is_some());
    }

    #[test]
    fn null_values_are_skipped() {
        let fx = Fixture::new();
        let rec = record("{name: Copper, category: metal, materialProperties: {g: {density: null, hardness: 50}}}");
        let resolved = resolve_properties("Copper", &rec, &fx.ranges).unwrap();
        assert!(resolved.find("density").is_none());
        assert!(resolved.find("hardness").is_some());
    }

    #[test]
    fn module_emits_thermal_destruction_type() {
        let fx = Fixture::new();
        let rec = record("{name: Copper, category: metal, materialProperties: {density: 8.96}}");
        let doc = PropertiesModule.generate("Copper", &rec, &fx.ctx()).unwrap();
        let characteristics = doc
            .get("materialCharacteristics")
            .and_then(Value::as_mapping)
            .unwrap();
        assert_eq!(
            characteristics.get("thermalDestructionType").and_then(Value::as_str),
            Some("melting")
        );
        assert!(doc.get("materialProperties").is_some_and(Value::is_mapping));
        let summary = doc.get("properties").and_then(Value::as_mapping).unwrap();
        assert_eq!(summary.get("density"), Some(&Value::from(8.96)));
    }

    #[test]
    fn summary_flattens_groups() {
        let props: Mapping = serde_yaml::from_str(
            r#"
thermal:
  label: Thermal
  conductivity: {value: 401, unit: W/(m·K)}
  meltingPoint: null
density: 8.96
hardness: {value: 50}
"#,
        )
        .unwrap();
        let summary = summarize_properties(&props);
        assert_eq!(summary.len(), 3);
        assert_eq!(summary.get("conductivity"), Some(&Value::from(401)));
        assert!(!summary.contains_key("label"));
        assert!(!summary.contains_key("meltingPoint"));
    }
}

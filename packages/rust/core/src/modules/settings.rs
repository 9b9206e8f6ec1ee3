//! Machine settings resolution.
//!
//! Same pairing rule as material properties, against the category's
//! `machine_settings_ranges`.

use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

use matkb_data::CategoryRangeTable;
use matkb_shared::{Document, MaterialRecord, RawPropertyValue, ResolvedProperty, Result};

use super::properties::require_category;
use super::{GenerationModule, ResolverContext, resolve_value};

/// Resolve machine settings for one material.
///
/// Settings come from the material record, else from the `settings`
/// domain entry keyed by the material name. Returns settings in source order.
pub fn resolve_settings(
    material: &str,
    record: &MaterialRecord,
    ranges: &CategoryRangeTable,
    settings_domain: &Mapping,
) -> Result<Vec<(String, ResolvedProperty)>> {
    let category = require_category(material, record, ranges)?;

    let Some(source) = settings_source(material, record, settings_domain) else {
        debug!(material, "no machine settings available");
        return Ok(Vec::new());
    };

    let mut resolved = Vec::with_capacity(source.len());
    for (key, value) in source {
        let Some(setting) = key.as_str() else {
            continue;
        };
        let Some(raw) = RawPropertyValue::from_yaml(value) else {
            warn!(material, setting, "setting value is null or a list, skipping");
            continue;
        };
        let range = ranges.setting_range(category, setting);
        if range.is_none() {
            debug!(material, category, setting, "no declared range for setting");
        }
        resolved.push((setting.to_string(), resolve_value(&raw, range)));
    }
    Ok(resolved)
}

fn settings_source<'a>(
    material: &str,
    record: &'a MaterialRecord,
    settings_domain: &'a Mapping,
) -> Option<&'a Mapping> {
    if let Some(own) = record.machine_settings() {
        return Some(own);
    }

    let entry = settings_domain
        .get(material)
        .or_else(|| record.name().and_then(|name| settings_domain.get(name)))?;
    let settings = entry.get("machineSettings").and_then(Value::as_mapping);
    if settings.is_some() {
        debug!(material, "machine settings taken from settings domain");
    }
    settings
}

/// Emits `machineSettings`.
pub struct SettingsModule;

impl GenerationModule for SettingsModule {
    fn generate(
        &self,
        material: &str,
        record: &MaterialRecord,
        ctx: &ResolverContext<'_>,
    ) -> Result<Document> {
        let settings = resolve_settings(material, record, ctx.ranges, ctx.settings)?;

        let mut map = Mapping::new();
        for (name, prop) in &settings {
            map.insert(Value::String(name.clone()), prop.to_yaml());
        }

        let mut doc = Document::new();
        doc.insert("machineSettings".into(), Value::Mapping(map));
        Ok(doc)
    }

    fn name(&self) -> &str {
        "settings"
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{Fixture, record};
    use super::*;
    use matkb_shared::{MatKbError, ScalarValue};

    #[test]
    fn own_settings_pair_with_setting_ranges() {
        let fx = Fixture::new();
        let copper = record(
            "{name: Copper, category: metal, machineSettings: {powerRange: {value: 100, unit: W}, scanSpeed: 500}}",
        );
        let settings = resolve_settings("Copper", &copper, &fx.ranges, &fx.settings).unwrap();
        assert_eq!(settings.len(), 2);

        let (name, power) = &settings[0];
        assert_eq!(name, "powerRange");
        assert_eq!(power.value, Some(ScalarValue::Integer(100)));
        assert_eq!((power.min, power.max), (Some(20.0), Some(500.0)));

        let (_, speed) = &settings[1];
        assert_eq!((speed.min, speed.max), (None, None));
    }

    #[test]
    fn falls_back_to_settings_domain() {
        let mut fx = Fixture::new();
        fx.settings = serde_yaml::from_str(
            "Stucco: {machineSettings: {repetitionRate: {value: 50, unit: kHz}}}",
        )
        .unwrap();
        let stucco = record("{name: Stucco, category: masonry}");

        let doc = SettingsModule.generate("Stucco", &stucco, &fx.ctx()).unwrap();
        let settings = doc.get("machineSettings").and_then(Value::as_mapping).unwrap();
        let rate = settings.get("repetitionRate").and_then(Value::as_mapping).unwrap();
        assert_eq!(rate.get("unit").and_then(Value::as_str), Some("kHz"));
        assert_eq!(rate.get("min"), Some(&Value::Null));
    }

    #[test]
    fn no_settings_yields_empty_map() {
        let fx = Fixture::new();
        let oak = record("{name: Brick, category: masonry}");
        let doc = SettingsModule.generate("Brick", &oak, &fx.ctx()).unwrap();
        assert_eq!(
            doc.get("machineSettings").and_then(Value::as_mapping).map(Mapping::len),
            Some(0)
        );
    }

    #[test]
    fn unknown_category_fails_fast() {
        let fx = Fixture::new();
        let bad = record("{name: Quartz, category: crystal}");
        let err = resolve_settings("Quartz", &bad, &fx.ranges, &fx.settings).unwrap_err();
        assert!(matches!(err, MatKbError::CategoryNotFound { .. }));
    }
}

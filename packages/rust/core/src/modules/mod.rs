//! Per-domain generation modules and the trait they share.
//!
//! Each module reads the raw material record plus the shared read-only
//! reference data and returns a partial document. The orchestrator merges
//! the partial documents in [`ModuleRegistry`] order.

mod author;
mod compliance;
mod faq;
mod media;
mod metadata;
mod properties;
mod settings;

use serde_yaml::{Mapping, Value};

use matkb_data::{AuthorRegistry, CategoryRangeTable};
use matkb_shared::{Document, MaterialRecord, Result};

pub use author::{AuthorModule, resolve_author};
pub use compliance::ComplianceModule;
pub use faq::FaqModule;
pub use media::MediaModule;
pub use metadata::MetadataModule;
pub use properties::{
    PropertiesModule, ResolvedGroup, ResolvedPropertyGroups, resolve_properties, resolve_value,
    summarize_properties,
};
pub use settings::{SettingsModule, resolve_settings};

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Read-only reference data shared by every module.
///
/// Built once per process and passed by reference; nothing in here is
/// mutated during generation.
#[derive(Debug, Clone, Copy)]
pub struct ResolverContext<'a> {
    pub ranges: &'a CategoryRangeTable,
    pub authors: &'a AuthorRegistry,
    /// The `settings` domain, keyed by material name.
    pub settings: &'a Mapping,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// One step of document generation.
pub trait GenerationModule: Send + Sync {
    /// Produce this module's fields for one material.
    fn generate(
        &self,
        material: &str,
        record: &MaterialRecord,
        ctx: &ResolverContext<'_>,
    ) -> Result<Document>;

    /// Human-readable module name for tracing.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds the generation modules in invocation order.
pub struct ModuleRegistry {
    modules: Vec<Box<dyn GenerationModule>>,
}

impl ModuleRegistry {
    /// The standard sequence: metadata, author, properties, machine settings,
    /// compliance, media. FAQ is optional and handled by the orchestrator.
    pub fn new() -> Self {
        Self {
            modules: vec![
                Box::new(MetadataModule),
                Box::new(AuthorModule),
                Box::new(PropertiesModule),
                Box::new(SettingsModule),
                Box::new(ComplianceModule),
                Box::new(MediaModule),
            ],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(dyn GenerationModule + 'static)> {
        self.modules.iter().map(|m| m.as_ref())
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Merge `part` into `doc` by key; later values overwrite earlier ones.
pub(crate) fn merge_into(doc: &mut Document, part: Document) {
    for (key, value) in part {
        doc.insert(key, value);
    }
}

/// Human label from a snake/kebab key (`material_characteristics` -> `Material Characteristics`).
pub(crate) fn label_from_key(key: &str) -> String {
    key.split(['_', '-'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(c) => {
                    let upper: String = c.to_uppercase().collect();
                    format!("{upper}{}", chars.as_str())
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn string_seq(items: &[String]) -> Value {
    Value::Sequence(items.iter().cloned().map(Value::String).collect())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub const CATEGORIES: &str = r#"
categories:
  metal:
    category_ranges:
      density: {min: 0.53, max: 22.6, unit: g/cm³}
      thermalConductivity: {min: 6.0, max: 429.0, unit: W/(m·K)}
      thermalDestructionType: melting
    machine_settings_ranges:
      powerRange: {min: 20, max: 500, unit: W}
  masonry:
    category_ranges:
      density: {min: 1.6, max: 2.4, unit: g/cm³}
"#;

    pub const AUTHORS: &str = r#"
1: {id: 1, name: Yi-Chun Lin, country: Taiwan, title: Ph.D.}
2: {id: 2, name: Alessandro Moretti, country: Italy}
"#;

    pub struct Fixture {
        pub ranges: CategoryRangeTable,
        pub authors: AuthorRegistry,
        pub settings: Mapping,
    }

    impl Fixture {
        pub fn new() -> Self {
            let authors: Mapping = serde_yaml::from_str(AUTHORS).unwrap();
            Self {
                ranges: CategoryRangeTable::from_yaml_str(CATEGORIES).unwrap(),
                authors: AuthorRegistry::from_domain(&authors),
                settings: Mapping::new(),
            }
        }

        pub fn ctx(&self) -> ResolverContext<'_> {
            ResolverContext {
                ranges: &self.ranges,
                authors: &self.authors,
                settings: &self.settings,
            }
        }
    }

    pub fn record(src: &str) -> MaterialRecord {
        MaterialRecord::new(serde_yaml::from_str(src).unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_order_is_fixed() {
        let names: Vec<_> = ModuleRegistry::new().iter().map(|m| m.name().to_string()).collect();
        assert_eq!(
            names,
            ["metadata", "author", "properties", "settings", "compliance", "media"]
        );
    }

    #[test]
    fn labels_from_keys() {
        assert_eq!(label_from_key("material_characteristics"), "Material Characteristics");
        assert_eq!(label_from_key("laser-material_interaction"), "Laser Material Interaction");
        assert_eq!(label_from_key(""), "");
    }

    #[test]
    fn merge_overwrites_by_key() {
        let mut doc = Document::new();
        doc.insert("caption".into(), "stale".into());
        doc.insert("name".into(), "Copper".into());
        let mut part = Document::new();
        part.insert("caption".into(), "fresh".into());
        merge_into(&mut doc, part);
        assert_eq!(doc.get("caption").and_then(Value::as_str), Some("fresh"));
        assert_eq!(doc.len(), 2);
    }
}

//! Orchestrator: material record → module sequence → ordered document.

use std::collections::BTreeMap;
use std::time::Instant;

use serde_yaml::{Mapping, Value};
use tracing::{debug, info, instrument, warn};

use matkb_shared::{Document, MatKbError, MaterialRecord, Result};

use crate::GENERATOR;
use crate::modules::{FaqModule, GenerationModule, ModuleRegistry, ResolverContext, merge_into};
use crate::normalizer::{FallbackLevel, NormalizedDocument, Normalizer, NormalizerStats};
use crate::ordering::{self, PropertyLayout};

/// Options for a generation run.
#[derive(Debug, Clone, Copy)]
pub struct GenerateOptions {
    /// Copy the material's `faq` list into the document.
    pub include_faq: bool,
    /// Wrap each material in the Exception-Handling Normalizer.
    pub normalize: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            include_faq: true,
            normalize: false,
        }
    }
}

/// Result of a batch run.
#[derive(Debug, Default)]
pub struct BatchResult {
    /// Successful documents keyed by material name.
    pub documents: BTreeMap<String, Document>,
    /// One entry per failed material.
    pub errors: Vec<String>,
    /// Level that produced each document (normalized runs only).
    pub levels: BTreeMap<String, FallbackLevel>,
    /// Normalizer totals (normalized runs only).
    pub normalizer_stats: Option<NormalizerStats>,
    pub elapsed: std::time::Duration,
}

impl BatchResult {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Progress callback for reporting batch status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before each material is generated.
    fn material_started(&self, name: &str, current: usize, total: usize);
    /// Called after each material, successful or not.
    fn material_finished(&self, name: &str, ok: bool);
    /// Called when the batch completes.
    fn done(&self, result: &BatchResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn material_started(&self, _name: &str, _current: usize, _total: usize) {}
    fn material_finished(&self, _name: &str, _ok: bool) {}
    fn done(&self, _result: &BatchResult) {}
}

/// Runs the generation modules for one material or a batch.
pub struct Orchestrator<'a> {
    ctx: ResolverContext<'a>,
    registry: ModuleRegistry,
}

impl<'a> Orchestrator<'a> {
    pub fn new(ctx: ResolverContext<'a>) -> Self {
        Self {
            ctx,
            registry: ModuleRegistry::new(),
        }
    }

    pub fn context(&self) -> ResolverContext<'a> {
        self.ctx
    }

    /// Generate one document.
    ///
    /// Modules run in registry order and their outputs merge by key, later
    /// modules winning. Any module error fails the whole material, wrapped
    /// with the material name. No fallback is applied here.
    #[instrument(skip_all, fields(material = %material))]
    pub fn generate(
        &self,
        material: &str,
        record: &MaterialRecord,
        include_faq: bool,
    ) -> Result<Document> {
        let mut doc = Document::new();

        for module in self.registry.iter() {
            let part = module
                .generate(material, record, &self.ctx)
                .map_err(|e| MatKbError::generation(material, e))?;
            debug!(module = module.name(), fields = part.len(), "module complete");
            merge_into(&mut doc, part);
        }

        if include_faq {
            let part = FaqModule
                .generate(material, record, &self.ctx)
                .map_err(|e| MatKbError::generation(material, e))?;
            merge_into(&mut doc, part);
        }

        doc.insert("_metadata".into(), Value::Mapping(metadata_block()));
        Ok(ordering::order(&doc))
    }

    /// Generate one document through the normalizer. Never fails.
    pub fn generate_normalized(
        &self,
        normalizer: &mut Normalizer<'_>,
        material: &str,
        record: &MaterialRecord,
        include_faq: bool,
    ) -> NormalizedDocument {
        normalizer.normalize(material, record, |name, rec| {
            self.generate(name, rec, include_faq)
        })
    }

    /// Generate every material in `materials`, or only `names` when given.
    ///
    /// One material's failure is recorded in `errors` and never stops the
    /// rest of the batch.
    #[instrument(skip_all, fields(materials = materials.len()))]
    pub fn generate_batch(
        &self,
        materials: &Mapping,
        names: Option<&[String]>,
        options: &GenerateOptions,
        progress: &dyn ProgressReporter,
    ) -> BatchResult {
        let start = Instant::now();
        let mut result = BatchResult::default();
        let mut normalizer = options.normalize.then(|| Normalizer::new(self.ctx));

        progress.phase("Selecting materials");
        let selected = select(materials, names, &mut result.errors);
        let total = selected.len();
        info!(total, normalize = options.normalize, "starting batch generation");

        progress.phase("Generating frontmatter");
        for (i, (name, entry)) in selected.into_iter().enumerate() {
            progress.material_started(&name, i + 1, total);

            let Some(record) = MaterialRecord::from_value(entry) else {
                warn!(material = %name, "material entry is not a mapping");
                result
                    .errors
                    .push(format!("{name}: material entry is not a mapping"));
                progress.material_finished(&name, false);
                continue;
            };

            let ok = match normalizer.as_mut() {
                Some(normalizer) => {
                    let out =
                        self.generate_normalized(normalizer, &name, &record, options.include_faq);
                    result.levels.insert(name.clone(), out.level);
                    result.documents.insert(name.clone(), out.document);
                    true
                }
                None => match self.generate(&name, &record, options.include_faq) {
                    Ok(doc) => {
                        result.documents.insert(name.clone(), doc);
                        true
                    }
                    Err(e) => {
                        warn!(material = %name, error = %e, "generation failed");
                        result.errors.push(e.to_string());
                        false
                    }
                },
            };
            progress.material_finished(&name, ok);
        }

        result.normalizer_stats = normalizer.map(|n| n.stats());
        result.elapsed = start.elapsed();
        info!(
            generated = result.documents.len(),
            failed = result.errors.len(),
            elapsed_ms = result.elapsed.as_millis() as u64,
            "batch generation complete"
        );
        progress.done(&result);
        result
    }
}

/// Materials to generate, in source order. Missing names and non-string
/// keys are recorded as errors.
fn select<'m>(
    materials: &'m Mapping,
    names: Option<&[String]>,
    errors: &mut Vec<String>,
) -> Vec<(String, &'m Value)> {
    match names {
        Some(names) => names
            .iter()
            .filter_map(|name| match materials.get(name.as_str()) {
                Some(entry) => Some((name.clone(), entry)),
                None => {
                    warn!(material = %name, "material not found");
                    errors.push(format!("{name}: not found in materials"));
                    None
                }
            })
            .collect(),
        None => materials
            .iter()
            .filter_map(|(key, entry)| match key.as_str() {
                Some(name) => Some((name.to_string(), entry)),
                None => {
                    errors.push(format!("{key:?}: material key is not a string"));
                    None
                }
            })
            .collect(),
    }
}

fn metadata_block() -> Mapping {
    let mut meta = Mapping::new();
    meta.insert("generator".into(), Value::String(GENERATOR.into()));
    meta.insert(
        "property_layout".into(),
        Value::String(PropertyLayout::Categorized.as_str().into()),
    );
    meta
}

#[cfg(test)]
mod tests {
    use super::*;
    use matkb_data::{AuthorRegistry, DomainSources};
    use matkb_shared::{DataConfig, REQUIRED_FIELDS};

    struct Sources {
        sources: DomainSources,
        authors: AuthorRegistry,
    }

    impl Sources {
        fn load() -> Self {
            let config = DataConfig {
                dir: "../../../fixtures/yaml".into(),
                ..DataConfig::default()
            };
            let sources = DomainSources::load(&config).expect("load fixtures");
            let authors = sources.author_registry();
            Self { sources, authors }
        }

        fn ctx(&self) -> ResolverContext<'_> {
            ResolverContext {
                ranges: &self.sources.categories,
                authors: &self.authors,
                settings: &self.sources.settings,
            }
        }

        fn record(&self, name: &str) -> MaterialRecord {
            MaterialRecord::from_value(self.sources.materials.get(name).unwrap()).unwrap()
        }
    }

    fn path<'d>(doc: &'d Document, keys: &[&str]) -> Option<&'d Value> {
        let (first, rest) = keys.split_first()?;
        rest.iter().try_fold(doc.get(*first)?, |v, k| v.get(*k))
    }

    #[test]
    fn copper_document_is_complete_and_ordered() {
        let src = Sources::load();
        let orchestrator = Orchestrator::new(src.ctx());
        let doc = orchestrator
            .generate("Copper", &src.record("Copper"), true)
            .unwrap();

        assert!(REQUIRED_FIELDS.violations(&doc).is_empty());
        assert_eq!(doc.keys().next().and_then(Value::as_str), Some("name"));
        assert_eq!(doc.keys().last().and_then(Value::as_str), Some("_metadata"));

        let density = path(
            &doc,
            &["materialProperties", "material_characteristics", "density"],
        )
        .unwrap();
        assert_eq!(density.get("value"), Some(&Value::from(8.96)));
        assert_eq!(density.get("unit").and_then(Value::as_str), Some("g/cm³"));
        assert_eq!(density.get("min"), Some(&Value::from(0.53)));
        assert_eq!(density.get("max"), Some(&Value::from(22.6)));
        assert_eq!(density.get("confidence"), Some(&Value::from(0.95)));

        assert_eq!(
            doc.get("regulatoryStandards").and_then(Value::as_sequence).map(Vec::len),
            Some(2)
        );
        assert!(doc.contains_key("faq"));
        assert_eq!(
            path(&doc, &["_metadata", "property_layout"]).and_then(Value::as_str),
            Some("categorized")
        );
        assert_eq!(
            path(&doc, &["author_object", "name"]).and_then(Value::as_str),
            Some("Yi-Chun Lin")
        );

        let without_faq = orchestrator
            .generate("Copper", &src.record("Copper"), false)
            .unwrap();
        assert!(!without_faq.contains_key("faq"));
    }

    #[test]
    fn stucco_unranged_property_is_null() {
        let src = Sources::load();
        let doc = Orchestrator::new(src.ctx())
            .generate("Stucco", &src.record("Stucco"), true)
            .unwrap();

        let strength = path(
            &doc,
            &["materialProperties", "material_characteristics", "compressiveStrength"],
        )
        .unwrap();
        assert_eq!(strength.get("value"), Some(&Value::from(12)));
        assert_eq!(strength.get("min"), Some(&Value::Null));
        assert_eq!(strength.get("max"), Some(&Value::Null));

        // No machineSettings on the record: taken from the settings domain.
        assert!(path(&doc, &["machineSettings", "repetitionRate"]).is_some());
        assert!(REQUIRED_FIELDS.violations(&doc).is_empty());
    }

    #[test]
    fn unknown_category_is_wrapped_with_material_name() {
        let src = Sources::load();
        let record = MaterialRecord::new(
            serde_yaml::from_str("{name: Quartz, category: crystal, author: {id: 1}}").unwrap(),
        );
        let err = Orchestrator::new(src.ctx())
            .generate("Quartz", &record, true)
            .unwrap_err();

        assert!(err.to_string().contains("Quartz"));
        match err.root_cause() {
            MatKbError::CategoryNotFound { category, .. } => assert_eq!(category, "crystal"),
            other => panic!("unexpected root cause: {other:?}"),
        }
    }

    #[test]
    fn batch_isolates_failures() {
        let src = Sources::load();
        let mut materials = src.sources.materials.clone();
        materials.insert(
            "Quartz".into(),
            serde_yaml::from_str("{name: Quartz, category: crystal, author: {id: 1}}").unwrap(),
        );

        let result = Orchestrator::new(src.ctx()).generate_batch(
            &materials,
            None,
            &GenerateOptions::default(),
            &SilentProgress,
        );
        assert_eq!(result.documents.len(), 3);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("Quartz"));
        assert!(!result.is_success());
        assert!(result.levels.is_empty());
        assert!(result.normalizer_stats.is_none());
    }

    #[test]
    fn batch_selects_by_name() {
        let src = Sources::load();
        let names = vec!["Oak".to_string(), "Unobtainium".to_string()];
        let result = Orchestrator::new(src.ctx()).generate_batch(
            &src.sources.materials,
            Some(&names),
            &GenerateOptions::default(),
            &SilentProgress,
        );
        assert_eq!(result.documents.keys().collect::<Vec<_>>(), ["Oak"]);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("Unobtainium"));
    }

    #[test]
    fn normalized_batch_never_fails() {
        let src = Sources::load();
        let mut materials = src.sources.materials.clone();
        materials.insert(
            "Quartz".into(),
            serde_yaml::from_str("{name: Quartz, category: crystal}").unwrap(),
        );

        let options = GenerateOptions {
            normalize: true,
            ..GenerateOptions::default()
        };
        let result = Orchestrator::new(src.ctx()).generate_batch(
            &materials,
            None,
            &options,
            &SilentProgress,
        );
        assert!(result.is_success());
        assert_eq!(result.documents.len(), 4);
        assert_eq!(result.levels.get("Copper"), Some(&FallbackLevel::Primary));
        assert_eq!(result.levels.get("Quartz"), Some(&FallbackLevel::Emergency));
        for doc in result.documents.values() {
            assert!(REQUIRED_FIELDS.violations(doc).is_empty());
        }
        assert!(result.normalizer_stats.is_some_and(|s| s.errors_handled == 3));
    }
}

//! Exception-Handling Normalizer.
//!
//! Wraps a document generator in a four-level fallback state machine:
//!
//! | Level     | Strategy                                                  |
//! |-----------|-----------------------------------------------------------|
//! | Primary   | the caller-supplied generator                             |
//! | Secondary | each registry module on its own, keeping what succeeds    |
//! | Tertiary  | category defaults and the category's reference ranges     |
//! | Emergency | the required-field fallbacks, from the material name only |
//!
//! A failing level moves to the next one; levels never go back and are
//! never retried. Whatever level produced the document, every required
//! field is then checked and a failing field is replaced with its own
//! fallback value. Emergency cannot fail, so [`Normalizer::normalize`]
//! always returns a structurally valid document.

use serde_yaml::{Mapping, Value};
use tracing::{debug, info, instrument, warn};

use matkb_shared::{
    AuthorRecord, Category, Document, MatKbError, MaterialRecord, REQUIRED_FIELDS,
    RequiredField, ResolvedProperty, Result, slugify,
};

use crate::GENERATOR;
use crate::defaults::{CategoryDefaults, FALLBACK_CATEGORY};
use crate::modules::{ModuleRegistry, ResolverContext, merge_into, summarize_properties};
use crate::ordering;

/// Group holding the category's declared ranges in a tertiary document.
const REFERENCE_GROUP: &str = "category_reference";

const UNKNOWN_MATERIAL: &str = "Unknown Material";

// ---------------------------------------------------------------------------
// Levels and counters
// ---------------------------------------------------------------------------

/// Fallback level that produced a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FallbackLevel {
    Primary,
    Secondary,
    Tertiary,
    Emergency,
}

impl FallbackLevel {
    /// The level tried after this one fails. Emergency is terminal.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Primary => Some(Self::Secondary),
            Self::Secondary => Some(Self::Tertiary),
            Self::Tertiary => Some(Self::Emergency),
            Self::Emergency => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Tertiary => "tertiary",
            Self::Emergency => "emergency",
        }
    }
}

/// Counters kept per normalizer instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizerStats {
    pub fields_processed: u64,
    pub fields_normalized: u64,
    pub fallbacks_used: u64,
    pub errors_handled: u64,
}

impl NormalizerStats {
    fn absorb(&mut self, other: NormalizerStats) {
        self.fields_processed += other.fields_processed;
        self.fields_normalized += other.fields_normalized;
        self.fallbacks_used += other.fallbacks_used;
        self.errors_handled += other.errors_handled;
    }
}

/// A required field that failed its predicate and was replaced.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("field '{field}' invalid: {reason}")]
pub struct FieldValidationError {
    pub field: &'static str,
    pub reason: String,
}

/// Normalizer output.
#[derive(Debug, Clone)]
pub struct NormalizedDocument {
    pub document: Document,
    pub level: FallbackLevel,
    /// Counters for this call only.
    pub stats: NormalizerStats,
    pub field_errors: Vec<FieldValidationError>,
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

pub struct Normalizer<'a> {
    ctx: ResolverContext<'a>,
    registry: ModuleRegistry,
    stats: NormalizerStats,
}

impl<'a> Normalizer<'a> {
    pub fn new(ctx: ResolverContext<'a>) -> Self {
        Self {
            ctx,
            registry: ModuleRegistry::new(),
            stats: NormalizerStats::default(),
        }
    }

    /// Totals across every call on this instance.
    pub fn stats(&self) -> NormalizerStats {
        self.stats
    }

    /// Produce a valid document for `material`, whatever `primary` does.
    #[instrument(skip_all, fields(material = %material))]
    pub fn normalize<F>(
        &mut self,
        material: &str,
        record: &MaterialRecord,
        primary: F,
    ) -> NormalizedDocument
    where
        F: FnOnce(&str, &MaterialRecord) -> Result<Document>,
    {
        let mut stats = NormalizerStats::default();
        let mut primary = Some(primary);
        let mut level = FallbackLevel::Primary;

        let document = loop {
            let attempt = match level {
                FallbackLevel::Primary => match primary.take() {
                    Some(generate) => generate(material, record),
                    None => Err(MatKbError::Normalization("primary generator consumed".into())),
                },
                FallbackLevel::Secondary => self.secondary(material, record),
                FallbackLevel::Tertiary => self.tertiary(material, record),
                FallbackLevel::Emergency => break emergency(material),
            };

            match attempt {
                Ok(doc) => break doc,
                Err(e) => {
                    stats.errors_handled += 1;
                    let Some(next) = level.next() else {
                        break emergency(material);
                    };
                    warn!(
                        material,
                        from = level.as_str(),
                        to = next.as_str(),
                        error = %e,
                        "generation level failed, falling back"
                    );
                    stats.fallbacks_used += 1;
                    level = next;
                }
            }
        };

        let (mut document, field_errors) = self.validate_fields(material, record, document, &mut stats);
        tag_level(&mut document, level);
        let document = ordering::order(&document);

        if level != FallbackLevel::Primary || !field_errors.is_empty() {
            info!(
                material,
                level = level.as_str(),
                fields_normalized = stats.fields_normalized,
                "document normalized"
            );
        }

        self.stats.absorb(stats);
        NormalizedDocument {
            document,
            level,
            stats,
            field_errors,
        }
    }

    /// Run each module on its own and keep whatever succeeds.
    ///
    /// Requires a category the range table knows and at least one
    /// successful module.
    fn secondary(&self, material: &str, record: &MaterialRecord) -> Result<Document> {
        if record.raw().is_empty() {
            return Err(MatKbError::Normalization("no input data".into()));
        }
        let category = record.category().unwrap_or_default();
        if !self.ctx.ranges.contains(category) {
            return Err(MatKbError::CategoryNotFound {
                material: material.to_string(),
                category: category.to_string(),
            });
        }

        let mut doc = Document::new();
        let mut succeeded = 0;
        for module in self.registry.iter() {
            match module.generate(material, record, &self.ctx) {
                Ok(part) => {
                    merge_into(&mut doc, part);
                    succeeded += 1;
                }
                Err(e) => debug!(material, module = module.name(), error = %e, "module skipped"),
            }
        }

        if succeeded == 0 {
            return Err(MatKbError::Normalization(format!(
                "no module produced output for '{material}'"
            )));
        }
        Ok(doc)
    }

    /// Build from category defaults. Only the name and category are read
    /// from the record.
    fn tertiary(&self, material: &str, record: &MaterialRecord) -> Result<Document> {
        let category: Category = record
            .category()
            .ok_or_else(|| MatKbError::Normalization("no category for defaults".into()))?
            .parse()
            .map_err(MatKbError::Normalization)?;
        let defaults = CategoryDefaults::for_category(category);
        let name = display_name(material, record);

        let mut doc = Document::new();
        doc.insert("name".into(), Value::String(name.clone()));
        doc.insert("slug".into(), Value::String(slugify(&name)));
        doc.insert("category".into(), Value::String(category.as_str().into()));
        doc.insert("title".into(), Value::String(default_title(&name)));
        doc.insert("headline".into(), Value::String(default_headline(&name)));
        doc.insert("description".into(), Value::String(default_description(&name)));
        doc.insert("keywords".into(), default_keywords(&name));
        doc.insert("complexity".into(), Value::String(defaults.complexity.as_str().into()));
        doc.insert("difficulty_score".into(), Value::from(defaults.difficulty_score));
        doc.insert("applications".into(), string_values(&defaults.applications()));
        doc.insert("compatibility".into(), Value::Mapping(Mapping::new()));
        doc.insert("properties".into(), Value::Mapping(Mapping::new()));
        doc.insert("machineSettings".into(), Value::Mapping(Mapping::new()));

        let reference = reference_group(self.ctx, category);
        if !reference.is_empty() {
            let mut props = Mapping::new();
            props.insert(REFERENCE_GROUP.into(), Value::Mapping(reference));
            doc.insert("materialProperties".into(), Value::Mapping(props));
        }

        let author = AuthorRecord::system_default();
        doc.insert("author_id".into(), Value::from(author.id));
        doc.insert("author_object".into(), Value::Mapping(author.to_mapping()));
        Ok(doc)
    }

    /// Check every required field; replace failures with their fallback.
    fn validate_fields(
        &self,
        material: &str,
        record: &MaterialRecord,
        mut doc: Document,
        stats: &mut NormalizerStats,
    ) -> (Document, Vec<FieldValidationError>) {
        let mut errors = Vec::new();

        for field in REQUIRED_FIELDS.fields() {
            stats.fields_processed += 1;
            let reason = match doc.get(field.name) {
                None => "missing".to_string(),
                Some(value) => match field.kind.check(value) {
                    Ok(()) => continue,
                    Err(reason) => reason,
                },
            };

            let replacement = field_fallback(field, material, record, &doc, Some(self.ctx));
            warn!(material, field = field.name, %reason, "required field replaced with fallback");
            doc.insert(field.name.into(), replacement);
            stats.fields_normalized += 1;
            errors.push(FieldValidationError {
                field: field.name,
                reason,
            });
        }

        if self.reconcile_author(&mut doc) {
            stats.fields_normalized += 1;
        }
        (doc, errors)
    }

    /// Keep `author_id` and `author_object.id` in agreement. Returns true
    /// when a field was changed.
    fn reconcile_author(&self, doc: &mut Document) -> bool {
        let id = doc.get("author_id").and_then(Value::as_u64);
        let object_id = doc
            .get("author_object")
            .and_then(|o| o.get("id"))
            .and_then(Value::as_u64);
        let (Some(id), Some(object_id)) = (id, object_id) else {
            return false;
        };
        if id == object_id {
            return false;
        }

        if let Some(author) = registry_author(self.ctx, id) {
            doc.insert("author_object".into(), Value::Mapping(author.to_mapping()));
        } else {
            doc.insert("author_id".into(), Value::from(object_id));
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Field fallbacks
// ---------------------------------------------------------------------------

/// Emergency document: every required field from its fallback, using only
/// the material name.
fn emergency(material: &str) -> Document {
    let record = MaterialRecord::default();
    let mut doc = Document::new();
    for field in REQUIRED_FIELDS.fields() {
        let value = field_fallback(field, material, &record, &doc, None);
        doc.insert(field.name.into(), value);
    }
    doc
}

/// Deterministic replacement for one required field.
///
/// Reads fields already settled earlier in schema order (`name` before
/// `title`, `category` before `complexity`), so `doc` must be filled in
/// that order.
fn field_fallback(
    field: &RequiredField,
    material: &str,
    record: &MaterialRecord,
    doc: &Document,
    ctx: Option<ResolverContext<'_>>,
) -> Value {
    let name = doc
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| display_name(material, record));
    let category = settled_category(record, doc);
    let defaults = CategoryDefaults::for_category(category);

    match field.name {
        "name" => Value::String(name),
        "category" => Value::String(category.as_str().into()),
        "complexity" => Value::String(defaults.complexity.as_str().into()),
        "difficulty_score" => Value::from(defaults.difficulty_score),
        "author_id" => Value::from(fallback_author(doc, ctx).id),
        "title" => Value::String(default_title(&name)),
        "headline" => Value::String(default_headline(&name)),
        "description" => Value::String(default_description(&name)),
        "keywords" => default_keywords(&name),
        "properties" => {
            let source = doc
                .get("materialProperties")
                .and_then(Value::as_mapping)
                .or_else(|| record.material_properties());
            Value::Mapping(source.map(summarize_properties).unwrap_or_default())
        }
        "applications" => string_values(&defaults.applications()),
        "author_object" => Value::Mapping(fallback_author(doc, ctx).to_mapping()),
        // machineSettings, compatibility, and any mapping-kind field.
        _ => Value::Mapping(Mapping::new()),
    }
}

/// Category to use for defaults: the document's, else the record's, else
/// the fallback. Parsing is case-insensitive.
fn settled_category(record: &MaterialRecord, doc: &Document) -> Category {
    doc.get("category")
        .and_then(Value::as_str)
        .and_then(|c| c.parse().ok())
        .or_else(|| record.category().and_then(|c| c.parse().ok()))
        .unwrap_or(FALLBACK_CATEGORY)
}

/// The registry author named by a valid `author_id`, else the system default.
fn fallback_author(doc: &Document, ctx: Option<ResolverContext<'_>>) -> AuthorRecord {
    let id = doc
        .get("author_id")
        .and_then(Value::as_u64)
        .filter(|id| *id > 0);
    id.zip(ctx)
        .and_then(|(id, ctx)| registry_author(ctx, id))
        .unwrap_or_else(AuthorRecord::system_default)
}

fn registry_author(ctx: ResolverContext<'_>, id: u64) -> Option<AuthorRecord> {
    let mut entry = ctx.authors.get(id)?.clone();
    entry.insert("id".into(), Value::from(id));
    AuthorRecord::from_mapping(&entry).ok()
}

/// Declared ranges of a category as value-less properties.
fn reference_group(ctx: ResolverContext<'_>, category: Category) -> Mapping {
    let Some(ranges) = ctx.ranges.category(category.as_str()) else {
        return Mapping::new();
    };
    if ranges.properties.is_empty() {
        return Mapping::new();
    }

    let mut group = Mapping::new();
    group.insert("label".into(), Value::String("Category Reference".into()));
    for (property, range) in &ranges.properties {
        let prop = ResolvedProperty {
            value: None,
            unit: range.unit.clone(),
            min: Some(range.min),
            max: Some(range.max),
            confidence: 0.0,
            description: None,
        };
        group.insert(Value::String(property.clone()), prop.to_yaml());
    }
    group
}

fn tag_level(doc: &mut Document, level: FallbackLevel) {
    let mut meta = doc
        .get("_metadata")
        .and_then(Value::as_mapping)
        .cloned()
        .unwrap_or_else(|| {
            let mut m = Mapping::new();
            m.insert("generator".into(), Value::String(GENERATOR.into()));
            m
        });
    meta.insert("fallback_level".into(), Value::String(level.as_str().into()));
    doc.insert("_metadata".into(), Value::Mapping(meta));
}

fn display_name(material: &str, record: &MaterialRecord) -> String {
    record
        .name()
        .or_else(|| Some(material.trim()).filter(|s| !s.is_empty()))
        .unwrap_or(UNKNOWN_MATERIAL)
        .to_string()
}

fn default_title(name: &str) -> String {
    format!("{name} Laser Cleaning")
}

fn default_headline(name: &str) -> String {
    format!("Laser cleaning parameters for {name}")
}

fn default_description(name: &str) -> String {
    format!("Technical overview of laser cleaning for {name}.")
}

fn default_keywords(name: &str) -> Value {
    let lower = name.to_lowercase();
    string_values(&[
        lower.clone(),
        format!("{lower} laser cleaning"),
        "laser cleaning".to_string(),
    ])
}

fn string_values(items: &[String]) -> Value {
    Value::Sequence(items.iter().cloned().map(Value::String).collect())
}

//! Identification and content metadata.
//!
//! Free-text fields (title, headline, description) are opaque strings from
//! the source data; only their presence is checked here. Missing text is
//! filled from the material name and category.

use serde_yaml::{Mapping, Value};
use tracing::warn;

use matkb_shared::{
    Category, Complexity, Document, MatKbError, MaterialRecord, Result, slugify,
};

use super::{GenerationModule, ResolverContext, string_seq};
use crate::defaults::{CategoryDefaults, FALLBACK_CATEGORY};

const META_TITLE_MAX: usize = 60;
const META_DESCRIPTION_MAX: usize = 160;

/// Emits identification fields, content metadata, applications,
/// compatibility and the `seo` block.
pub struct MetadataModule;

impl GenerationModule for MetadataModule {
    fn generate(
        &self,
        material: &str,
        record: &MaterialRecord,
        _ctx: &ResolverContext<'_>,
    ) -> Result<Document> {
        let name = record.name().unwrap_or(material);
        let category = record.category().ok_or_else(|| {
            MatKbError::validation(format!("material '{material}' has no category"))
        })?;
        let subcategory = record.subcategory();
        let slug = slugify(name);
        let defaults = category_defaults(material, category);

        let title = record
            .str_field("title")
            .map(str::to_string)
            .unwrap_or_else(|| format!("{name} Laser Cleaning"));
        let headline = record
            .str_field("headline")
            .map(str::to_string)
            .unwrap_or_else(|| {
                format!("Precision laser cleaning parameters for {name} surfaces")
            });
        let description = record
            .str_field("description")
            .map(str::to_string)
            .unwrap_or_else(|| {
                let kind = subcategory.map_or_else(|| category.to_string(), |s| format!("{s} {category}"));
                format!(
                    "Laser cleaning guidance for {name}, a {kind} material: properties, machine settings and applications."
                )
            });

        let mut keywords = record.string_list("keywords");
        if keywords.is_empty() {
            keywords = synthesized_keywords(name, category, subcategory);
        }

        let complexity = match record.str_field("complexity").map(str::parse::<Complexity>) {
            Some(Ok(c)) => c,
            Some(Err(e)) => {
                warn!(material, error = %e, "invalid complexity, using category default");
                defaults.complexity
            }
            None => defaults.complexity,
        };

        let difficulty_score = match record.get("difficulty_score") {
            Some(v) => match v.as_i64().filter(|d| (1..=5).contains(d)) {
                Some(d) => d,
                None => {
                    warn!(material, value = ?v, "invalid difficulty_score, using category default");
                    defaults.difficulty_score
                }
            },
            None => defaults.difficulty_score,
        };

        let mut applications = record.applications();
        if applications.is_empty() {
            applications = defaults.applications();
        }

        let compatibility = record
            .get("compatibility")
            .and_then(Value::as_mapping)
            .cloned()
            .unwrap_or_default();

        let mut doc = Document::new();
        doc.insert("name".into(), Value::String(name.to_string()));
        doc.insert("slug".into(), Value::String(slug.clone()));
        doc.insert("category".into(), Value::String(category.to_string()));
        if let Some(sub) = subcategory {
            doc.insert("subcategory".into(), Value::String(sub.to_string()));
        }
        doc.insert(
            "seo".into(),
            Value::Mapping(seo_block(&title, &description, category, subcategory, &slug)),
        );
        doc.insert("title".into(), Value::String(title));
        doc.insert("headline".into(), Value::String(headline));
        doc.insert("description".into(), Value::String(description));
        doc.insert("keywords".into(), string_seq(&keywords));
        doc.insert("complexity".into(), Value::String(complexity.as_str().into()));
        doc.insert("difficulty_score".into(), Value::from(difficulty_score));
        doc.insert("applications".into(), string_seq(&applications));
        doc.insert("compatibility".into(), Value::Mapping(compatibility));
        Ok(doc)
    }

    fn name(&self) -> &str {
        "metadata"
    }
}

fn category_defaults(material: &str, category: &str) -> CategoryDefaults {
    match category.parse::<Category>() {
        Ok(c) => CategoryDefaults::for_category(c),
        Err(e) => {
            warn!(material, error = %e, fallback = %FALLBACK_CATEGORY, "using fallback category defaults");
            CategoryDefaults::for_category(FALLBACK_CATEGORY)
        }
    }
}

fn synthesized_keywords(name: &str, category: &str, subcategory: Option<&str>) -> Vec<String> {
    let lower = name.to_lowercase();
    let mut keywords = vec![
        lower.clone(),
        format!("{lower} laser cleaning"),
        format!("{category} laser cleaning"),
    ];
    if let Some(sub) = subcategory {
        keywords.push(sub.to_lowercase());
    }
    keywords.push("laser ablation".into());
    keywords
}

fn seo_block(
    title: &str,
    description: &str,
    category: &str,
    subcategory: Option<&str>,
    slug: &str,
) -> Mapping {
    let canonical = match subcategory {
        Some(sub) => format!("/materials/{}/{}/{slug}", slugify(category), slugify(sub)),
        None => format!("/materials/{}/{slug}", slugify(category)),
    };

    let mut seo = Mapping::new();
    seo.insert(
        "metaTitle".into(),
        Value::String(truncate_words(title, META_TITLE_MAX)),
    );
    seo.insert(
        "metaDescription".into(),
        Value::String(truncate_words(description, META_DESCRIPTION_MAX)),
    );
    seo.insert("canonical".into(), Value::String(canonical));
    seo
}

/// Cut `text` to at most `max` characters, on a word boundary when one exists.
fn truncate_words(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    match cut.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => cut[..idx].trim_end().to_string(),
        _ => cut,
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{Fixture, record};
    use super::*;

    fn generate(src: &str) -> Document {
        let fx = Fixture::new();
        let rec = record(src);
        let name = rec.name().unwrap_or("Unnamed").to_string();
        MetadataModule.generate(&name, &rec, &fx.ctx()).unwrap()
    }

    #[test]
    fn fills_missing_text_from_name() {
        let doc = generate("{name: Stainless Steel, category: metal, subcategory: alloy}");
        assert_eq!(doc.get("slug").and_then(Value::as_str), Some("stainless-steel"));
        assert_eq!(
            doc.get("title").and_then(Value::as_str),
            Some("Stainless Steel Laser Cleaning")
        );
        assert_eq!(doc.get("complexity").and_then(Value::as_str), Some("medium"));
        assert_eq!(doc.get("difficulty_score").and_then(Value::as_i64), Some(3));
        assert!(doc.get("keywords").and_then(Value::as_sequence).is_some_and(|k| !k.is_empty()));
        assert!(doc.get("compatibility").is_some_and(Value::is_mapping));

        let seo = doc.get("seo").and_then(Value::as_mapping).unwrap();
        assert_eq!(
            seo.get("canonical").and_then(Value::as_str),
            Some("/materials/metal/alloy/stainless-steel")
        );
    }

    #[test]
    fn given_values_pass_through() {
        let doc = generate(
            "{name: Copper, category: metal, title: Custom, complexity: High, difficulty_score: 4, applications: [Electronics]}",
        );
        assert_eq!(doc.get("title").and_then(Value::as_str), Some("Custom"));
        assert_eq!(doc.get("complexity").and_then(Value::as_str), Some("high"));
        assert_eq!(doc.get("difficulty_score").and_then(Value::as_i64), Some(4));
        assert_eq!(
            doc.get("applications").and_then(Value::as_sequence).map(Vec::len),
            Some(1)
        );
    }

    #[test]
    fn out_of_range_difficulty_uses_default() {
        let doc = generate("{name: Stucco, category: masonry, difficulty_score: 9}");
        assert_eq!(doc.get("difficulty_score").and_then(Value::as_i64), Some(2));
    }

    #[test]
    fn missing_category_is_an_error() {
        let fx = Fixture::new();
        let rec = record("{name: Mystery}");
        assert!(MetadataModule.generate("Mystery", &rec, &fx.ctx()).is_err());
    }

    #[test]
    fn seo_text_is_bounded() {
        let long = "word ".repeat(60);
        let doc = generate(&format!("{{name: Oak, category: wood, title: '{long}', description: '{long}'}}"));
        let seo = doc.get("seo").and_then(Value::as_mapping).unwrap();
        let title = seo.get("metaTitle").and_then(Value::as_str).unwrap();
        let description = seo.get("metaDescription").and_then(Value::as_str).unwrap();
        assert!(title.chars().count() <= META_TITLE_MAX);
        assert!(description.chars().count() <= META_DESCRIPTION_MAX);
        assert!(!title.ends_with(' '));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_words("short", 10), "short");
        assert_eq!(truncate_words("éééééééééééé", 5), "ééééé");
        assert_eq!(truncate_words("alpha beta gamma", 12), "alpha beta");
    }
}

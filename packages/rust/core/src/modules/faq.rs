//! FAQ passthrough.

use serde_yaml::Value;
use tracing::warn;

use matkb_shared::{Document, MaterialRecord, Result};

use super::{GenerationModule, ResolverContext};

/// Copies the material's `faq` list when present. Not part of the default
/// registry; the orchestrator runs it only when FAQs are requested.
pub struct FaqModule;

impl GenerationModule for FaqModule {
    fn generate(
        &self,
        material: &str,
        record: &MaterialRecord,
        _ctx: &ResolverContext<'_>,
    ) -> Result<Document> {
        let mut doc = Document::new();
        match record.get("faq") {
            Some(Value::Sequence(items)) if !items.is_empty() => {
                doc.insert("faq".into(), Value::Sequence(items.clone()));
            }
            Some(Value::Sequence(_)) | None => {}
            Some(other) => warn!(material, value = ?other, "faq is not a list, skipping"),
        }
        Ok(doc)
    }

    fn name(&self) -> &str {
        "faq"
    }
}

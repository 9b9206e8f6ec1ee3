//! Regulatory standards.

use std::collections::HashSet;

use serde_yaml::Value;
use tracing::debug;

use matkb_shared::{Document, MaterialRecord, Result};

use super::{GenerationModule, ResolverContext};

/// Emits `regulatoryStandards` as a de-duplicated list, first occurrence kept.
///
/// Entries may be plain strings or mappings carrying a `name`; mappings are
/// kept whole so their extra fields (url, description) survive.
pub struct ComplianceModule;

impl GenerationModule for ComplianceModule {
    fn generate(
        &self,
        material: &str,
        record: &MaterialRecord,
        _ctx: &ResolverContext<'_>,
    ) -> Result<Document> {
        let mut seen = HashSet::new();
        let mut standards = Vec::new();

        for entry in record.regulatory_standards().into_iter().flatten() {
            let name = match entry {
                Value::String(s) => s.trim(),
                Value::Mapping(m) => m.get("name").and_then(Value::as_str).unwrap_or("").trim(),
                _ => "",
            };
            if name.is_empty() {
                continue;
            }
            if !seen.insert(name.to_ascii_lowercase()) {
                debug!(material, standard = name, "duplicate standard dropped");
                continue;
            }
            standards.push(match entry {
                Value::String(_) => Value::String(name.to_string()),
                other => other.clone(),
            });
        }

        let mut doc = Document::new();
        doc.insert("regulatoryStandards".into(), Value::Sequence(standards));
        Ok(doc)
    }

    fn name(&self) -> &str {
        "compliance"
    }
}

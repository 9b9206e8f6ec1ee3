//! Author resolution against the Authors registry.

use serde_yaml::Value;
use tracing::debug;

use matkb_data::AuthorRegistry;
use matkb_shared::{AuthorRecord, Document, MatKbError, MaterialRecord, Result};

use super::{GenerationModule, ResolverContext};

/// Resolve and validate the author of one material.
///
/// The registry record wins when the registry knows the id. An id missing
/// from a non-empty registry is an error. With an empty registry the
/// material's inline record is validated on its own.
pub fn resolve_author(
    material: &str,
    record: &MaterialRecord,
    registry: &AuthorRegistry,
) -> Result<AuthorRecord> {
    let author_err = |message: String| MatKbError::Author {
        material: material.to_string(),
        message,
    };

    let inline = record.author();
    let id = inline
        .and_then(|a| a.get("id"))
        .or_else(|| record.get("author_id"))
        .and_then(Value::as_u64)
        .filter(|id| *id > 0);

    if registry.is_empty() {
        let inline = inline.ok_or_else(|| author_err("no author record".into()))?;
        return AuthorRecord::from_mapping(inline).map_err(author_err);
    }

    let id = id.ok_or_else(|| author_err("author id missing or not a positive integer".into()))?;
    let entry = registry
        .get(id)
        .ok_or_else(|| author_err(format!("author id {id} not in registry")))?;

    // Registry entries keyed only by map key may omit `id`.
    let mut entry = entry.clone();
    entry.insert("id".into(), Value::from(id));
    let author = AuthorRecord::from_mapping(&entry).map_err(author_err)?;
    debug!(material, author_id = id, "author resolved from registry");
    Ok(author)
}

/// Emits `author_id` and `author_object`.
pub struct AuthorModule;

impl GenerationModule for AuthorModule {
    fn generate(
        &self,
        material: &str,
        record: &MaterialRecord,
        ctx: &ResolverContext<'_>,
    ) -> Result<Document> {
        let author = resolve_author(material, record, ctx.authors)?;
        let mut doc = Document::new();
        doc.insert("author_id".into(), Value::from(author.id));
        doc.insert("author_object".into(), Value::Mapping(author.to_mapping()));
        Ok(doc)
    }

    fn name(&self) -> &str {
        "author"
    }
}

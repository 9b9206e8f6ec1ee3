//! Images, caption, and the micro block.

use serde_yaml::{Mapping, Value};
use tracing::debug;

use matkb_shared::{Document, MaterialRecord, Result};

use super::{GenerationModule, ResolverContext};

const IMAGE_SLOTS: [(&str, &str); 2] = [("hero", "laser cleaning"), ("micro", "microscopic view")];

/// Emits `images`, `caption` and `micro`.
///
/// Images are normalized to `{url, alt}`; a bare string is taken as the url
/// and a missing alt is written from the material name.
pub struct MediaModule;

impl GenerationModule for MediaModule {
    fn generate(
        &self,
        material: &str,
        record: &MaterialRecord,
        _ctx: &ResolverContext<'_>,
    ) -> Result<Document> {
        let name = record.name().unwrap_or(material);
        let mut doc = Document::new();

        if let Some(images) = record.images() {
            let mut out = Mapping::new();
            for (slot, alt_suffix) in IMAGE_SLOTS {
                if let Some(image) = images.get(slot).and_then(|v| normalize_image(v, name, alt_suffix)) {
                    out.insert(slot.into(), Value::Mapping(image));
                }
            }
            // Slots other than hero/micro are kept as given.
            for (key, value) in images {
                if key.as_str().is_some_and(|k| IMAGE_SLOTS.iter().any(|(s, _)| *s == k)) {
                    continue;
                }
                out.insert(key.clone(), value.clone());
            }
            if !out.is_empty() {
                doc.insert("images".into(), Value::Mapping(out));
            }
        }

        if let Some(caption) = record.caption().filter(|c| !c.is_null()) {
            doc.insert("caption".into(), caption.clone());

            if let Some(micro) = micro_block(caption, record.images()) {
                doc.insert("micro".into(), Value::Mapping(micro));
            }
        }

        debug!(material, fields = doc.len(), "media resolved");
        Ok(doc)
    }

    fn name(&self) -> &str {
        "media"
    }
}

fn normalize_image(value: &Value, name: &str, alt_suffix: &str) -> Option<Mapping> {
    let (url, alt) = match value {
        Value::String(url) => (url.trim(), None),
        Value::Mapping(m) => (
            m.get("url").and_then(Value::as_str).unwrap_or("").trim(),
            m.get("alt").and_then(Value::as_str).map(str::trim),
        ),
        _ => return None,
    };
    if url.is_empty() {
        return None;
    }

    let alt = alt
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{name} {alt_suffix}"));

    let mut image = Mapping::new();
    image.insert("url".into(), Value::String(url.to_string()));
    image.insert("alt".into(), Value::String(alt));
    Some(image)
}

/// `{before, after, image?}` from the caption's before/after text.
fn micro_block(caption: &Value, images: Option<&Mapping>) -> Option<Mapping> {
    let caption = caption.as_mapping()?;
    let text = |key: &str| {
        caption
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };
    let before = text("beforeText");
    let after = text("afterText");
    if before.is_none() && after.is_none() {
        return None;
    }

    let mut micro = Mapping::new();
    if let Some(before) = before {
        micro.insert("before".into(), Value::String(before.to_string()));
    }
    if let Some(after) = after {
        micro.insert("after".into(), Value::String(after.to_string()));
    }
    let image = images
        .and_then(|i| i.get("micro"))
        .and_then(|m| m.as_str().or_else(|| m.get("url").and_then(Value::as_str)));
    if let Some(url) = image {
        micro.insert("image".into(), Value::String(url.to_string()));
    }
    Some(micro)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{Fixture, record};
    use super::*;

    #[test]
    fn images_get_url_and_alt() {
        let fx = Fixture::new();
        let rec = record(
            r#"
name: Copper
images:
  hero: {url: /img/hero.jpg, alt: Copper plate}
  micro: /img/micro.jpg
  gallery: [/img/a.jpg]
caption: {beforeText: Tarnished., afterText: Bright.}
"#,
        );
        let doc = MediaModule.generate("Copper", &rec, &fx.ctx()).unwrap();
        let images = doc.get("images").and_then(Value::as_mapping).unwrap();

        let hero = images.get("hero").and_then(Value::as_mapping).unwrap();
        assert_eq!(hero.get("alt").and_then(Value::as_str), Some("Copper plate"));

        let micro = images.get("micro").and_then(Value::as_mapping).unwrap();
        assert_eq!(micro.get("url").and_then(Value::as_str), Some("/img/micro.jpg"));
        assert_eq!(
            micro.get("alt").and_then(Value::as_str),
            Some("Copper microscopic view")
        );
        assert!(images.contains_key("gallery"));

        let block = doc.get("micro").and_then(Value::as_mapping).unwrap();
        assert_eq!(block.get("before").and_then(Value::as_str), Some("Tarnished."));
        assert_eq!(block.get("image").and_then(Value::as_str), Some("/img/micro.jpg"));
    }

    #[test]
    fn nothing_to_emit_for_bare_record() {
        let fx = Fixture::new();
        let doc = MediaModule.generate("Oak", &record("{name: Oak}"), &fx.ctx()).unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn plain_caption_has_no_micro_block() {
        let fx = Fixture::new();
        let rec = record("{name: Oak, caption: Oak board after cleaning}");
        let doc = MediaModule.generate("Oak", &rec, &fx.ctx()).unwrap();
        assert!(doc.contains_key("caption"));
        assert!(!doc.contains_key("micro"));
    }
}

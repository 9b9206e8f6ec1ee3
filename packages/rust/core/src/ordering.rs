//! Field Ordering Service.
//!
//! A pure rearrangement of a document's keys: the output has exactly the
//! input's key set. Top-level keys follow [`FIELD_ORDER`]; keys it does not
//! name are appended in their original relative order.
//!
//! `materialProperties` comes in two shapes. The categorized shape (groups
//! carrying a `label`) passes through untouched. The legacy flat shape is
//! reflowed so each property is followed by its `<prop>Unit`, `<prop>Min`,
//! `<prop>Max` and `<prop>Percentile` siblings.

use std::collections::HashMap;

use serde_yaml::{Mapping, Value};
use tracing::{debug, instrument};

use matkb_shared::Document;

/// Canonical top-level sequence.
pub const FIELD_ORDER: &[&str] = &[
    // Identification
    "name",
    "slug",
    "category",
    "subcategory",
    // Content metadata
    "title",
    "headline",
    "description",
    "keywords",
    "complexity",
    "difficulty_score",
    "seo",
    // Author
    "author_id",
    "author_object",
    "author",
    // Visual assets
    "images",
    "caption",
    "micro",
    "regulatoryStandards",
    "applications",
    "compatibility",
    "materialProperties",
    "properties",
    "materialCharacteristics",
    "machineSettings",
    "environmentalImpact",
    "outcomeMetrics",
    "faq",
    // Internal
    "_metadata",
];

const METADATA_KEY: &str = "_metadata";
const LAYOUT_KEY: &str = "property_layout";
const PROPERTIES_KEY: &str = "materialProperties";

/// Sibling suffixes, in the order they follow their base property.
const SIBLING_SUFFIXES: [&str; 4] = ["Unit", "Min", "Max", "Percentile"];

// ---------------------------------------------------------------------------
// Property layout
// ---------------------------------------------------------------------------

/// Shape of `materialProperties`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyLayout {
    /// Groups with a `label`; never reordered.
    Categorized,
    /// Flat properties with suffixed sibling keys.
    Legacy,
}

impl PropertyLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Categorized => "categorized",
            Self::Legacy => "legacy",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "categorized" => Some(Self::Categorized),
            "legacy" => Some(Self::Legacy),
            _ => None,
        }
    }
}

/// Decide the layout of a document's `materialProperties`.
///
/// An explicit `_metadata.property_layout` tag wins. Without one, the
/// layout is categorized when the first property value is a mapping with
/// a `label` key.
pub fn detect_layout(doc: &Document) -> PropertyLayout {
    let tagged = doc
        .get(METADATA_KEY)
        .and_then(|m| m.get(LAYOUT_KEY))
        .and_then(Value::as_str)
        .and_then(PropertyLayout::from_tag);
    if let Some(layout) = tagged {
        return layout;
    }

    let first = doc
        .get(PROPERTIES_KEY)
        .and_then(Value::as_mapping)
        .and_then(|props| props.values().next());
    match first {
        Some(Value::Mapping(group)) if group.contains_key("label") => PropertyLayout::Categorized,
        // Nothing to reflow.
        None => PropertyLayout::Categorized,
        Some(_) => PropertyLayout::Legacy,
    }
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// Return a copy of `doc` in canonical order.
#[instrument(skip_all, fields(keys = doc.len()))]
pub fn order(doc: &Document) -> Document {
    let layout = detect_layout(doc);

    let mut slots: Vec<Option<(Value, Value)>> = doc
        .iter()
        .map(|(k, v)| Some((k.clone(), v.clone())))
        .collect();
    let positions: HashMap<String, usize> = slots
        .iter()
        .enumerate()
        .filter_map(|(i, slot)| {
            slot.as_ref()
                .and_then(|(k, _)| k.as_str())
                .map(|k| (k.to_string(), i))
        })
        .collect();

    let mut out = Document::new();
    for field in FIELD_ORDER {
        let Some(slot) = positions.get(*field).and_then(|i| slots[*i].take()) else {
            continue;
        };
        let (key, value) = slot;
        let value = match (*field, layout, value) {
            (PROPERTIES_KEY, PropertyLayout::Legacy, Value::Mapping(props)) => {
                debug!("reflowing legacy materialProperties");
                Value::Mapping(reflow_legacy(props))
            }
            (_, _, value) => value,
        };
        out.insert(key, value);
    }

    // Unknown keys keep their relative order.
    for (key, value) in slots.into_iter().flatten() {
        out.insert(key, value);
    }

    out
}

/// Reflow a legacy property map and, one level down, its unlabeled groups.
fn reflow_legacy(props: Mapping) -> Mapping {
    reflow_siblings(props)
        .into_iter()
        .map(|(key, value)| match value {
            Value::Mapping(group) if !group.contains_key("label") => {
                (key, Value::Mapping(reflow_siblings(group)))
            }
            other => (key, other),
        })
        .collect()
}

/// Split `key` into its base property and the rank of its sibling suffix.
fn sibling_base(key: &str) -> Option<(&str, usize)> {
    SIBLING_SUFFIXES.iter().enumerate().find_map(|(rank, suffix)| {
        key.strip_suffix(suffix)
            .filter(|base| !base.is_empty())
            .map(|base| (base, rank))
    })
}

/// Place every `<base><Suffix>` key right after its base key.
///
/// Keys form a forest (a suffixed key's parent is its base, when present);
/// roots keep their relative order and children follow in suffix order.
fn reflow_siblings(map: Mapping) -> Mapping {
    let entries: Vec<(Value, Value)> = map.into_iter().collect();
    let names: Vec<Option<String>> = entries
        .iter()
        .map(|(k, _)| k.as_str().map(str::to_string))
        .collect();
    let index: HashMap<&str, usize> = names
        .iter()
        .enumerate()
        .filter_map(|(i, n)| n.as_deref().map(|n| (n, i)))
        .collect();

    let mut parent = vec![None; entries.len()];
    let mut children: Vec<Vec<(usize, usize)>> = vec![Vec::new(); entries.len()];
    for (i, name) in names.iter().enumerate() {
        let Some((base, rank)) = name.as_deref().and_then(sibling_base) else {
            continue;
        };
        if let Some(&p) = index.get(base) {
            parent[i] = Some(p);
            children[p].push((rank, i));
        }
    }
    for kids in &mut children {
        kids.sort_unstable();
    }

    let mut slots: Vec<Option<(Value, Value)>> = entries.into_iter().map(Some).collect();
    let mut out = Mapping::new();
    for root in (0..slots.len()).filter(|i| parent[*i].is_none()) {
        let mut stack = vec![root];
        while let Some(i) = stack.pop() {
            if let Some((key, value)) = slots[i].take() {
                out.insert(key, value);
            }
            stack.extend(children[i].iter().rev().map(|(_, child)| *child));
        }
    }
    out
}

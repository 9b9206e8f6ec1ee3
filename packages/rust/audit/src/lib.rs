//! Cross-Domain Consistency Auditor.
//!
//! Read-only checks over the loaded source domains. Every problem becomes a
//! [`Finding`]; nothing here returns an error.
//!
//! | Check                                      | Severity |
//! |--------------------------------------------|----------|
//! | required field missing                     | CRITICAL |
//! | duplicate id within a domain               | CRITICAL |
//! | required field blank                       | HIGH     |
//! | material author id not in registry         | HIGH     |
//! | wrong shape or too-short collection        | MEDIUM   |
//! | validMaterials entry not a known material  | MEDIUM   |
//! | settings entry not a known material        | MEDIUM   |
//! | date field not ISO-8601                    | LOW      |

pub mod report;
pub mod schema;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use tracing::{debug, info, instrument};

use matkb_data::{AuthorRegistry, Domain, DomainSources};

pub use report::{AuditReport, ReportFormat};
pub use schema::{DATE_FIELDS, DomainSchema, FieldRule, Shape};

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

/// Finding severity, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub const ALL: [Severity; 4] = [Self::Critical, Self::High, Self::Medium, Self::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation about one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub domain: Domain,
    pub item_id: String,
    pub field: String,
    pub message: String,
}

impl Finding {
    fn new(
        severity: Severity,
        domain: Domain,
        item_id: &str,
        field: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            domain,
            item_id: item_id.to_string(),
            field: field.to_string(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

/// Audit every domain. Findings are sorted by severity, domain, then item.
#[instrument(skip_all)]
pub fn audit(sources: &DomainSources) -> Vec<Finding> {
    let registry = sources.author_registry();
    let materials = MaterialIndex::new(&sources.materials);

    let mut findings = Vec::new();
    for domain in Domain::ALL {
        let items = sources.domain(domain);
        let before = findings.len();
        audit_domain(DomainSchema::for_domain(domain), items, &mut findings);

        match domain {
            Domain::Materials => check_author_refs(items, &registry, &mut findings),
            Domain::Contaminants => check_valid_materials(items, &materials, &mut findings),
            Domain::Settings => check_settings_keys(items, &materials, &mut findings),
            Domain::Compounds | Domain::Authors => {}
        }
        debug!(domain = %domain, items = items.len(), findings = findings.len() - before, "domain audited");
    }

    findings.sort_by(|a, b| {
        (a.severity, a.domain, &a.item_id, &a.field).cmp(&(b.severity, b.domain, &b.item_id, &b.field))
    });
    info!(findings = findings.len(), "audit complete");
    findings
}

/// Schema, duplicate-id and date checks for one domain.
pub fn audit_domain(schema: DomainSchema, items: &Mapping, findings: &mut Vec<Finding>) {
    let domain = schema.domain;
    let mut seen_ids: HashMap<String, String> = HashMap::new();

    for (key, item) in items {
        let key_id = key_string(key);
        let Some(record) = item.as_mapping() else {
            findings.push(Finding::new(
                Severity::Medium,
                domain,
                &key_id,
                "",
                format!("item is a {}, expected mapping", matkb_shared::type_name(item)),
            ));
            continue;
        };

        let item_id = record.get("id").map(key_string).unwrap_or_else(|| key_id.clone());
        if let Some(first) = seen_ids.insert(item_id.clone(), key_id.clone()) {
            findings.push(Finding::new(
                Severity::Critical,
                domain,
                &item_id,
                "id",
                format!("duplicate id, also used by '{first}'"),
            ));
        }

        for rule in schema.fields {
            check_field(domain, &item_id, record, rule, findings);
        }
        check_dates(domain, &item_id, record, findings);
    }
}

fn check_field(
    domain: Domain,
    item_id: &str,
    record: &Mapping,
    rule: &FieldRule,
    findings: &mut Vec<Finding>,
) {
    let value = match record.get(rule.name) {
        Some(value) => value,
        None if rule.required => {
            findings.push(Finding::new(
                Severity::Critical,
                domain,
                item_id,
                rule.name,
                "required field missing",
            ));
            return;
        }
        None => return,
    };

    if is_blank(value) {
        let severity = if rule.required { Severity::High } else { Severity::Medium };
        findings.push(Finding::new(severity, domain, item_id, rule.name, "field is blank"));
        return;
    }

    if let Some(reason) = rule.shape.mismatch(value) {
        findings.push(Finding::new(Severity::Medium, domain, item_id, rule.name, reason));
    }
}

fn check_dates(domain: Domain, item_id: &str, record: &Mapping, findings: &mut Vec<Finding>) {
    static ISO_DATE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").expect("valid regex"));

    for field in DATE_FIELDS {
        let Some(value) = record.get(*field) else {
            continue;
        };
        let ok = value.as_str().is_some_and(|s| ISO_DATE_RE.is_match(s.trim()));
        if !ok {
            findings.push(Finding::new(
                Severity::Low,
                domain,
                item_id,
                field,
                format!("'{}' is not an ISO-8601 date", display_value(value)),
            ));
        }
    }
}

// ---------------------------------------------------------------------------
// Cross-domain references
// ---------------------------------------------------------------------------

/// Material lookup by key or `name`, case-insensitive.
struct MaterialIndex {
    names: HashSet<String>,
}

impl MaterialIndex {
    fn new(materials: &Mapping) -> Self {
        let mut names = HashSet::new();
        for (key, item) in materials {
            if let Some(k) = key.as_str() {
                names.insert(k.trim().to_lowercase());
            }
            if let Some(name) = item.get("name").and_then(Value::as_str) {
                names.insert(name.trim().to_lowercase());
            }
        }
        Self { names }
    }

    fn contains(&self, name: &str) -> bool {
        self.names.contains(&name.trim().to_lowercase())
    }
}

fn check_author_refs(materials: &Mapping, registry: &AuthorRegistry, findings: &mut Vec<Finding>) {
    for (key, item) in materials {
        let Some(author) = item.get("author").and_then(Value::as_mapping) else {
            continue;
        };
        let item_id = key_string(key);
        match author.get("id").and_then(Value::as_u64) {
            Some(id) if registry.contains(id) => {}
            Some(id) => findings.push(Finding::new(
                Severity::High,
                Domain::Materials,
                &item_id,
                "author.id",
                format!("author id {id} not found in authors registry"),
            )),
            None => findings.push(Finding::new(
                Severity::High,
                Domain::Materials,
                &item_id,
                "author.id",
                "author has no integer id",
            )),
        }
    }
}

fn check_valid_materials(
    contaminants: &Mapping,
    materials: &MaterialIndex,
    findings: &mut Vec<Finding>,
) {
    for (key, item) in contaminants {
        let Some(valid) = item.get("validMaterials").and_then(Value::as_sequence) else {
            continue;
        };
        let item_id = item.get("id").map(key_string).unwrap_or_else(|| key_string(key));
        for entry in valid {
            let Some(name) = entry.as_str() else {
                findings.push(Finding::new(
                    Severity::Medium,
                    Domain::Contaminants,
                    &item_id,
                    "validMaterials",
                    format!(
                        "entry is a {}, expected material name string",
                        matkb_shared::type_name(entry)
                    ),
                ));
                continue;
            };
            if !materials.contains(name) {
                findings.push(Finding::new(
                    Severity::Medium,
                    Domain::Contaminants,
                    &item_id,
                    "validMaterials",
                    format!("unknown material '{name}'"),
                ));
            }
        }
    }
}

fn check_settings_keys(settings: &Mapping, materials: &MaterialIndex, findings: &mut Vec<Finding>) {
    for key in settings.keys() {
        let name = key_string(key);
        if !materials.contains(&name) {
            findings.push(Finding::new(
                Severity::Medium,
                Domain::Settings,
                &name,
                "",
                format!("settings entry '{name}' does not name a known material"),
            ));
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn key_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => display_value(other),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".into(),
        other => matkb_shared::type_name(other).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matkb_data::CategoryRangeTable;
    use matkb_shared::DataConfig;

    fn parse(src: &str) -> Mapping {
        serde_yaml::from_str(src).unwrap()
    }

    fn sources() -> DomainSources {
        DomainSources {
            materials: parse(
                r#"
Copper: {name: Copper, category: metal, subcategory: non-ferrous, author: {id: 1}, materialProperties: {density: 8.96}, dateModified: 2025-03-14}
Brass: {name: Brass, category: metal, subcategory: '  ', author: {id: 42}, materialProperties: {}, dateModified: March 2025}
Tin: {category: metal, subcategory: pure, author: {id: 1}, materialProperties: {density: 7.3}, applications: Soldering}
"#,
            ),
            contaminants: parse(
                r#"
rust: {id: rust, name: Rust, description: Iron oxide, category: oxidation, validMaterials: [Steel, copper]}
rust-2: {id: rust, name: Rust again, description: Dup, category: oxidation, validMaterials: [Copper]}
paint: {name: Paint, description: Coating, category: coating, validMaterials: [Copper, 42, {name: Brass}]}
"#,
            ),
            compounds: parse("cuo: {name: CuO, chemical_formula: CuO, category: oxide, health_effects: []}"),
            settings: parse(
                "Copper: {machineSettings: {powerRange: 100}}\nGhost: {machineSettings: {powerRange: 50}}",
            ),
            authors: parse("1: {id: 1, name: Yi-Chun Lin, country: Taiwan}\n2: {id: two, name: '', country: Italy}"),
            categories: CategoryRangeTable::default(),
        }
    }

    fn find<'f>(findings: &'f [Finding], item: &str, field: &str) -> Vec<&'f Finding> {
        findings
            .iter()
            .filter(|f| f.item_id == item && f.field == field)
            .collect()
    }

    #[test]
    fn severities_follow_check_kind() {
        let findings = audit(&sources());

        // Missing required field.
        let tin_name = find(&findings, "Tin", "name");
        assert_eq!(tin_name.len(), 1);
        assert_eq!(tin_name[0].severity, Severity::Critical);

        // Blank required field.
        assert_eq!(find(&findings, "Brass", "subcategory")[0].severity, Severity::High);

        // Unknown author.
        let author = find(&findings, "Brass", "author.id");
        assert_eq!(author[0].severity, Severity::High);
        assert!(author[0].message.contains("42"));

        // Shape problems.
        assert_eq!(find(&findings, "Brass", "materialProperties")[0].severity, Severity::Medium);
        assert_eq!(find(&findings, "Tin", "applications")[0].severity, Severity::Medium);
        assert_eq!(find(&findings, "cuo", "health_effects")[0].severity, Severity::Medium);
        assert_eq!(find(&findings, "two", "id")[0].severity, Severity::Medium);
        assert_eq!(find(&findings, "two", "name")[0].severity, Severity::High);

        // Dates.
        let date = find(&findings, "Brass", "dateModified");
        assert_eq!(date[0].severity, Severity::Low);
        assert!(find(&findings, "Copper", "dateModified").is_empty());
    }

    #[test]
    fn cross_domain_references() {
        let findings = audit(&sources());

        let valid = find(&findings, "rust", "validMaterials");
        // "copper" matches Copper case-insensitively; "Steel" does not exist.
        assert_eq!(valid.len(), 1);
        assert!(valid[0].message.contains("Steel"));
        assert_eq!(valid[0].severity, Severity::Medium);

        let cleaning = find(&findings, "paint", "validMaterials");
        assert_eq!(cleaning.len(), 2);
        assert!(cleaning.iter().all(|f| f.severity == Severity::Medium));
        assert!(cleaning.iter().any(|f| f.message.contains("expected material name")));

        let ghost = find(&findings, "Ghost", "");
        assert_eq!(ghost.len(), 1);
        assert_eq!(ghost[0].domain, Domain::Settings);
    }

    #[test]
    fn duplicate_ids_are_critical() {
        let findings = audit(&sources());
        let dup = find(&findings, "rust", "id");
        assert_eq!(dup.len(), 1);
        assert_eq!(dup[0].severity, Severity::Critical);
        assert!(dup[0].message.contains("'rust'"));
    }

    #[test]
    fn findings_are_sorted_by_severity() {
        let findings = audit(&sources());
        assert!(findings.windows(2).all(|w| w[0].severity <= w[1].severity));
        assert_eq!(findings.first().map(|f| f.severity), Some(Severity::Critical));
        assert_eq!(findings.last().map(|f| f.severity), Some(Severity::Low));
    }

    #[test]
    fn non_mapping_item_is_reported() {
        let mut findings = Vec::new();
        audit_domain(
            DomainSchema::for_domain(Domain::Compounds),
            &parse("water: H2O"),
            &mut findings,
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Medium);
        assert_eq!(findings[0].item_id, "water");
    }

    #[test]
    fn fixtures_are_clean() {
        let config = DataConfig {
            dir: "../../../fixtures/yaml".into(),
            ..DataConfig::default()
        };
        let sources = DomainSources::load(&config).expect("load fixtures");
        let findings = audit(&sources);
        assert!(
            findings.is_empty(),
            "unexpected findings: {findings:#?}"
        );
    }
}

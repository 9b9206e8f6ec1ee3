//! Audit report rendering.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

use matkb_data::{Domain, DomainSources};
use matkb_shared::{MatKbError, Result};

use crate::{Finding, Severity};

/// Output format for `matkb audit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Markdown,
    Json,
}

/// Findings plus per-severity and per-domain counts.
#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub items_checked: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_domain: BTreeMap<Domain, usize>,
    pub findings: Vec<Finding>,
}

impl AuditReport {
    pub fn new(sources: &DomainSources, findings: Vec<Finding>) -> Self {
        let items_checked = Domain::ALL.iter().map(|d| sources.domain(*d).len()).sum();

        let mut by_severity: BTreeMap<Severity, usize> =
            Severity::ALL.iter().map(|s| (*s, 0)).collect();
        let mut by_domain: BTreeMap<Domain, usize> = BTreeMap::new();
        for finding in &findings {
            *by_severity.entry(finding.severity).or_default() += 1;
            *by_domain.entry(finding.domain).or_default() += 1;
        }

        Self {
            items_checked,
            by_severity,
            by_domain,
            findings,
        }
    }

    pub fn has_critical(&self) -> bool {
        self.by_severity.get(&Severity::Critical).is_some_and(|n| *n > 0)
    }

    pub fn render(&self, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Markdown => Ok(self.to_markdown()),
            ReportFormat::Json => self.to_json(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| MatKbError::validation(format!("JSON serialization failed: {e}")))
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Data Audit Report\n");
        let _ = writeln!(
            out,
            "Checked {} items, {} findings.\n",
            self.items_checked,
            self.findings.len()
        );

        out.push_str("| Severity | Count |\n|---|---|\n");
        for (severity, count) in &self.by_severity {
            let _ = writeln!(out, "| {severity} | {count} |");
        }

        if self.findings.is_empty() {
            out.push_str("\nNo findings.\n");
            return out;
        }

        out.push_str("\n## Findings\n\n");
        out.push_str("| Severity | Domain | Item | Field | Message |\n|---|---|---|---|---|\n");
        for f in &self.findings {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} |",
                f.severity,
                f.domain,
                escape_cell(&f.item_id),
                escape_cell(&f.field),
                escape_cell(&f.message)
            );
        }
        out
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources() -> DomainSources {
        DomainSources {
            materials: serde_yaml::from_str("Copper: {name: Copper}\nBrass: {name: Brass}").unwrap(),
            compounds: serde_yaml::from_str("cuo: {name: CuO}").unwrap(),
            ..DomainSources::default()
        }
    }

    fn finding(severity: Severity, domain: Domain, item: &str) -> Finding {
        Finding {
            severity,
            domain,
            item_id: item.into(),
            field: "name".into(),
            message: "a | b".into(),
        }
    }

    #[test]
    fn counts_by_severity_and_domain() {
        let report = AuditReport::new(
            &sources(),
            vec![
                finding(Severity::Critical, Domain::Materials, "Copper"),
                finding(Severity::Low, Domain::Materials, "Brass"),
                finding(Severity::Low, Domain::Compounds, "cuo"),
            ],
        );
        assert_eq!(report.items_checked, 3);
        assert_eq!(report.by_severity[&Severity::Critical], 1);
        assert_eq!(report.by_severity[&Severity::High], 0);
        assert_eq!(report.by_severity[&Severity::Low], 2);
        assert_eq!(report.by_domain[&Domain::Materials], 2);
        assert!(report.has_critical());
    }

    #[test]
    fn markdown_table() {
        let report = AuditReport::new(
            &sources(),
            vec![finding(Severity::High, Domain::Materials, "Copper")],
        );
        let md = report.to_markdown();
        assert!(md.starts_with("# Data Audit Report"));
        assert!(md.contains("| HIGH | 1 |"));
        assert!(md.contains("| HIGH | materials | Copper | name | a \\| b |"));
    }

    #[test]
    fn empty_report() {
        let report = AuditReport::new(&sources(), Vec::new());
        assert!(!report.has_critical());
        assert!(report.to_markdown().contains("No findings."));
    }

    #[test]
    fn json_uses_uppercase_severities() {
        let report = AuditReport::new(
            &sources(),
            vec![finding(Severity::Medium, Domain::Compounds, "cuo")],
        );
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["findings"][0]["severity"], "MEDIUM");
        assert_eq!(json["findings"][0]["domain"], "compounds");
        assert_eq!(json["by_severity"]["MEDIUM"], 1);
        assert_eq!(json["by_domain"]["compounds"], 1);
        assert_eq!(json["items_checked"], 3);
    }
}

//! Source data loading for the materials knowledge base.
//!
//! This crate provides:
//! - [`load_domain`]: read one domain YAML file and return its item map
//! - [`CategoryRangeTable`]: the category → property range reference table
//! - [`AuthorRegistry`]: the read-only author lookup
//! - [`DomainSources`]: every domain loaded together, for generation and audit

pub mod authors;
pub mod ranges;

use std::fmt;
use std::path::Path;

use serde::Serialize;
use serde_yaml::{Mapping, Value};
use tracing::{debug, info, instrument, warn};

use matkb_shared::{DataConfig, MatKbError, Result};

pub use authors::AuthorRegistry;
pub use ranges::{CategoryRangeTable, CategoryRanges, RangeSpec};

// ---------------------------------------------------------------------------
// Domains
// ---------------------------------------------------------------------------

/// The five linked data domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Materials,
    Contaminants,
    Compounds,
    Settings,
    Authors,
}

impl Domain {
    pub const ALL: [Domain; 5] = [
        Self::Materials,
        Self::Contaminants,
        Self::Compounds,
        Self::Settings,
        Self::Authors,
    ];

    /// Top-level key holding the item map in the domain file.
    pub fn collection_key(&self) -> &'static str {
        match self {
            Self::Materials => "materials",
            Self::Contaminants => "contamination_patterns",
            Self::Compounds => "compounds",
            Self::Settings => "settings",
            Self::Authors => "authors",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Materials => "materials",
            Self::Contaminants => "contaminants",
            Self::Compounds => "compounds",
            Self::Settings => "settings",
            Self::Authors => "authors",
        }
    }

    /// File name of this domain inside the data directory.
    pub fn file_name<'a>(&self, config: &'a DataConfig) -> &'a str {
        match self {
            Self::Materials => &config.materials_file,
            Self::Contaminants => &config.contaminants_file,
            Self::Compounds => &config.compounds_file,
            Self::Settings => &config.settings_file,
            Self::Authors => &config.authors_file,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Read a domain file and return the item map under `collection_key`.
pub fn load_domain(path: &Path, collection_key: &str) -> Result<Mapping> {
    let content = std::fs::read_to_string(path).map_err(|e| MatKbError::io(path, e))?;
    parse_domain(&content, collection_key)
        .map_err(|e| MatKbError::validation(format!("{}: {e}", path.display())))
}

/// Parse domain YAML text and return the item map under `collection_key`.
pub fn parse_domain(content: &str, collection_key: &str) -> Result<Mapping> {
    let root: Value =
        serde_yaml::from_str(content).map_err(|e| MatKbError::parse(e.to_string()))?;
    let root = root
        .as_mapping()
        .ok_or_else(|| MatKbError::validation("document root must be a mapping"))?;

    match root.get(collection_key) {
        Some(Value::Mapping(items)) => Ok(items.clone()),
        // An empty collection written as `materials:`.
        Some(Value::Null) => Ok(Mapping::new()),
        Some(_) => Err(MatKbError::validation(format!(
            "'{collection_key}' must be a mapping"
        ))),
        None => Err(MatKbError::validation(format!(
            "missing top-level '{collection_key}' key"
        ))),
    }
}

/// All source domains, loaded once per process.
#[derive(Debug, Clone, Default)]
pub struct DomainSources {
    pub materials: Mapping,
    pub contaminants: Mapping,
    pub compounds: Mapping,
    pub settings: Mapping,
    pub authors: Mapping,
    pub categories: CategoryRangeTable,
}

impl DomainSources {
    /// Load every domain file named by the config.
    ///
    /// Materials and categories are required; the other domains are
    /// optional and load as empty when their file is absent.
    #[instrument(skip_all, fields(dir = %config.dir))]
    pub fn load(config: &DataConfig) -> Result<Self> {
        let mut sources = Self {
            categories: CategoryRangeTable::load(&config.path_of(&config.categories_file))?,
            ..Self::default()
        };

        for domain in Domain::ALL {
            let path = config.path_of(domain.file_name(config));
            let items = if domain == Domain::Materials || path.exists() {
                load_domain(&path, domain.collection_key())?
            } else {
                warn!(domain = %domain, path = %path.display(), "domain file not found, treating as empty");
                Mapping::new()
            };
            debug!(domain = %domain, items = items.len(), "domain loaded");
            *sources.domain_mut(domain) = items;
        }

        info!(
            materials = sources.materials.len(),
            contaminants = sources.contaminants.len(),
            compounds = sources.compounds.len(),
            settings = sources.settings.len(),
            authors = sources.authors.len(),
            categories = sources.categories.len(),
            "source data loaded"
        );

        Ok(sources)
    }

    pub fn domain(&self, domain: Domain) -> &Mapping {
        match domain {
            Domain::Materials => &self.materials,
            Domain::Contaminants => &self.contaminants,
            Domain::Compounds => &self.compounds,
            Domain::Settings => &self.settings,
            Domain::Authors => &self.authors,
        }
    }

    fn domain_mut(&mut self, domain: Domain) -> &mut Mapping {
        match domain {
            Domain::Materials => &mut self.materials,
            Domain::Contaminants => &mut self.contaminants,
            Domain::Compounds => &mut self.compounds,
            Domain::Settings => &mut self.settings,
            Domain::Authors => &mut self.authors,
        }
    }

    pub fn author_registry(&self) -> AuthorRegistry {
        AuthorRegistry::from_domain(&self.authors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_config() -> DataConfig {
        DataConfig {
            dir: "../../../fixtures/yaml".into(),
            ..DataConfig::default()
        }
    }

    fn temp_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("matkb-data-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn fixtures_load() {
        let sources = DomainSources::load(&fixture_config()).expect("load fixtures");
        assert_eq!(sources.materials.len(), 3);
        assert_eq!(sources.contaminants.len(), 2);
        assert_eq!(sources.compounds.len(), 2);
        assert_eq!(sources.settings.len(), 2);
        assert_eq!(sources.author_registry().len(), 3);
        assert!(sources.categories.contains("masonry"));
    }

    #[test]
    fn parse_domain_requires_collection_key() {
        let err = parse_domain("compounds: {}", "materials").unwrap_err();
        assert!(err.to_string().contains("missing top-level 'materials'"));

        let err = parse_domain("materials: [a, b]", "materials").unwrap_err();
        assert!(err.to_string().contains("must be a mapping"));

        let empty = parse_domain("materials:", "materials").unwrap();
        assert!(empty.is_empty());

        assert!(parse_domain("- just\n- a list\n", "materials").is_err());
    }

    #[test]
    fn optional_domains_may_be_absent() {
        let tmp = temp_dir();
        std::fs::write(
            tmp.join("Materials.yaml"),
            "materials:\n  Oak: {name: Oak, category: wood}\n",
        )
        .unwrap();
        std::fs::write(
            tmp.join("Categories.yaml"),
            "categories:\n  wood: {category_ranges: {density: {min: 0.1, max: 1.2, unit: g/cm³}}}\n",
        )
        .unwrap();

        let config = DataConfig {
            dir: tmp.to_string_lossy().to_string(),
            ..DataConfig::default()
        };
        let sources = DomainSources::load(&config).expect("load");
        assert_eq!(sources.materials.len(), 1);
        assert!(sources.contaminants.is_empty());
        assert!(sources.author_registry().is_empty());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_materials_file_is_an_error() {
        let tmp = temp_dir();
        std::fs::write(tmp.join("Categories.yaml"), "categories: {}\n").unwrap();
        let config = DataConfig {
            dir: tmp.to_string_lossy().to_string(),
            ..DataConfig::default()
        };
        let err = DomainSources::load(&config).unwrap_err();
        assert!(matches!(err, MatKbError::Io { .. }));

        let _ = std::fs::remove_dir_all(&tmp);
    }
}

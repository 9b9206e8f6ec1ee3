//! Application configuration.
//!
//! User config lives at `~/.matkb/matkb.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MatKbError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "matkb.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".matkb";

// ---------------------------------------------------------------------------
// Config structs (matching matkb.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Source data locations.
    #[serde(default)]
    pub data: DataConfig,

    /// Output settings.
    #[serde(default)]
    pub output: OutputConfig,

    /// Generation behaviour.
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// `[data]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding the domain YAML files.
    #[serde(default = "default_data_dir")]
    pub dir: String,

    #[serde(default = "default_materials_file")]
    pub materials_file: String,

    #[serde(default = "default_contaminants_file")]
    pub contaminants_file: String,

    #[serde(default = "default_compounds_file")]
    pub compounds_file: String,

    #[serde(default = "default_settings_file")]
    pub settings_file: String,

    #[serde(default = "default_authors_file")]
    pub authors_file: String,

    /// Category range reference file.
    #[serde(default = "default_categories_file")]
    pub categories_file: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
            materials_file: default_materials_file(),
            contaminants_file: default_contaminants_file(),
            compounds_file: default_compounds_file(),
            settings_file: default_settings_file(),
            authors_file: default_authors_file(),
            categories_file: default_categories_file(),
        }
    }
}

impl DataConfig {
    /// Absolute-or-relative path of one data file inside `dir`.
    pub fn path_of(&self, file: &str) -> PathBuf {
        Path::new(&self.dir).join(file)
    }
}

fn default_data_dir() -> String {
    "data".into()
}
fn default_materials_file() -> String {
    "Materials.yaml".into()
}
fn default_contaminants_file() -> String {
    "Contaminants.yaml".into()
}
fn default_compounds_file() -> String {
    "Compounds.yaml".into()
}
fn default_settings_file() -> String {
    "Settings.yaml".into()
}
fn default_authors_file() -> String {
    "Authors.yaml".into()
}
fn default_categories_file() -> String {
    "Categories.yaml".into()
}

/// Serialization format for generated frontmatter files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain `.yaml` document.
    #[default]
    Yaml,
    /// `.md` file with the YAML between `---` delimiters.
    Markdown,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Markdown => "md",
        }
    }
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory generated frontmatter files are written to.
    #[serde(default = "default_output_dir")]
    pub dir: String,

    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            format: OutputFormat::default(),
        }
    }
}

fn default_output_dir() -> String {
    "frontmatter".into()
}

/// `[generation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Pass the material's `faq` list through to the output.
    #[serde(default = "default_true")]
    pub include_faq: bool,

    /// Wrap generation in the fallback normalizer.
    #[serde(default)]
    pub normalize: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            include_faq: true,
            normalize: false,
        }
    }
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.matkb/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| MatKbError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.matkb/matkb.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| MatKbError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| MatKbError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| MatKbError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| MatKbError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| MatKbError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

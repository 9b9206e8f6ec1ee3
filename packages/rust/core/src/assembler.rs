//! Output assembler.
//!
//! Takes a batch of generated documents and writes one frontmatter file per
//! material plus a `manifest.json` to the output directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use matkb_shared::{Document, MatKbError, OutputFormat, REQUIRED_FIELDS, Result, slugify};

use crate::GENERATOR;
use crate::pipeline::BatchResult;

const MANIFEST_FILE: &str = "manifest.json";

/// Suffix on every generated file stem.
const FILE_SUFFIX: &str = "-laser-cleaning";

/// Configuration for output assembly.
#[derive(Debug, Clone)]
pub struct AssembleConfig {
    /// Directory the files are written to; created when missing.
    pub output_dir: PathBuf,
    pub format: OutputFormat,
}

/// One written file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub material: String,
    pub file: String,
    pub sha256: String,
    pub size_bytes: usize,
}

/// Contents of `manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputManifest {
    pub generator: String,
    pub generated_at: DateTime<Utc>,
    pub format: OutputFormat,
    pub file_count: usize,
    pub files: Vec<ManifestEntry>,
    /// Batch errors, one per failed material.
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Output from a successful assembly.
#[derive(Debug, Clone)]
pub struct AssembleResult {
    pub output_dir: PathBuf,
    pub manifest: OutputManifest,
}

/// File name for a material's document: `<slug>-laser-cleaning.<ext>`.
///
/// The document's own `slug` wins over the material key.
pub fn output_file_name(material: &str, doc: &Document, format: OutputFormat) -> String {
    let slug = doc
        .get("slug")
        .and_then(Value::as_str)
        .map(slugify)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| slugify(material));
    format!("{slug}{FILE_SUFFIX}.{}", format.extension())
}

/// Write every document in the batch and the manifest.
///
/// ```text
/// <output_dir>/
/// ├── manifest.json
/// ├── copper-laser-cleaning.yaml
/// └── ...
/// ```
#[instrument(skip_all, fields(dir = %config.output_dir.display(), documents = batch.documents.len()))]
pub fn assemble(config: &AssembleConfig, batch: &BatchResult) -> Result<AssembleResult> {
    let dir = &config.output_dir;
    std::fs::create_dir_all(dir).map_err(|e| MatKbError::io(dir, e))?;
    info!(path = %dir.display(), "assembling frontmatter output");

    let mut files = Vec::with_capacity(batch.documents.len());
    let mut errors = batch.errors.clone();
    let mut written: HashSet<String> = HashSet::new();
    for (material, doc) in &batch.documents {
        let violations = REQUIRED_FIELDS.violations(doc);
        if !violations.is_empty() {
            let fields: Vec<_> = violations.iter().map(|(f, _)| *f).collect();
            warn!(material = %material, ?fields, "document is missing required fields");
        }

        let file = output_file_name(material, doc, config.format);
        if !written.insert(file.clone()) {
            warn!(material = %material, file = %file, "output file name already used, skipping");
            errors.push(format!("{material}: output file {file} collides with another material"));
            continue;
        }

        let content = matkb_frontmatter::render(doc, config.format)?;
        write_atomic(&dir.join(&file), content.as_bytes())?;
        debug!(material = %material, file = %file, size = content.len(), "wrote frontmatter");

        files.push(ManifestEntry {
            material: material.clone(),
            file,
            sha256: sha256_hex(content.as_bytes()),
            size_bytes: content.len(),
        });
    }

    let manifest = OutputManifest {
        generator: GENERATOR.to_string(),
        generated_at: Utc::now(),
        format: config.format,
        file_count: files.len(),
        files,
        errors,
    };
    write_json(&dir.join(MANIFEST_FILE), &manifest)?;

    info!(
        file_count = manifest.file_count,
        errors = manifest.errors.len(),
        path = %dir.display(),
        "output assembly complete"
    );

    Ok(AssembleResult {
        output_dir: dir.clone(),
        manifest,
    })
}

/// Verify an output directory against its manifest: every listed file
/// exists and matches its checksum.
pub fn validate_output(dir: &Path) -> Result<OutputManifest> {
    let manifest_path = dir.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Err(MatKbError::validation("missing manifest.json"));
    }

    let content = std::fs::read_to_string(&manifest_path)
        .map_err(|e| MatKbError::io(&manifest_path, e))?;
    let manifest: OutputManifest = serde_json::from_str(&content)
        .map_err(|e| MatKbError::validation(format!("invalid manifest.json: {e}")))?;

    if manifest.file_count != manifest.files.len() {
        return Err(MatKbError::validation(format!(
            "manifest lists {} files but file_count is {}",
            manifest.files.len(),
            manifest.file_count
        )));
    }

    for entry in &manifest.files {
        let path = dir.join(&entry.file);
        let bytes = std::fs::read(&path).map_err(|e| MatKbError::io(&path, e))?;
        if sha256_hex(&bytes) != entry.sha256 {
            return Err(MatKbError::validation(format!(
                "checksum mismatch for {}",
                entry.file
            )));
        }
    }

    Ok(manifest)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Write to a temp file in the same directory, then rename over the target.
fn write_atomic(target: &Path, content: &[u8]) -> Result<()> {
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| MatKbError::validation(format!("invalid output path {}", target.display())))?;
    let temp = target.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, content).map_err(|e| MatKbError::io(&temp, e))?;
    std::fs::rename(&temp, target).map_err(|e| MatKbError::io(target, e))?;
    Ok(())
}

/// Write a JSON file (pretty-printed).
fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| MatKbError::validation(format!("JSON serialization failed: {e}")))?;
    write_atomic(path, json.as_bytes())?;
    debug!(path = %path.display(), "wrote JSON file");
    Ok(())
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

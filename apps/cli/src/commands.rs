//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use matkb_audit::{AuditReport, ReportFormat};
use matkb_core::assembler::{self, AssembleConfig};
use matkb_core::{
    BatchResult, FallbackLevel, GenerateOptions, Orchestrator, ProgressReporter, ResolverContext,
};
use matkb_data::DomainSources;
use matkb_shared::{AppConfig, OutputFormat, init_config, load_config, load_config_from};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// matkb: laser-cleaning frontmatter for the materials knowledge base.
#[derive(Parser)]
#[command(
    name = "matkb",
    version,
    about = "Generate laser-cleaning frontmatter from the materials knowledge base and audit its source data.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.matkb/matkb.toml.
    #[arg(long, env = "MATKB_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Frontmatter file format.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum FormatArg {
    Yaml,
    Markdown,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Yaml => OutputFormat::Yaml,
            FormatArg::Markdown => OutputFormat::Markdown,
        }
    }
}

/// Audit report format.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum ReportArg {
    Markdown,
    Json,
}

impl From<ReportArg> for ReportFormat {
    fn from(arg: ReportArg) -> Self {
        match arg {
            ReportArg::Markdown => ReportFormat::Markdown,
            ReportArg::Json => ReportFormat::Json,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Generate frontmatter files for every material (or the named ones).
    Generate {
        /// Directory holding the domain YAML files.
        #[arg(long)]
        data: Option<String>,

        /// Output directory for the generated files.
        #[arg(short, long)]
        out: Option<String>,

        /// Material to generate (repeatable). Defaults to all.
        #[arg(short, long = "material")]
        materials: Vec<String>,

        /// Output file format.
        #[arg(short, long)]
        format: Option<FormatArg>,

        /// Leave the FAQ out of the generated documents.
        #[arg(long)]
        no_faq: bool,

        /// Run every material through the fallback normalizer.
        #[arg(long)]
        normalize: bool,
    },

    /// Audit the source data for cross-domain consistency.
    Audit {
        /// Directory holding the domain YAML files.
        #[arg(long)]
        data: Option<String>,

        /// Report format.
        #[arg(short, long, default_value = "markdown")]
        format: ReportArg,

        /// Write the report to a file instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Check a generated output directory against its manifest.
    Verify {
        /// Output directory to check.
        #[arg(short, long)]
        out: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "matkb=info",
        1 => "matkb=debug",
        _ => "matkb=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(cli.config.as_deref())?;

    match cli.command {
        Command::Generate {
            data,
            out,
            materials,
            format,
            no_faq,
            normalize,
        } => {
            let mut config = config;
            if let Some(dir) = data {
                config.data.dir = dir;
            }
            if let Some(dir) = out {
                config.output.dir = dir;
            }
            if let Some(format) = format {
                config.output.format = format.into();
            }
            if no_faq {
                config.generation.include_faq = false;
            }
            if normalize {
                config.generation.normalize = true;
            }
            cmd_generate(&config, &materials)
        }
        Command::Audit { data, format, out } => {
            let mut config = config;
            if let Some(dir) = data {
                config.data.dir = dir;
            }
            cmd_audit(&config, format.into(), out.as_deref())
        }
        Command::Verify { out } => {
            let dir = out.unwrap_or(config.output.dir);
            cmd_verify(Path::new(&dir))
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_generate(config: &AppConfig, materials: &[String]) -> Result<()> {
    info!(
        data = %config.data.dir,
        out = %config.output.dir,
        format = config.output.format.extension(),
        "generating frontmatter"
    );

    let sources = DomainSources::load(&config.data)?;
    let authors = sources.author_registry();
    let ctx = ResolverContext {
        ranges: &sources.categories,
        authors: &authors,
        settings: &sources.settings,
    };
    let orchestrator = Orchestrator::new(ctx);

    let options = GenerateOptions {
        include_faq: config.generation.include_faq,
        normalize: config.generation.normalize,
    };
    let names = (!materials.is_empty()).then_some(materials);

    let reporter = CliProgress::new();
    let batch = orchestrator.generate_batch(&sources.materials, names, &options, &reporter);

    let assemble_config = AssembleConfig {
        output_dir: PathBuf::from(&config.output.dir),
        format: config.output.format,
    };
    let assembled = assembler::assemble(&assemble_config, &batch)?;

    // Print summary
    println!();
    println!("  Frontmatter generated.");
    println!("  Files:   {}", assembled.manifest.file_count);
    println!("  Failed:  {}", batch.errors.len());
    println!("  Path:    {}", assembled.output_dir.display());
    if let Some(stats) = &batch.normalizer_stats {
        println!(
            "  Normalizer: {} fields checked, {} replaced, {} fallbacks",
            stats.fields_processed, stats.fields_normalized, stats.fallbacks_used
        );
        for (material, level) in batch.levels.iter().filter(|(_, l)| **l != FallbackLevel::Primary) {
            println!("    {material}: {}", level.as_str());
        }
    }
    println!("  Time:    {:.1}s", batch.elapsed.as_secs_f64());
    for error in &batch.errors {
        println!("  ✗ {error}");
    }
    println!();

    if !batch.is_success() {
        return Err(eyre!("{} material(s) failed to generate", batch.errors.len()));
    }
    Ok(())
}

fn cmd_audit(config: &AppConfig, format: ReportFormat, out: Option<&Path>) -> Result<()> {
    info!(data = %config.data.dir, "auditing source data");

    let sources = DomainSources::load(&config.data)?;
    let findings = matkb_audit::audit(&sources);
    let report = AuditReport::new(&sources, findings);
    let rendered = report.render(format)?;

    match out {
        Some(path) => {
            std::fs::write(path, &rendered)
                .map_err(|e| eyre!("failed to write report to {}: {e}", path.display()))?;
            println!("Audit report written to: {}", path.display());
        }
        None => println!("{rendered}"),
    }

    if report.has_critical() {
        return Err(eyre!("audit found CRITICAL findings"));
    }
    Ok(())
}

fn cmd_verify(dir: &Path) -> Result<()> {
    let manifest = assembler::validate_output(dir)?;
    println!(
        "{}: {} files match manifest ({})",
        dir.display(),
        manifest.file_count,
        manifest.generator
    );
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif bar.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> ")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn material_started(&self, name: &str, current: usize, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(current.saturating_sub(1) as u64);
        self.bar.set_message(name.to_string());
    }

    fn material_finished(&self, name: &str, ok: bool) {
        self.bar.inc(1);
        if !ok {
            self.bar.println(format!("  ✗ {name}"));
        }
    }

    fn done(&self, _result: &BatchResult) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_flags_parse() {
        let cli = Cli::try_parse_from([
            "matkb",
            "-vv",
            "generate",
            "--data",
            "fixtures/yaml",
            "--material",
            "Copper",
            "-m",
            "Stucco",
            "--format",
            "markdown",
            "--no-faq",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Generate {
                data,
                materials,
                format,
                no_faq,
                normalize,
                ..
            } => {
                assert_eq!(data.as_deref(), Some("fixtures/yaml"));
                assert_eq!(materials, vec!["Copper", "Stucco"]);
                assert!(matches!(format, Some(FormatArg::Markdown)));
                assert!(no_faq);
                assert!(!normalize);
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn audit_defaults_to_markdown() {
        let cli = Cli::try_parse_from(["matkb", "audit"]).unwrap();
        match cli.command {
            Command::Audit { format, out, .. } => {
                assert!(matches!(format, ReportArg::Markdown));
                assert!(out.is_none());
            }
            _ => panic!("expected audit"),
        }
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(Cli::try_parse_from(["matkb", "generate", "--format", "toml"]).is_err());
    }
}

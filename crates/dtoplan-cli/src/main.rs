use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use dtoplan_core::config::{self, CONFIG_FILE_NAME, ProjectConfig};
use dtoplan_core::ir::{EmissionPlan, FileContent};
use dtoplan_core::parse::{self, spec::OpenApiSpec};
use dtoplan_core::transform;

#[derive(Parser)]
#[command(name = "dtoplan", about = "Plan DTO and interface files from an OpenAPI 3.x spec", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan every file and write the emission manifest
    Plan {
        /// Path to the OpenAPI spec file (YAML or JSON)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Manifest destination; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Manifest format
        #[arg(long, default_value = "yaml")]
        format: OutputFormat,
    },

    /// Validate that a spec parses and plans
    Validate {
        /// Path to the OpenAPI spec file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Summarize the planned files of a spec
    Inspect {
        /// Path to the OpenAPI spec file
        #[arg(short, long)]
        input: PathBuf,

        /// Output format
        #[arg(long, default_value = "yaml")]
        format: OutputFormat,
    },

    /// Initialize a new dtoplan configuration
    Init {
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Plan {
            input,
            output,
            format,
        } => cmd_plan(input, output, format),

        Commands::Validate { input } => cmd_validate(&input),

        Commands::Inspect { input, format } => cmd_inspect(&input, format),

        Commands::Init { force } => cmd_init(Path::new("."), force),

        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            clap_complete::generate(shell, &mut cmd, "dtoplan", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Load `.dtoplan.yaml` from `dir`, falling back to defaults.
fn load_project_config(dir: &Path) -> Result<ProjectConfig> {
    let config_path = dir.join(CONFIG_FILE_NAME);
    let loaded = config::load_config(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    match loaded {
        Some(cfg) => {
            log::debug!("loaded {}", config_path.display());
            Ok(cfg)
        }
        None => {
            log::debug!("no {} found, using defaults", config_path.display());
            Ok(ProjectConfig::default())
        }
    }
}

fn read_spec(path: &Path) -> Result<OpenApiSpec> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("yaml");

    let spec = match ext {
        "json" => parse::from_json(&content),
        _ => parse::from_yaml(&content),
    }
    .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(spec)
}

fn plan_file(path: &Path, cfg: &ProjectConfig) -> Result<EmissionPlan> {
    let spec = read_spec(path)?;
    let plan = transform::plan_spec(&spec, &cfg.plan)
        .with_context(|| format!("failed to plan {}", path.display()))?;
    Ok(plan)
}

fn render<T: serde::Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Yaml => serde_yaml_ng::to_string(value)?,
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(value)?;
            json.push('\n');
            json
        }
    })
}

/// Write `content` to `path`, creating parent directories.
fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

fn cmd_plan(input: Option<PathBuf>, output: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let cfg = load_project_config(Path::new("."))?;
    let input = input.unwrap_or_else(|| PathBuf::from(&cfg.input));

    // Planning either succeeds as a whole or nothing is written.
    let plan = plan_file(&input, &cfg)?;
    let manifest = render(&plan, format)?;

    match output {
        Some(path) => {
            write_output(&path, &manifest)?;
            eprintln!("Planned {} files → {}", plan.files.len(), path.display());
        }
        None => print!("{manifest}"),
    }
    for group in &plan.cycle_groups {
        eprintln!("  note: {} emitted with forward references", group.join(", "));
    }
    Ok(())
}

fn cmd_validate(input: &Path) -> Result<()> {
    let spec = read_spec(input)?;

    eprintln!("Valid OpenAPI {} spec: {}", spec.openapi, spec.info.title);
    eprintln!("  Version: {}", spec.info.version);
    eprintln!("  Paths: {}", spec.paths.len());
    eprintln!("  Schemas: {}", spec.component_schemas().count());

    let cfg = load_project_config(Path::new("."))?;
    let plan = transform::plan_spec(&spec, &cfg.plan)
        .with_context(|| format!("failed to plan {}", input.display()))?;
    eprintln!("  Models: {}", plan.models().count());
    eprintln!("  Interfaces: {}", plan.interfaces().count());
    eprintln!(
        "  Operations: {}",
        plan.interfaces().map(|i| i.operations.len()).sum::<usize>()
    );

    eprintln!("Validation successful.");
    Ok(())
}

fn cmd_inspect(input: &Path, format: OutputFormat) -> Result<()> {
    let cfg = load_project_config(Path::new("."))?;
    let plan = plan_file(input, &cfg)?;
    print!("{}", render(&inspect_summary(&plan), format)?);
    Ok(())
}

fn inspect_summary(plan: &EmissionPlan) -> serde_json::Value {
    let files: Vec<serde_json::Value> = plan
        .files
        .iter()
        .map(|f| {
            let (kind, detail) = match &f.content {
                FileContent::Model(m) => (
                    "model",
                    serde_json::json!({
                        "schema": m.schema_name,
                        "fields": m.fields().len(),
                        "requires_indirection": m.requires_indirection,
                    }),
                ),
                FileContent::Interface(i) => (
                    "interface",
                    serde_json::json!({
                        "group": i.group_key,
                        "operations": i.operations.iter().map(|o| &o.operation_id).collect::<Vec<_>>(),
                    }),
                ),
            };
            serde_json::json!({
                "name": f.name,
                "kind": kind,
                "path": f.output_path,
                "imports": f.imports.iter().map(|i| &i.qualified).collect::<Vec<_>>(),
                "detail": detail,
            })
        })
        .collect();

    serde_json::json!({
        "files": files,
        "cycle_groups": plan.cycle_groups,
    })
}

fn cmd_init(dir: &Path, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILE_NAME);

    if config_path.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite.",
            config_path.display()
        );
    }

    write_output(&config_path, config::default_config_content())?;
    eprintln!("Created {}", config_path.display());
    Ok(())
}

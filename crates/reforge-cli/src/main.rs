//! Reforge CLI
//!
//! The `reforge` command validates artifacts against named rubrics and runs
//! the self-refinement loop.
//!
//! ## Commands
//!
//! - `validate`: Judge a file with one or more validators
//! - `refine`: Generate, validate and regenerate until the result converges
//! - `show`: Load and verify a persisted refinement record
//! - `validators`: List the validators that can be resolved

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use reforge_core::domain::{InputMap, ValidationLevel, ValidationStatus};
use reforge_core::llm::{GenerationRequest, ModelSelector, TextGenerator};
use reforge_core::{
    read_refinement_artifact, render_refinement_md, render_report_md, report_validator,
    write_refinement_artifact, write_report_artifact, write_report_md, HttpTextGenerator, LlmFeedbackExtractor,
    LogOptions, RefinementLoop, ReforgeConfig, TieredModelSelector, TracingEventSink, ValidationContext,
    ValidatorRunner,
};

#[derive(Parser)]
#[command(name = "reforge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Validate generated artifacts and refine them until they pass", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// TOML configuration file
    #[arg(long, global = true, env = "REFORGE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a file with one or more validators
    Validate {
        /// File to validate
        #[arg(short, long)]
        file: PathBuf,

        /// Validator name (repeatable)
        #[arg(long = "validator", default_values_t = vec!["code".to_string()])]
        validators: Vec<String>,

        /// quick, standard or thorough
        #[arg(short, long, default_value = "standard")]
        level: ValidationLevel,

        /// Language of the artifact
        #[arg(long)]
        language: Option<String>,

        /// Project name passed to the rubric
        #[arg(long)]
        project: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,

        /// Write an audit record of the report to this directory
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Generate an artifact for a task and refine it until it passes
    Refine {
        /// Task description given to the generator
        #[arg(short, long)]
        task: String,

        /// Validator name (repeatable)
        #[arg(long = "validator", default_values_t = vec!["code".to_string()])]
        validators: Vec<String>,

        /// quick, standard or thorough
        #[arg(short, long, default_value = "standard")]
        level: ValidationLevel,

        /// Override the configured iteration budget
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Override the configured minimum average score
        #[arg(long)]
        threshold: Option<f64>,

        /// Accept WARNING reports without critical findings
        #[arg(long)]
        allow_partial: bool,

        /// Ask the model for structured feedback between iterations
        #[arg(long)]
        structured_feedback: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,

        /// Write the audit record to this directory
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Load and verify a persisted refinement record
    Show {
        /// Directory holding audit records
        #[arg(long)]
        dir: PathBuf,

        /// Run ID to load
        #[arg(long)]
        run_id: String,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
    },

    /// List resolvable validator names
    Validators,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    LogOptions::for_cli(cli.verbose, cli.json).install();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Validate {
            file,
            validators,
            level,
            language,
            project,
            format,
            out_dir,
        } => {
            let status = cmd_validate(
                &config,
                &file,
                &validators,
                level,
                language,
                project,
                format,
                out_dir.as_deref(),
            )
            .await?;
            if status == ValidationStatus::Fail {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Refine {
            task,
            validators,
            level,
            max_iterations,
            threshold,
            allow_partial,
            structured_feedback,
            format,
            out_dir,
        } => {
            let mut config = config;
            if let Some(n) = max_iterations {
                config.refinement.max_iterations = n;
            }
            if let Some(t) = threshold {
                config.refinement.min_score_threshold = t;
            }
            config.refinement.allow_partial |= allow_partial;
            let converged = cmd_refine(
                &config,
                &task,
                validators,
                level,
                structured_feedback,
                format,
                out_dir.as_deref(),
            )
            .await?;
            if !converged {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Show {
            dir,
            run_id,
            format,
        } => cmd_show(&dir, &run_id, format),
        Commands::Validators => cmd_validators(&config),
    }
}

fn load_config(path: Option<&Path>) -> Result<ReforgeConfig> {
    match path {
        Some(p) => {
            ReforgeConfig::load(p).with_context(|| format!("load config {}", p.display()))
        }
        None => Ok(ReforgeConfig::default()),
    }
}

fn build_runner(
    config: &ReforgeConfig,
    generator: Arc<dyn TextGenerator>,
    selector: Arc<TieredModelSelector>,
) -> Result<ValidatorRunner> {
    let registry = config.template_registry().context("build template registry")?;
    let runner = ValidatorRunner::new(
        Arc::new(registry),
        generator,
        selector,
        config.runner.clone(),
    )?
    .with_events(Arc::new(TracingEventSink));
    Ok(runner)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_validate(
    config: &ReforgeConfig,
    file: &Path,
    validators: &[String],
    level: ValidationLevel,
    language: Option<String>,
    project: Option<String>,
    format: OutputFormat,
    out_dir: Option<&Path>,
) -> Result<ValidationStatus> {
    let artifact = std::fs::read_to_string(file)
        .with_context(|| format!("read {}", file.display()))?;

    let mut context = ValidationContext::new();
    context.insert("file_path".to_string(), file.display().to_string());
    if let Some(language) = language {
        context.insert("language".to_string(), language);
    }
    if let Some(project) = project {
        context.insert("project_name".to_string(), project);
    }

    let generator: Arc<dyn TextGenerator> =
        Arc::new(HttpTextGenerator::from_env().context("build HTTP generator")?);
    let selector = Arc::new(TieredModelSelector::new(config.models.clone()));
    let runner = build_runner(config, generator, selector)?;

    let report = runner
        .validate_many(&artifact, validators, &context, level)
        .await?;
    runner.flush_stats();

    match format {
        OutputFormat::Markdown => print!("{}", render_report_md(&report)),
        OutputFormat::Json => print_json(&report)?,
    }

    if let Some(dir) = out_dir {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact".to_string());
        let path = write_report_artifact(&report, dir, &name)?;
        let md_path = path.with_extension("md");
        write_report_md(&md_path, &report)?;
        info!(path = %path.display(), markdown = %md_path.display(), "report written");
    }

    Ok(report.overall_status())
}

async fn cmd_refine(
    config: &ReforgeConfig,
    task: &str,
    validators: Vec<String>,
    level: ValidationLevel,
    structured_feedback: bool,
    format: OutputFormat,
    out_dir: Option<&Path>,
) -> Result<bool> {
    let generator: Arc<dyn TextGenerator> =
        Arc::new(HttpTextGenerator::from_env().context("build HTTP generator")?);
    let selector = Arc::new(TieredModelSelector::new(config.models.clone()));
    let runner = Arc::new(build_runner(config, generator.clone(), selector.clone())?);

    let mut refinement = RefinementLoop::new(config.refinement.clone())?
        .with_events(Arc::new(TracingEventSink));
    if structured_feedback {
        let model = selector.select_model("feedback", level);
        refinement = refinement
            .with_feedback_extractor(Arc::new(LlmFeedbackExtractor::new(generator.clone(), model)));
    }

    let mut input = InputMap::new();
    input.insert("task".to_string(), serde_json::Value::String(task.to_string()));

    let generation_model = selector.select_model("generation", level);
    let generate_fn = |input: InputMap| {
        let generator = generator.clone();
        let model = generation_model.clone();
        async move {
            let prompt = input
                .get("regeneration_prompt")
                .and_then(|v| v.as_str())
                .or_else(|| input.get("task").and_then(|v| v.as_str()))
                .unwrap_or_default()
                .to_string();
            let request = GenerationRequest::new(prompt, model).with_temperature(0.3);
            let artifact = generator.generate(&request).await?;
            Ok::<_, anyhow::Error>(artifact)
        }
    };
    let validate_fn = report_validator(runner.clone(), validators, level);

    let result = refinement.refine(input, generate_fn, validate_fn).await;
    runner.flush_stats();
    info!(run_id = %result.run_id, outcome = ?result.outcome, "{}", result.summary());

    match format {
        OutputFormat::Markdown => {
            print!("{}", render_refinement_md(&result));
            if let Some(artifact) = &result.final_artifact {
                println!("\n## Final artifact\n\n{}", artifact);
            }
        }
        OutputFormat::Json => print_json(&result)?,
    }

    if let Some(dir) = out_dir {
        let path = write_refinement_artifact(&result, dir)?;
        info!(path = %path.display(), run_id = %result.run_id, "refinement record written");
    }

    Ok(result.converged)
}

fn cmd_show(dir: &Path, run_id: &str, format: OutputFormat) -> Result<()> {
    let result = read_refinement_artifact(run_id, dir)
        .with_context(|| format!("load refinement record {}", run_id))?;
    match format {
        OutputFormat::Markdown => print!("{}", render_refinement_md(&result)),
        OutputFormat::Json => print_json(&result)?,
    }
    Ok(())
}

fn cmd_validators(config: &ReforgeConfig) -> Result<()> {
    let registry = config.template_registry()?;
    for name in registry.validator_names() {
        println!("{}", name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_repeated_validators_and_level() {
        let cli = Cli::try_parse_from([
            "reforge",
            "validate",
            "--file",
            "src/lib.rs",
            "--validator",
            "code",
            "--validator",
            "tests",
            "--level",
            "thorough",
        ])
        .unwrap();
        match cli.command {
            Commands::Validate {
                validators, level, ..
            } => {
                assert_eq!(validators, vec!["code", "tests"]);
                assert_eq!(level, ValidationLevel::Thorough);
            }
            _ => panic!("expected validate"),
        }
    }

    #[test]
    fn refine_defaults_to_code_validator() {
        let cli = Cli::try_parse_from(["reforge", "refine", "--task", "write fizzbuzz"]).unwrap();
        match cli.command {
            Commands::Refine {
                validators,
                max_iterations,
                ..
            } => {
                assert_eq!(validators, vec!["code"]);
                assert!(max_iterations.is_none());
            }
            _ => panic!("expected refine"),
        }
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.refinement.max_iterations, 3);
    }

    #[test]
    fn unreadable_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("missing.toml"))).is_err());
    }
}

//! bidreview CLI
//!
//! Local entry point for validating rubrics and scoring documents.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bidreview::{
    cache::ResultCache,
    client::ResilientClient,
    config::{self, CONFIG_FILE, ORGANIZATION_FILE},
    error::{AppError, Result},
    models::{
        AnalysisContext, AnalysisPreset, Classification, OrganizationConfig, ParamValue,
    },
    scoring::{LocalAnalyzer, ScoreCalculator},
    service::{AnalysisService, Analyzer},
};
use clap::{Parser, Subcommand};

/// bidreview - Bidding document rubric scorer
#[derive(Parser, Debug)]
#[command(
    name = "bidreview",
    version,
    about = "Score bidding documents against an organization rubric"
)]
struct Cli {
    /// Directory containing bidreview.toml and organization.toml
    #[arg(short, long, default_value = ".")]
    config_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate service configuration and the organization rubric
    Validate,

    /// Analyze a text document
    Analyze {
        /// Path to the document text
        file: PathBuf,

        /// Classification path, e.g. "bidding/auction/goods"
        #[arg(long, default_value = "")]
        classification: String,

        /// Analysis parameter as key=value (repeatable)
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,

        /// Score in-process instead of calling the remote service
        #[arg(long)]
        offline: bool,
    },

    /// Check the remote analysis service
    Health,

    /// List analysis presets
    Presets,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Organization rubric, or the standard preset when no file exists.
fn organization_or_default(path: &Path) -> Result<OrganizationConfig> {
    if path.exists() {
        return config::load_organization(path);
    }
    log::warn!(
        "No organization file at {}. Using the standard preset.",
        path.display()
    );
    Ok(OrganizationConfig::from_preset(
        "default",
        "Default",
        AnalysisPreset::Standard,
    ))
}

fn parse_param(raw: &str) -> Result<(String, ParamValue)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| AppError::validation(format!("Expected KEY=VALUE, got '{raw}'")))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(AppError::validation(format!("Empty parameter name in '{raw}'")));
    }
    Ok((key.to_string(), ParamValue::parse(value.trim())))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = config::load_config(&cli.config_dir.join(CONFIG_FILE))?;
    let organization_path = cli.config_dir.join(ORGANIZATION_FILE);

    match cli.command {
        Command::Validate => {
            log::info!("Validating configuration...");
            log::info!("✓ Service config OK");

            let organization = OrganizationConfig::load(&organization_path)?;
            let report = organization.validate();

            for error in &report.errors {
                log::error!("✗ {error}");
            }
            for warning in &report.warnings {
                log::warn!("! {warning}");
            }
            for suggestion in &report.suggestions {
                log::info!("→ {suggestion}");
            }

            let summary = organization.summary();
            log::info!(
                "Organization '{}': {} preset, {:?} distribution, dominant {}, {}/{} rules active",
                summary.name,
                summary.preset.as_str(),
                summary.distribution_type,
                summary.dominant_category,
                summary.active_rules,
                summary.total_rules
            );

            if !report.valid {
                return Err(AppError::config(format!(
                    "{} error(s) in {}",
                    report.errors.len(),
                    organization_path.display()
                )));
            }
            log::info!("All validations passed!");
        }

        Command::Analyze {
            file,
            classification,
            params,
            offline,
        } => {
            let organization = organization_or_default(&organization_path)?;
            let text = tokio::fs::read_to_string(&file).await?;

            let mut context = AnalysisContext::new(text, Classification::parse(&classification));
            for raw in &params {
                let (key, value) = parse_param(raw)?;
                context.parameters.insert(key, value);
            }

            let analyzer: Arc<dyn Analyzer> = if offline {
                Arc::new(LocalAnalyzer::new(config.service.max_recommendations))
            } else {
                Arc::new(ResilientClient::from_config(&config)?)
            };
            let cache = Arc::new(ResultCache::new(config.cache.clone()));
            let service = AnalysisService::new(
                cache,
                analyzer,
                organization,
                config.service.clone(),
            );

            let result = service.analyze(&context).await?;
            log::info!(
                "{}: weighted score {:.1} ({}), {} findings",
                file.display(),
                result.weighted_score,
                ScoreCalculator::rating(result.weighted_score).as_str(),
                result.findings.len()
            );
            println!("{}", serde_json::to_string_pretty(result.as_ref())?);
        }

        Command::Health => {
            let client = ResilientClient::from_config(&config)?;
            log::info!("Checking {}", client.base_url());

            let health = client.health_check().await?;
            log::info!("Status: {} (version {})", health.status, health.version);
            for (name, up) in &health.services {
                log::info!("  {name}: {}", if *up { "up" } else { "down" });
            }
            if !health.is_healthy() {
                return Err(AppError::Connection(format!(
                    "Service reports status '{}'",
                    health.status
                )));
            }
        }

        Command::Presets => {
            for preset in AnalysisPreset::ALL {
                let weights = preset.weights();
                let percentages: Vec<String> = weights
                    .as_percentages()
                    .into_iter()
                    .map(|(category, pct)| format!("{category} {pct}"))
                    .collect();
                println!(
                    "{:<10} {:?}  [{}]",
                    preset.as_str(),
                    weights.distribution_type(),
                    percentages.join(", ")
                );
            }
        }
    }

    Ok(())
}

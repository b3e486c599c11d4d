//! CLI helper functions

use crate::{
    etl::Value,
    replication::{ReplicationReport, TaskState},
    runner::{EtlRunner, RunOptions},
    storage::Input,
};
use eyre::{Context, Result};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

/// Parse a `name=value` parameter
///
/// The value is read as a YAML scalar, so `10` binds as an integer and
/// `EU` as text.
pub fn parse_parameter(arg: &str) -> Result<(String, Value)> {
    let (name, raw) = arg
        .split_once('=')
        .ok_or_else(|| eyre::eyre!("Parameter '{}' is not in name=value form", arg))?;
    let name = name.trim();
    if name.is_empty() {
        eyre::bail!("Parameter '{}' has an empty name", arg);
    }
    let value = serde_yaml::from_str::<Value>(raw).unwrap_or_else(|_| Value::from(raw));
    Ok((name.to_string(), value))
}

/// Run the pipeline of a business type
///
/// Pipeline: configured extractor → configured (or identity) transformer → configured loader
pub async fn run_business_type(
    config_dir: impl AsRef<Path>,
    business_type: &str,
    parameters: &[String],
    override_file: Option<PathBuf>,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<u64> {
    let runner = EtlRunner::from_config_dir(config_dir.as_ref())
        .context("Failed to load connection registry")?;

    let mut options = RunOptions::new();
    for arg in parameters {
        let (name, value) = parse_parameter(arg)?;
        options = options.parameter(name, value);
    }
    options.override_file = override_file;
    options.input = input.map(Input::File);
    options.output = output;

    let result = runner.run(business_type, options).await;
    runner.connections().close_all().await;
    result.with_context(|| format!("Business type '{}' failed", business_type))
}

/// Replicate the tables of a business type
pub async fn replicate_business_type(
    config_dir: impl AsRef<Path>,
    business_type: &str,
    override_file: Option<&Path>,
) -> Result<ReplicationReport> {
    let runner = EtlRunner::from_config_dir(config_dir.as_ref())
        .context("Failed to load connection registry")?;

    let report = runner
        .replicate(business_type, override_file)
        .await
        .with_context(|| format!("Replication of '{}' failed", business_type));

    // Closing waits for every checked-out connection, detached copies included
    let detached = report.as_ref().is_ok_and(|report| {
        report
            .tasks()
            .any(|task| matches!(task.state, TaskState::Incomplete))
    });
    if detached {
        log::warn!("Leaving connections of unfinished copies open");
    } else {
        runner.connections().close_all().await;
    }
    report
}

/// Render the resolved configuration of a business type as YAML
pub fn show_config(
    config_dir: impl AsRef<Path>,
    business_type: &str,
    override_file: Option<&Path>,
) -> Result<String> {
    let resolver = crate::config::ConfigResolver::new(config_dir.as_ref());

    let mut document = serde_yaml::Mapping::new();
    let extract = resolver.extract(business_type, override_file)?;
    document.insert("extract".into(), serde_yaml::to_value(&*extract)?);
    let load = resolver.load(business_type, override_file)?;
    document.insert("load".into(), serde_yaml::to_value(&*load)?);
    if resolver.has_section(business_type, crate::config::Role::Transform, override_file) {
        let transform = resolver.transform(business_type, override_file)?;
        document.insert("transform".into(), serde_yaml::to_value(&*transform)?);
    }

    serde_yaml::to_string(&document).context("Failed to render configuration")
}

/// Print a per-table summary of a replication report
pub fn print_report(report: &ReplicationReport) {
    for task in report.tasks() {
        let name = task.name().to_string();
        match &task.state {
            TaskState::Copied { rows } => {
                println!("  {} {} ({} rows)", "✓".green(), name, rows)
            }
            TaskState::DdlApplied | TaskState::Pending => {
                println!("  {} {} ({})", "✓".green(), name, task.state.label())
            }
            TaskState::Incomplete => {
                println!("  {} {} ({})", "…".yellow(), name, task.state.label())
            }
            TaskState::DdlFailed(e) | TaskState::CopyFailed(e) => {
                println!(
                    "  {} {} ({}: {})",
                    "✗".red(),
                    name,
                    e.kind().red(),
                    e.bright_black()
                )
            }
        }
    }
    println!(
        "{}: {} of {} tables succeeded, {} rows copied",
        report.status().bold(),
        report.succeeded(),
        report.len(),
        report.rows_copied()
    );
}

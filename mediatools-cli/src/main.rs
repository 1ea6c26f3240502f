//! Mediatools CLI
//!
//! Sets up, repairs and diagnoses the external tools used for media
//! download and transcoding.

mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use mediatools_core::external_tools::{DiagnosisReport, TierReport};
use mediatools_core::{DownloadProgress, ProvisionerConfig, ToolId, ToolManager};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays parseable with --json.
    let level = if cli.verbose { "mediatools_core=debug" } else { "mediatools_core=info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(level.parse()?)
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    tracing::debug!("Starting mediatools v{}", mediatools_core::VERSION);

    let config = load_config(&cli)?;
    let manager = ToolManager::new(config).context("Failed to initialize tool manager")?;

    match cli.command {
        Commands::Setup { ref tools } => setup(&manager, tools, cli.json).await,
        Commands::Download { tool } => download(&manager, tool, cli.json).await,
        Commands::Diagnose { tool } => diagnose(&manager, tool, cli.json).await,
        Commands::Which { tool } => which(&manager, tool, cli.json).await,
        Commands::List => list(&manager, cli.json),
    }
}

fn load_config(cli: &Cli) -> Result<ProvisionerConfig> {
    let mut config = match &cli.config {
        Some(path) => ProvisionerConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ProvisionerConfig::default(),
    };

    if let Some(dir) = &cli.bundled_dir {
        config.bundled_dir = dir.clone();
    }
    if let Some(dir) = &cli.user_data_dir {
        config.user_data_dir = dir.clone();
    }

    Ok(config)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report_progress(tool: ToolId, progress: DownloadProgress) {
    match progress.percent {
        Some(percent) => eprint!("\r{}: {:5.1}%", tool, percent),
        None => eprint!("\r{}: {} bytes", tool, progress.bytes_downloaded),
    }
}

async fn setup(manager: &ToolManager, tools: &[ToolId], json: bool) -> Result<()> {
    let tools = if tools.is_empty() { ToolId::all() } else { tools };

    let results = manager.setup_all(tools, report_progress).await;
    eprintln!();

    if json {
        print_json(&results)?;
    } else {
        for (tool, status) in &results {
            println!("{:<8} {}", tool.as_str(), status);
        }
    }

    let failed: Vec<&str> = results
        .iter()
        .filter(|(_, status)| !status.is_ready())
        .map(|(tool, _)| tool.as_str())
        .collect();
    if !failed.is_empty() {
        for (tool, _) in results.iter().filter(|(_, status)| !status.is_ready()) {
            match manager.diagnose(*tool).await {
                Ok(report) => {
                    for issue in &report.issues {
                        tracing::warn!(tool = %tool, "{}", issue);
                    }
                }
                Err(e) => tracing::warn!(tool = %tool, error = %e, "Diagnosis failed"),
            }
        }
        bail!("Setup failed for: {}", failed.join(", "));
    }
    Ok(())
}

async fn download(manager: &ToolManager, tool: ToolId, json: bool) -> Result<()> {
    let path = manager
        .download_tool(tool, |progress| report_progress(tool, progress))
        .await
        .with_context(|| format!("Failed to download {}", tool.display_name()))?;
    eprintln!();

    if json {
        print_json(&serde_json::json!({ "tool": tool, "path": path }))
    } else {
        println!("{}", path.display());
        Ok(())
    }
}

async fn diagnose(manager: &ToolManager, tool: ToolId, json: bool) -> Result<()> {
    let report = manager
        .diagnose(tool)
        .await
        .with_context(|| format!("Failed to diagnose {}", tool.display_name()))?;

    if json {
        return print_json(&report);
    }

    print_report(&report);
    Ok(())
}

fn print_report(report: &DiagnosisReport) {
    println!(
        "{} on {} ({})",
        report.tool.display_name(),
        report.platform,
        report.generated_at.to_rfc3339()
    );
    println!(
        "  bundled dir: {} ({})",
        report.bundled_dir.display(),
        if report.bundled_dir_exists { "exists" } else { "missing" }
    );
    println!(
        "  user bin dir: {} ({})",
        report.user_bin_dir.display(),
        if report.user_bin_dir_exists { "exists" } else { "missing" }
    );
    for tier in [&report.bundled, &report.user, &report.system] {
        print_tier(tier);
    }

    if !report.issues.is_empty() {
        println!("Issues:");
        for issue in &report.issues {
            println!("  - {}", issue);
        }
    }
    if !report.recommendations.is_empty() {
        println!("Recommendations:");
        for recommendation in &report.recommendations {
            println!("  - {}", recommendation);
        }
    }
}

fn print_tier(tier: &TierReport) {
    let size = tier
        .size_bytes
        .map(|s| format!("{} bytes", s))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  {:<8} {} [{}] size: {}",
        tier.tier.as_str(),
        tier.location.display(),
        tier.state,
        size
    );
}

async fn which(manager: &ToolManager, tool: ToolId, json: bool) -> Result<()> {
    let Some(resolved) = manager.resolve_executable(tool).await else {
        bail!(
            "{} is not available; run `mediatools setup {}`",
            tool.display_name(),
            tool
        );
    };

    if json {
        print_json(&resolved)
    } else {
        println!("{}\t{}", resolved.tier, resolved.path.display());
        Ok(())
    }
}

fn list(manager: &ToolManager, json: bool) -> Result<()> {
    let Some(platform) = manager.platform() else {
        bail!("Unsupported operating system: {}", std::env::consts::OS);
    };

    let entries: Vec<_> = manager
        .registry()
        .tools_for(platform.os)
        .into_iter()
        .filter_map(|tool| manager.registry().get(tool, platform.os).map(|spec| (tool, spec)))
        .collect();

    if json {
        let value: Vec<_> = entries
            .iter()
            .map(|(tool, spec)| serde_json::json!({ "tool": tool, "spec": spec }))
            .collect();
        return print_json(&value);
    }

    println!("Tools for {}:", platform);
    for (tool, spec) in entries {
        let kind = match spec.archive {
            Some(format) => format!("{:?} archive", format),
            None => "binary".to_string(),
        };
        println!("{} -> {} ({})", tool.display_name(), spec.filename, kind);
        for url in &spec.mirror_urls {
            println!("    {}", url);
        }
    }
    Ok(())
}

//! Read-only diagnosis of a tool's install state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::availability::{check_usability, Usability};
use super::error::ProvisionError;
use super::manager::ToolManager;
use super::types::{Platform, Tier, ToolId};

/// What was found at one tier's location.
#[derive(Debug, Clone, Serialize)]
pub struct TierReport {
    pub tier: Tier,
    /// File path for bundled/user; resolved PATH hit (or the bare command
    /// name when absent) for system.
    pub location: PathBuf,
    pub exists: bool,
    pub size_bytes: Option<u64>,
    pub permissions_ok: bool,
    pub usable: bool,
    pub state: Usability,
}

/// Structured diagnosis of a single tool.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisReport {
    pub tool: ToolId,
    pub platform: Platform,
    pub generated_at: DateTime<Utc>,
    pub bundled_dir: PathBuf,
    pub user_bin_dir: PathBuf,
    pub bundled_dir_exists: bool,
    pub user_bin_dir_exists: bool,
    pub bundled: TierReport,
    pub user: TierReport,
    pub system: TierReport,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

impl DiagnosisReport {
    pub fn bundled_tool_exists(&self) -> bool {
        self.bundled.exists
    }

    pub fn user_tool_exists(&self) -> bool {
        self.user.exists
    }

    pub fn system_tool_available(&self) -> bool {
        self.system.exists
    }

    /// Whether any tier currently holds a usable copy.
    pub fn any_usable(&self) -> bool {
        self.bundled.usable || self.user.usable || self.system.usable
    }

    fn issue(&mut self, message: String) {
        self.issues.push(message);
    }

    fn recommend(&mut self, message: String) {
        if !self.recommendations.contains(&message) {
            self.recommendations.push(message);
        }
    }
}

impl ToolManager {
    /// Inspects every tier for `tool` without modifying anything.
    ///
    /// A download in progress for the same tool may be observed mid-write
    /// and reported as a zero-byte or partial file.
    pub async fn diagnose(&self, tool: ToolId) -> Result<DiagnosisReport, ProvisionError> {
        let platform = self
            .platform()
            .ok_or_else(|| ProvisionError::unsupported(tool, None))?;
        let locations = self
            .resolve(tool)
            .ok_or_else(|| ProvisionError::unsupported(tool, Some(platform.os)))?;

        let bundled_dir = self.paths().bundled_dir().to_path_buf();
        let user_bin_dir = self.paths().user_bin_dir().to_path_buf();

        let system = match self.system_lookup().find(tool.as_str()) {
            Some(found) => inspect(Tier::System, found).await,
            None => TierReport {
                tier: Tier::System,
                location: PathBuf::from(tool.as_str()),
                exists: false,
                size_bytes: None,
                permissions_ok: false,
                usable: false,
                state: Usability::Missing,
            },
        };

        let mut report = DiagnosisReport {
            tool,
            platform,
            generated_at: Utc::now(),
            bundled_dir_exists: dir_exists(&bundled_dir).await,
            user_bin_dir_exists: dir_exists(&user_bin_dir).await,
            bundled_dir,
            user_bin_dir,
            bundled: inspect(Tier::Bundled, locations.bundled_path).await,
            user: inspect(Tier::User, locations.user_path).await,
            system,
            issues: Vec::new(),
            recommendations: Vec::new(),
        };

        if !report.bundled_dir_exists {
            let message = format!(
                "Bundled bin directory does not exist: {}",
                report.bundled_dir.display()
            );
            report.issue(message);
        }
        if !report.user_bin_dir_exists {
            let message = format!(
                "User bin directory does not exist: {}",
                report.user_bin_dir.display()
            );
            report.issue(message);
            report.recommend("Run setup to recreate the user bin directory".to_string());
        }

        let bundled = report.bundled.clone();
        let user = report.user.clone();
        note_file_issues(&mut report, &bundled);
        note_file_issues(&mut report, &user);

        if !report.system.exists {
            let message = format!("{} was not found on the system PATH", tool.display_name());
            report.issue(message);
        }

        if !report.any_usable() {
            let message = format!(
                "{} is not usable from any location. Force a re-download (`mediatools download {}`) and try again",
                tool.display_name(),
                tool
            );
            report.recommend(message);
        }

        Ok(report)
    }
}

async fn dir_exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

async fn inspect(tier: Tier, location: PathBuf) -> TierReport {
    let metadata = tokio::fs::metadata(&location).await.ok();
    let state = check_usability(&location).await;

    let exists = metadata.is_some();

    TierReport {
        tier,
        exists,
        size_bytes: metadata.map(|m| m.len()),
        permissions_ok: exists && !state.is_permission_problem(),
        usable: state.is_usable(),
        state,
        location,
    }
}

fn note_file_issues(report: &mut DiagnosisReport, tier: &TierReport) {
    let label = match tier.tier {
        Tier::Bundled => "Bundled",
        Tier::User => "User",
        Tier::System => "System",
    };
    let name = report.tool.display_name();
    let path = tier.location.display().to_string();

    match tier.state {
        Usability::Usable => {}
        Usability::Missing => {
            report.issue(format!("{} {} not found at {}", label, name, path));
        }
        Usability::NotAFile => {
            report.issue(format!("{} {} at {} is not a regular file", label, name, path));
            report.recommend(format!("Remove {} so the tool can be reinstalled", path));
        }
        state if state.is_corrupt() => {
            report.issue(format!("{} {} looks corrupted: {} ({})", label, name, state, path));
            report.recommend(format!(
                "Delete the corrupted file at {} and download {} again",
                path, name
            ));
        }
        Usability::Unreadable | Usability::NotExecutable => {
            report.issue(format!("{} {}: {} ({})", label, name, tier.state, path));
            if cfg!(unix) {
                report.recommend(format!("Run `chmod +x {}` or download {} again", path, name));
            } else {
                report.recommend(
                    "Check that antivirus software is not blocking the executable".to_string(),
                );
            }
        }
        _ => {}
    }
}

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Workflow status as reported by CircleCI.
///
/// Decoding is total: any value CircleCI adds later lands on `Unknown`
/// instead of failing the whole response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum BuildStatus {
    Success,
    Running,
    NotRun,
    Failed,
    Error,
    Failing,
    OnHold,
    Canceled,
    Unknown,
}

impl BuildStatus {
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "success" => Self::Success,
            "running" => Self::Running,
            "not_run" => Self::NotRun,
            "failed" => Self::Failed,
            "error" => Self::Error,
            "failing" => Self::Failing,
            "on_hold" => Self::OnHold,
            "canceled" => Self::Canceled,
            _ => Self::Unknown,
        }
    }

    /// The wire spelling of this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Running => "running",
            Self::NotRun => "not_run",
            Self::Failed => "failed",
            Self::Error => "error",
            Self::Failing => "failing",
            Self::OnHold => "on_hold",
            Self::Canceled => "canceled",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_running(self) -> bool {
        self == Self::Running
    }
}

impl From<String> for BuildStatus {
    fn from(raw: String) -> Self {
        Self::from_raw(&raw)
    }
}

/// Identity of a build within one poll result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildKey {
    pub project_slug: String,
    pub branch: String,
    pub workflow_name: String,
}

/// Timing of a build: frozen for finished work, live for running work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BuildTiming {
    Completed { duration_secs: i64 },
    Running { started_at: DateTime<Utc> },
}

/// One workflow's current status, keyed by project, branch and workflow name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildView {
    pub project_slug: String,
    pub project_name: String,
    pub branch: String,
    pub workflow_name: String,
    pub pipeline_number: u64,
    pub status: BuildStatus,
    pub web_url: String,
    pub timing: BuildTiming,
}

impl BuildView {
    pub fn key(&self) -> BuildKey {
        BuildKey {
            project_slug: self.project_slug.clone(),
            branch: self.branch.clone(),
            workflow_name: self.workflow_name.clone(),
        }
    }

    pub fn completed_duration(&self) -> Option<Duration> {
        match self.timing {
            BuildTiming::Completed { duration_secs } => Some(Duration::seconds(duration_secs)),
            BuildTiming::Running { .. } => None,
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match self.timing {
            BuildTiming::Running { started_at } => Some(started_at),
            BuildTiming::Completed { .. } => None,
        }
    }

    /// Duration to display at `now`: frozen when completed, elapsed when running.
    pub fn display_duration(&self, now: DateTime<Utc>) -> Duration {
        match self.timing {
            BuildTiming::Completed { duration_secs } => Duration::seconds(duration_secs),
            BuildTiming::Running { started_at } => now - started_at,
        }
    }
}

/// `gh/acme/web` -> `acme/web`. Slugs without a provider prefix are returned as-is.
pub fn project_name(project_slug: &str) -> String {
    match project_slug.split_once('/') {
        Some((_, rest)) if rest.contains('/') => rest.to_string(),
        _ => project_slug.to_string(),
    }
}

pub fn web_url(project_slug: &str, pipeline_number: u64) -> String {
    format!("https://app.circleci.com/pipelines/{project_slug}/{pipeline_number}")
}

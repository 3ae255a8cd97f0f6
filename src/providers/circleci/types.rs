use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::builds::{project_name, BuildStatus};

/// Branch recorded for pipelines whose trigger carried no VCS information.
pub const UNKNOWN_BRANCH: &str = "unknown";

/// One page of a cursor-paginated CircleCI listing.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    /// The cursor for the next request, if there is one.
    pub fn next_token(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// An organization scope used to filter the pipeline listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrgScope(String);

impl OrgScope {
    pub fn new(slug: impl Into<String>) -> Self {
        Self(slug.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// An organization returned by `GET /me/collaborations`.
#[derive(Debug, Clone, Deserialize)]
pub struct Collaboration {
    pub slug: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub vcs_type: Option<String>,
}

/// The authenticated user returned by `GET /me`.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A triggered run of a project's configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "PipelinePayload")]
pub struct PipelineRecord {
    pub id: String,
    /// `<vcs>/<org>/<repo>`, e.g. `gh/acme/web`
    pub project_slug: String,
    pub branch: String,
    pub created_at: DateTime<Utc>,
    pub number: u64,
}

impl PipelineRecord {
    pub fn project_name(&self) -> String {
        project_name(&self.project_slug)
    }
}

#[derive(Deserialize)]
struct PipelinePayload {
    id: String,
    project_slug: String,
    number: u64,
    #[serde(with = "timestamp")]
    created_at: DateTime<Utc>,
    #[serde(default)]
    vcs: Option<VcsPayload>,
}

#[derive(Deserialize)]
struct VcsPayload {
    #[serde(default)]
    branch: Option<String>,
}

impl From<PipelinePayload> for PipelineRecord {
    fn from(payload: PipelinePayload) -> Self {
        let branch = payload
            .vcs
            .and_then(|vcs| vcs.branch)
            .unwrap_or_else(|| UNKNOWN_BRANCH.to_string());

        Self {
            id: payload.id,
            project_slug: payload.project_slug,
            branch,
            created_at: payload.created_at,
            number: payload.number,
        }
    }
}

/// A named execution graph within a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkflowRecord {
    pub id: String,
    pub name: String,
    pub status: BuildStatus,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// Absent while the workflow is still going.
    #[serde(default, with = "timestamp::option")]
    pub stopped_at: Option<DateTime<Utc>>,
    pub pipeline_id: String,
}

/// ISO-8601 timestamps as CircleCI sends them.
///
/// Fractional seconds are tried first, then the plain form. Zone-less values
/// are read as UTC.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    const ZONELESS_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"];

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }

        let trimmed = raw.trim_end_matches('Z');
        ZONELESS_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
            .map(|naive| naive.and_utc())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer};

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => super::parse(&raw).map(Some).ok_or_else(|| {
                    serde::de::Error::custom(format!("invalid timestamp: {raw}"))
                }),
                None => Ok(None),
            }
        }
    }
}

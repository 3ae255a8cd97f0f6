//! In-memory `CircleApi` used by the pipeline tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Semaphore;

use super::api::CircleApi;
use super::types::{Collaboration, Page, PipelineRecord, WorkflowRecord};
use crate::builds::BuildStatus;
use crate::error::{CircleError, Result};

#[derive(Default)]
pub struct FakeCircle {
    collaborations: Option<Vec<String>>,
    collaborations_error: Option<u16>,
    pipeline_pages: HashMap<String, Vec<Page<PipelineRecord>>>,
    pipeline_errors: HashMap<String, u16>,
    workflow_pages: HashMap<String, Vec<Page<WorkflowRecord>>>,
    workflow_errors: HashMap<String, u16>,
    workflow_gate: Option<Arc<Semaphore>>,
    pub collaboration_requests: AtomicUsize,
    pub pipeline_page_requests: AtomicUsize,
    pub workflow_requests: Mutex<Vec<String>>,
}

impl FakeCircle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collaborations(mut self, slugs: &[&str]) -> Self {
        self.collaborations = Some(slugs.iter().map(ToString::to_string).collect());
        self
    }

    pub fn with_collaborations_error(mut self, status: u16) -> Self {
        self.collaborations_error = Some(status);
        self
    }

    /// Pages are served in order; each page links to the next one.
    pub fn with_pipeline_pages(mut self, org: &str, pages: Vec<Vec<PipelineRecord>>) -> Self {
        self.pipeline_pages
            .insert(org.to_string(), linked_pages(org, pages));
        self
    }

    pub fn with_pipeline_error(mut self, org: &str, status: u16) -> Self {
        self.pipeline_errors.insert(org.to_string(), status);
        self
    }

    pub fn with_workflows(self, pipeline_id: &str, workflows: Vec<WorkflowRecord>) -> Self {
        self.with_workflow_pages(pipeline_id, vec![workflows])
    }

    pub fn with_workflow_pages(
        mut self,
        pipeline_id: &str,
        pages: Vec<Vec<WorkflowRecord>>,
    ) -> Self {
        self.workflow_pages
            .insert(pipeline_id.to_string(), linked_pages(pipeline_id, pages));
        self
    }

    /// Every workflow request waits for a permit from `gate` before answering.
    pub fn with_workflow_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.workflow_gate = Some(gate);
        self
    }

    pub fn with_workflow_error(mut self, pipeline_id: &str, status: u16) -> Self {
        self.workflow_errors.insert(pipeline_id.to_string(), status);
        self
    }

    pub fn requested_workflows(&self) -> Vec<String> {
        self.workflow_requests.lock().unwrap().clone()
    }
}

fn linked_pages<T>(owner: &str, pages: Vec<Vec<T>>) -> Vec<Page<T>> {
    let count = pages.len();
    pages
        .into_iter()
        .enumerate()
        .map(|(index, items)| Page {
            items,
            next_page_token: (index + 1 < count).then(|| format!("{owner}#{}", index + 1)),
        })
        .collect()
}

fn page_index(page_token: Option<&str>) -> usize {
    page_token
        .and_then(|token| token.rsplit('#').next())
        .and_then(|index| index.parse::<usize>().ok())
        .unwrap_or(0)
}

fn error_for(status: u16) -> CircleError {
    match status {
        401 => CircleError::Unauthorized,
        429 => CircleError::RateLimited,
        other => CircleError::HttpError(other),
    }
}

impl CircleApi for FakeCircle {
    async fn collaborations(&self) -> Result<Vec<Collaboration>> {
        self.collaboration_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.collaborations_error {
            return Err(error_for(status));
        }
        Ok(self
            .collaborations
            .clone()
            .unwrap_or_default()
            .into_iter()
            .map(|slug| Collaboration {
                slug,
                name: None,
                vcs_type: None,
            })
            .collect())
    }

    async fn pipelines_page(
        &self,
        org_slug: &str,
        page_token: Option<&str>,
    ) -> Result<Page<PipelineRecord>> {
        self.pipeline_page_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.pipeline_errors.get(org_slug) {
            return Err(error_for(*status));
        }

        Ok(self
            .pipeline_pages
            .get(org_slug)
            .and_then(|pages| pages.get(page_index(page_token)))
            .cloned()
            .unwrap_or(Page {
                items: Vec::new(),
                next_page_token: None,
            }))
    }

    async fn workflows_page(
        &self,
        pipeline_id: &str,
        page_token: Option<&str>,
    ) -> Result<Page<WorkflowRecord>> {
        self.workflow_requests
            .lock()
            .unwrap()
            .push(pipeline_id.to_string());
        if let Some(gate) = &self.workflow_gate {
            let _permit = gate.acquire().await.unwrap();
        }
        if let Some(status) = self.workflow_errors.get(pipeline_id) {
            return Err(error_for(*status));
        }
        Ok(self
            .workflow_pages
            .get(pipeline_id)
            .and_then(|pages| pages.get(page_index(page_token)))
            .cloned()
            .unwrap_or(Page {
                items: Vec::new(),
                next_page_token: None,
            }))
    }
}

pub fn pipeline(
    id: &str,
    project_slug: &str,
    branch: &str,
    created_at: DateTime<Utc>,
) -> PipelineRecord {
    PipelineRecord {
        id: id.to_string(),
        project_slug: project_slug.to_string(),
        branch: branch.to_string(),
        created_at,
        number: id.trim_start_matches(|c: char| !c.is_ascii_digit()).parse().unwrap_or(1),
    }
}

pub fn workflow(
    id: &str,
    pipeline_id: &str,
    name: &str,
    status: BuildStatus,
    created_at: DateTime<Utc>,
) -> WorkflowRecord {
    let stopped_at = (!status.is_running()).then(|| created_at + Duration::minutes(5));
    WorkflowRecord {
        id: id.to_string(),
        name: name.to_string(),
        status,
        created_at,
        stopped_at,
        pipeline_id: pipeline_id.to_string(),
    }
}

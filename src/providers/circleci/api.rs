use std::future::Future;

use super::client::CircleCiClient;
use super::types::{Collaboration, Page, PipelineRecord, WorkflowRecord};
use crate::error::Result;

/// The upstream listing endpoints the build pipeline consumes.
///
/// Implemented by [`CircleCiClient`]; tests swap in in-memory fixtures.
pub trait CircleApi: Send + Sync {
    fn collaborations(&self) -> impl Future<Output = Result<Vec<Collaboration>>> + Send;

    fn pipelines_page(
        &self,
        org_slug: &str,
        page_token: Option<&str>,
    ) -> impl Future<Output = Result<Page<PipelineRecord>>> + Send;

    fn workflows_page(
        &self,
        pipeline_id: &str,
        page_token: Option<&str>,
    ) -> impl Future<Output = Result<Page<WorkflowRecord>>> + Send;
}

impl CircleApi for CircleCiClient {
    async fn collaborations(&self) -> Result<Vec<Collaboration>> {
        self.fetch_collaborations().await
    }

    async fn pipelines_page(
        &self,
        org_slug: &str,
        page_token: Option<&str>,
    ) -> Result<Page<PipelineRecord>> {
        self.fetch_pipelines_page(org_slug, page_token).await
    }

    async fn workflows_page(
        &self,
        pipeline_id: &str,
        page_token: Option<&str>,
    ) -> Result<Page<WorkflowRecord>> {
        self.fetch_workflows_page(pipeline_id, page_token).await
    }
}

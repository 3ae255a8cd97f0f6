use super::core::CircleCiClient;
use crate::error::Result;
use crate::providers::circleci::types::{Page, WorkflowRecord};

impl CircleCiClient {
    /// `GET /pipeline/{id}/workflow[?page-token=<cursor>]`
    pub async fn fetch_workflows_page(
        &self,
        pipeline_id: &str,
        page_token: Option<&str>,
    ) -> Result<Page<WorkflowRecord>> {
        let path = format!("pipeline/{pipeline_id}/workflow");
        match page_token {
            Some(token) => self.get_json(&path, &[("page-token", token)]).await,
            None => self.get_json(&path, &[]).await,
        }
    }
}

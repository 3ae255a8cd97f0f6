use super::core::CircleCiClient;
use crate::error::Result;
use crate::providers::circleci::types::{Page, PipelineRecord};

impl CircleCiClient {
    /// `GET /pipeline?org-slug=<slug>&mine=true[&page-token=<cursor>]`
    ///
    /// Items come back newest first.
    pub async fn fetch_pipelines_page(
        &self,
        org_slug: &str,
        page_token: Option<&str>,
    ) -> Result<Page<PipelineRecord>> {
        let mut query = vec![("org-slug", org_slug), ("mine", "true")];
        if let Some(token) = page_token {
            query.push(("page-token", token));
        }

        self.get_json("pipeline", &query).await
    }
}

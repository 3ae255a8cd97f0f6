use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{info, warn};

use super::aggregator::aggregate_workflows;
use super::api::CircleApi;
use super::assembler::assemble_builds;
use super::client::CircleCiClient;
use super::dedup::dedupe_pipelines;
use super::organizations::resolve_org_scopes;
use super::pagination::fetch_pipelines_for_scopes;
use crate::builds::BuildView;
use crate::config::CycleConfig;
use crate::error::Result;

/// CircleCI build provider.
///
/// Reduces the append-only pipeline listing into the short list of builds
/// worth showing: newest pipeline per project and branch, newest workflow per
/// name, all running builds plus a capped number of finished ones.
pub struct CircleCiProvider<A = CircleCiClient> {
    api: Arc<A>,
}

impl<A> Clone for CircleCiProvider<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
        }
    }
}

impl<A: CircleApi> CircleCiProvider<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Runs one poll cycle against the current time.
    ///
    /// # Errors
    ///
    /// Only organization discovery is fatal. Failures for a single
    /// organization or pipeline are logged and leave a partial result.
    pub async fn collect_builds(
        &self,
        config: &CycleConfig,
        progress: &(dyn Fn(usize) + Send + Sync),
    ) -> Result<Vec<BuildView>> {
        self.collect_builds_at(config, Utc::now(), progress).await
    }

    pub async fn collect_builds_at(
        &self,
        config: &CycleConfig,
        now: DateTime<Utc>,
        progress: &(dyn Fn(usize) + Send + Sync),
    ) -> Result<Vec<BuildView>> {
        let api = self.api.as_ref();

        let scopes = resolve_org_scopes(api, config.organization.as_deref()).await?;
        if scopes.is_empty() {
            warn!("No organizations to watch");
        }

        let pipelines =
            fetch_pipelines_for_scopes(api, &scopes, config.max_pipeline_age, now).await;
        let pipelines = dedupe_pipelines(pipelines);
        info!(
            "Fetched {} pipelines across {} organizations",
            pipelines.len(),
            scopes.len()
        );

        let partitioned = aggregate_workflows(api, &pipelines, config, now, progress).await;
        let builds = assemble_builds(partitioned);
        info!("Collected {} builds", builds.len());

        Ok(builds)
    }
}

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use log::{debug, warn};

use super::api::CircleApi;
use super::types::{PipelineRecord, WorkflowRecord};
use crate::builds::{web_url, BuildKey, BuildStatus, BuildTiming, BuildView};
use crate::config::CycleConfig;
use crate::error::Result;

/// Builds of one cycle, split by whether they are still running.
#[derive(Debug, Default)]
pub struct PartitionedBuilds {
    pub running: Vec<BuildView>,
    pub other: Vec<BuildView>,
}

/// Turns recency-sorted pipelines into builds.
///
/// Pipelines are visited newest first. Once `max_displayed_non_running`
/// finished builds are collected, the first pipeline older than the recency
/// window ends the walk. Workflows are fetched `workflow_fetch_batch` pipelines
/// at a time; results past the stopping point are discarded.
///
/// The first occurrence of a (project, branch, workflow) key wins. Running
/// builds are always kept; finished builds past the cap are dropped, never
/// swapped for later ones.
pub async fn aggregate_workflows<A: CircleApi>(
    api: &A,
    pipelines: &[PipelineRecord],
    config: &CycleConfig,
    now: DateTime<Utc>,
    progress: &(dyn Fn(usize) + Send + Sync),
) -> PartitionedBuilds {
    let recency_cutoff = now - config.workflow_recency_window;
    let cap = config.max_displayed_non_running;
    let mut seen: HashSet<BuildKey> = HashSet::new();
    let mut builds = PartitionedBuilds::default();
    let mut fetched = 0;

    'pipelines: for batch in pipelines.chunks(config.workflow_fetch_batch.max(1)) {
        if past_stop(&builds, &batch[0], cap, recency_cutoff) {
            break;
        }

        let results = futures::future::join_all(
            batch
                .iter()
                .map(|pipeline| fetch_all_workflows(api, &pipeline.id)),
        )
        .await;

        for (pipeline, result) in batch.iter().zip(results) {
            if past_stop(&builds, pipeline, cap, recency_cutoff) {
                debug!("Stopped after {fetched} of {} pipelines", pipelines.len());
                break 'pipelines;
            }

            fetched += 1;
            progress(fetched);

            let workflows = match result {
                Ok(workflows) => workflows,
                Err(e) => {
                    warn!("Skipping pipeline {} ({}): {e}", pipeline.number, pipeline.project_slug);
                    continue;
                }
            };

            for workflow in workflows {
                if workflow.created_at < recency_cutoff {
                    continue;
                }

                let key = BuildKey {
                    project_slug: pipeline.project_slug.clone(),
                    branch: pipeline.branch.clone(),
                    workflow_name: workflow.name.clone(),
                };
                if !seen.insert(key) {
                    debug!(
                        "Workflow {} of pipeline {} shadowed by a newer run",
                        workflow.id, workflow.pipeline_id
                    );
                    continue;
                }

                let build = classify(pipeline, &workflow, now);
                if build.status.is_running() {
                    builds.running.push(build);
                } else if builds.other.len() < cap {
                    builds.other.push(build);
                }
            }
        }
    }

    builds
}

/// Finished builds are capped and this pipeline is older than the recency
/// window. Every later pipeline is older still, so nothing after it matters.
fn past_stop(
    builds: &PartitionedBuilds,
    pipeline: &PipelineRecord,
    cap: usize,
    recency_cutoff: DateTime<Utc>,
) -> bool {
    builds.other.len() >= cap && pipeline.created_at < recency_cutoff
}

async fn fetch_all_workflows<A: CircleApi>(
    api: &A,
    pipeline_id: &str,
) -> Result<Vec<WorkflowRecord>> {
    let mut workflows = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = api.workflows_page(pipeline_id, page_token.as_deref()).await?;
        let next = page.next_token().map(ToString::to_string);
        workflows.extend(page.items);

        match next {
            Some(token) => page_token = Some(token),
            None => return Ok(workflows),
        }
    }
}

/// Projects a workflow of `pipeline` into the build shown to the user.
pub fn classify(
    pipeline: &PipelineRecord,
    workflow: &WorkflowRecord,
    now: DateTime<Utc>,
) -> BuildView {
    let timing = if workflow.status == BuildStatus::Running {
        BuildTiming::Running {
            started_at: workflow.created_at,
        }
    } else {
        let end = workflow.stopped_at.unwrap_or(now);
        BuildTiming::Completed {
            duration_secs: (end - workflow.created_at).num_seconds().max(0),
        }
    };

    BuildView {
        project_slug: pipeline.project_slug.clone(),
        project_name: pipeline.project_name(),
        branch: pipeline.branch.clone(),
        workflow_name: workflow.name.clone(),
        pipeline_number: pipeline.number,
        status: workflow.status,
        web_url: web_url(&pipeline.project_slug, pipeline.number),
        timing,
    }
}

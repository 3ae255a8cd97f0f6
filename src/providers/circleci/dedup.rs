use std::collections::hash_map::Entry;
use std::collections::HashMap;

use super::types::PipelineRecord;

/// Keeps the newest pipeline per (project, branch), newest first.
///
/// The workflow stage relies on this order to stop early.
pub fn dedupe_pipelines(pipelines: Vec<PipelineRecord>) -> Vec<PipelineRecord> {
    let mut latest: HashMap<(String, String), PipelineRecord> = HashMap::new();

    for pipeline in pipelines {
        let key = (pipeline.project_slug.clone(), pipeline.branch.clone());
        match latest.entry(key) {
            Entry::Occupied(mut entry) => {
                if pipeline.created_at > entry.get().created_at {
                    entry.insert(pipeline);
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(pipeline);
            }
        }
    }

    let mut deduped: Vec<PipelineRecord> = latest.into_values().collect();
    deduped.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.project_slug.cmp(&b.project_slug))
            .then_with(|| a.branch.cmp(&b.branch))
    });
    deduped
}

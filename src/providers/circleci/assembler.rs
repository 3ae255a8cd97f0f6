use std::collections::HashMap;

use log::debug;
use serde::Serialize;

use super::aggregator::PartitionedBuilds;
use crate::builds::{BuildKey, BuildStatus, BuildView};

/// Running builds first, then the rest; each group ordered by
/// (project name, branch, workflow name).
pub fn assemble_builds(partitioned: PartitionedBuilds) -> Vec<BuildView> {
    let PartitionedBuilds {
        mut running,
        mut other,
    } = partitioned;

    sort_for_display(&mut running);
    sort_for_display(&mut other);

    running.extend(other);
    running
}

pub fn sort_for_display(builds: &mut [BuildView]) {
    builds.sort_by(|a, b| {
        (
            a.project_name.as_str(),
            a.branch.as_str(),
            a.workflow_name.as_str(),
            a.project_slug.as_str(),
        )
            .cmp(&(
                b.project_name.as_str(),
                b.branch.as_str(),
                b.workflow_name.as_str(),
                b.project_slug.as_str(),
            ))
    });
}

/// Builds that started or finished between two published cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Transitions {
    pub started: Vec<BuildView>,
    pub finished: Vec<BuildView>,
}

impl Transitions {
    pub fn is_empty(&self) -> bool {
        self.started.is_empty() && self.finished.is_empty()
    }
}

/// Remembers the statuses of the last published cycle.
#[derive(Debug, Default)]
pub struct TransitionTracker {
    previous: HashMap<BuildKey, BuildStatus>,
    primed: bool,
}

impl TransitionTracker {
    /// Compares `builds` with the previous cycle and then replaces it wholesale.
    ///
    /// The first call only records statuses. After that, a key missing from
    /// the previous cycle counts as not running.
    pub fn observe(&mut self, builds: &[BuildView]) -> Transitions {
        let mut transitions = Transitions::default();

        if self.primed {
            for build in builds {
                let was_running = self.previous.get(&build.key()) == Some(&BuildStatus::Running);
                let is_running = build.status.is_running();

                if was_running != is_running {
                    debug!(
                        "{} [{}] {} is now {}",
                        build.project_slug,
                        build.branch,
                        build.workflow_name,
                        build.status.as_str()
                    );
                }

                if !was_running && is_running {
                    transitions.started.push(build.clone());
                } else if was_running && !is_running {
                    transitions.finished.push(build.clone());
                }
            }
        }

        self.previous = builds
            .iter()
            .map(|build| (build.key(), build.status))
            .collect();
        self.primed = true;

        transitions
    }
}

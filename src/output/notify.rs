use super::styling::{cyan, dim, styled_status};
use super::tables::format_duration;
use crate::builds::BuildView;
use crate::providers::circleci::Transitions;

/// One line per started or finished build.
pub fn transition_lines(transitions: &Transitions) -> Vec<String> {
    let started = transitions.started.iter().map(|build| {
        let since = build
            .started_at()
            .map(|at| format!(" at {}", at.format("%H:%M:%S")))
            .unwrap_or_default();
        format!("{} {} started{}", cyan("▶"), describe(build), dim(since))
    });

    let finished = transitions.finished.iter().map(|build| {
        let took = build
            .completed_duration()
            .map(|d| format!(" in {}", format_duration(d)))
            .unwrap_or_default();
        format!(
            "{} {} finished: {}{}",
            cyan("■"),
            describe(build),
            styled_status(build.status),
            dim(took)
        )
    });

    started.chain(finished).collect()
}

/// Prints transition lines to stderr so they never mix with exported output.
pub fn print_transitions(transitions: &Transitions) {
    for line in transition_lines(transitions) {
        eprintln!("{line}");
    }
}

fn describe(build: &BuildView) -> String {
    format!(
        "{} [{}] {}",
        build.project_name, build.branch, build.workflow_name
    )
}

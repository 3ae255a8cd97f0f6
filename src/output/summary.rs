use std::fmt::Write;

use chrono::{DateTime, Utc};
use comfy_table::{Cell, Color as TableColor};

use super::status::worst_status;
use super::styling::{bright, bright_yellow, cyan, dim, styled_status};
use super::tables::{create_table, format_duration, status_cell};
use crate::builds::{BuildStatus, BuildView};

/// Prints the current builds as a table to stdout.
///
/// Running builds come first and show elapsed time; finished builds show
/// their frozen duration. The headline carries the worst status in the list.
pub fn print_builds(builds: &[BuildView], now: DateTime<Utc>) {
    println!("{}", render_builds(builds, now));
}

fn create_cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

fn headline(status: BuildStatus, count: usize) -> String {
    format!(
        "{} {} across {} builds",
        bright("Overall:"),
        styled_status(status),
        cyan(count)
    )
}

pub fn render_builds(builds: &[BuildView], now: DateTime<Utc>) -> String {
    let mut output = String::new();

    if builds.is_empty() {
        let _ = writeln!(
            output,
            "{}",
            bright_yellow("No recent builds found for your organizations.")
        );
        return output;
    }

    let overall = worst_status(builds.iter().map(|build| build.status));
    let _ = writeln!(output, "{}\n", headline(overall, builds.len()));

    let mut table = create_table();
    table.set_header(create_cyan_header(&[
        "Status", "Project", "Branch", "Workflow", "Pipeline", "Duration", "Link",
    ]));

    for build in builds {
        let duration = format_duration(build.display_duration(now));
        let duration = if build.status.is_running() {
            format!("{duration} so far")
        } else {
            duration
        };

        table.add_row(vec![
            status_cell(build.status),
            Cell::new(&build.project_name),
            Cell::new(&build.branch),
            Cell::new(&build.workflow_name),
            Cell::new(format!("#{}", build.pipeline_number)),
            Cell::new(duration),
            Cell::new(&build.web_url).fg(TableColor::DarkGrey),
        ]);
    }

    let _ = writeln!(output, "{table}");
    let _ = writeln!(
        output,
        "{}",
        dim(format!("Updated {}", now.format("%H:%M:%S UTC")))
    );
    output
}

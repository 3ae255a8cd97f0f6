mod exports;
mod notify;
mod progress;
mod status;
mod styling;
mod summary;
mod tables;

pub use exports::export_builds;
pub use notify::print_transitions;
pub use progress::CycleProgress;
pub use styling::{bright_green, bright_red, dim, magenta_bold};
pub use summary::print_builds;

/// Prints the circlewatch banner to stderr.
///
/// Displays the tool name, version, and description at the start of execution.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("◉ circlewatch"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Current CircleCI builds")
    );
}

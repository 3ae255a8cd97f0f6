use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{bright_green, bright_yellow};

/// Spinner shown on stderr while a poll cycle fetches workflows.
pub struct CycleProgress {
    pb: ProgressBar,
}

impl CycleProgress {
    pub fn start() -> Self {
        let pb = create_spinner(bright_yellow("Fetching pipelines").to_string());
        Self { pb }
    }

    pub fn set_fetched(&self, fetched: usize) {
        self.pb.set_message(
            bright_yellow(format!("Fetched workflows for {fetched} pipelines")).to_string(),
        );
    }

    pub fn finish(self, builds: usize) {
        self.pb
            .finish_with_message(bright_green(format!("Found {builds} builds ✓")).to_string());
    }

    /// Removes the spinner without leaving a line behind.
    pub fn clear(self) {
        self.pb.finish_and_clear();
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    let style = ProgressStyle::default_spinner()
        .template("  {msg} {spinner}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{bright, bright_green, bright_yellow};
use crate::providers::gitlab::PruneObserver;

/// Spinner on stderr tracking which project is being pruned.
///
/// Nothing is drawn until the pruner has resolved its targets.
#[derive(Default)]
pub struct PruneProgress {
    pb: Option<ProgressBar>,
    total: usize,
    done: usize,
}

impl PruneObserver for PruneProgress {
    fn targets_resolved(&mut self, count: usize) {
        eprintln!("{}  {}", bright("⚙️"), bright("Projects").underlined());
        self.pb = Some(create_spinner(
            bright_yellow("Resolving pipelines").to_string(),
        ));
        self.total = count;
        self.done = 0;
    }

    fn project_started(&mut self, name: &str) {
        if let Some(pb) = &self.pb {
            pb.set_message(
                bright_yellow(format!(
                    "Project {}/{}: {name}",
                    self.done + 1,
                    self.total
                ))
                .to_string(),
            );
        }
    }

    fn project_finished(&mut self) {
        self.done += 1;
    }

    fn finished(&mut self, processed: usize) {
        if let Some(pb) = self.pb.take() {
            pb.finish_with_message(
                bright_green(format!("{processed} project(s) processed ✓")).to_string(),
            );
            eprintln!();
        }
    }

    /// Stops the spinner in place, leaving the last message visible.
    fn aborted(&mut self) {
        if let Some(pb) = self.pb.take() {
            pb.abandon();
        }
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {msg} {spinner}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

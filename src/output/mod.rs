mod exports;
mod progress;
mod styling;
mod summary;
mod tables;

pub use exports::write_json;
pub use progress::PruneProgress;
use styling::{dim, magenta_bold};
pub use summary::print_prune_report;

/// Prints the `GitLab Tools` banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🦊 GitLab Tools"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Pipeline housekeeping for GitLab")
    );
}

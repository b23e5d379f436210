use std::fmt::Write;

use crate::report::PruneReport;

use super::styling::{bright, bright_green, bright_yellow, cyan, dim, selection_count};
use super::tables::{
    color_coded_selection_cell, create_table, header_cells, pipeline_ids_cell,
};
use comfy_table::Cell;

/// Prints a human-readable pruning report to stdout.
///
/// An overview with the retention rules and totals, followed by one table
/// row per project.
pub fn print_prune_report(report: &PruneReport) {
    println!("{}", render_prune_report(report));
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", bright(emoji), bright(title).underlined());
}

fn render_prune_report(report: &PruneReport) -> String {
    let mut output = String::new();
    let retention = &report.retention;

    add_section_header(&mut output, "📊", "Overview");

    let age = retention
        .older_than_days
        .map_or_else(|| "any".to_string(), |days| format!("> {days} days"));
    let mode = if retention.dry_run {
        bright_yellow("dry run")
    } else {
        bright_green("delete")
    };
    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n",
        dim("Instance:"),
        cyan(&report.instance),
        dim("Mode:"),
        mode,
        dim("Keep most recent:"),
        bright_yellow(retention.keep_count.unwrap_or(0)),
        dim("Age limit:"),
        bright_yellow(age),
        dim("Pipelines selected:"),
        selection_count(report.total_selected()),
        dim("Pipelines deleted:"),
        bright_yellow(report.total_deleted()),
    );

    if report.projects.is_empty() {
        let _ = writeln!(output, "{}", bright_yellow("No projects to prune."));
        return output;
    }

    add_section_header(&mut output, "🧹", "Projects");

    let mut table = create_table();
    table.set_header(header_cells(&[
        "Project",
        "Pipelines",
        "Selected",
        "Deleted",
        "Pipeline Ids",
    ]));
    for project in &report.projects {
        table.add_row(vec![
            Cell::new(format!("{}\n#{}", project.project_name, project.project_id)),
            Cell::new(project.total_pipelines),
            color_coded_selection_cell(
                project.selected_pipeline_ids.len(),
                project.total_pipelines,
            ),
            Cell::new(project.deleted_pipelines),
            pipeline_ids_cell(&project.selected_pipeline_ids),
        ]);
    }
    let _ = writeln!(output, "{table}");

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::gitlab::RetentionArgs;
    use crate::report::ProjectReport;
    use chrono::Utc;

    fn report(projects: Vec<ProjectReport>, dry_run: bool) -> PruneReport {
        PruneReport {
            instance: "https://gitlab.example.com/".to_string(),
            generated_at: Utc::now(),
            retention: RetentionArgs {
                keep_count: Some(50),
                older_than_days: Some(30),
                dry_run,
            },
            projects,
        }
    }

    fn project(id: u64, total: usize, selected: Vec<u64>, deleted: usize) -> ProjectReport {
        ProjectReport {
            project_id: id,
            project_name: format!("project-{id}"),
            total_pipelines: total,
            selected_pipeline_ids: selected,
            deleted_pipelines: deleted,
        }
    }

    #[test]
    fn empty_report_says_nothing_to_prune() {
        let output = render_prune_report(&report(vec![], false));

        assert!(output.contains("https://gitlab.example.com/"));
        assert!(output.contains("No projects to prune."));
        assert!(!output.contains("Pipeline Ids"));
    }

    #[test]
    fn lists_every_project_with_counts() {
        let output = render_prune_report(&report(
            vec![project(1147, 60, vec![1, 2, 3], 3), project(1148, 10, vec![], 0)],
            false,
        ));

        assert!(output.contains("project-1147"));
        assert!(output.contains("#1148"));
        assert!(output.contains("1, 2, 3"));
        assert!(output.contains("> 30 days"));
    }

    #[test]
    fn dry_run_is_visible_in_overview() {
        let output = render_prune_report(&report(vec![project(1, 5, vec![4], 0)], true));

        assert!(output.contains("dry run"));
        assert!(output.contains("Pipelines deleted:"));
    }
}

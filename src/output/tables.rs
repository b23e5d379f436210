use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn header_cells(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

/// Share of a project's pipelines selected for deletion.
///
/// Green below 25%, yellow up to 75%, red above.
pub fn color_coded_selection_cell(selected: usize, total: usize) -> Cell {
    #[allow(clippy::cast_precision_loss)]
    let share = if total == 0 {
        0.0
    } else {
        selected as f64 / total as f64 * 100.0
    };
    let text = format!("{selected} ({share:.0}%)");
    if share < 25.0 {
        Cell::new(text).fg(TableColor::Green)
    } else if share <= 75.0 {
        Cell::new(text).fg(TableColor::Yellow)
    } else {
        Cell::new(text).fg(TableColor::Red)
    }
}

/// Compact id list, e.g. `1415, 1416 ... 1502 (88)`.
pub fn pipeline_ids_cell(ids: &[u64]) -> Cell {
    const SHOWN: usize = 3;
    let text = match ids {
        [] => "-".to_string(),
        _ if ids.len() <= SHOWN * 2 => join_ids(ids),
        _ => format!(
            "{} ... {} ({})",
            join_ids(&ids[..SHOWN]),
            join_ids(&ids[ids.len() - SHOWN..]),
            ids.len()
        ),
    };
    Cell::new(text)
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

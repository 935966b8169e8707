use ait_core::{format_duration, TaskMeta};
use chrono::{DateTime, Utc};

const DESCRIPTION_WIDTH: usize = 40;
const HEADERS: [&str; 6] = ["ID", "STATUS", "ISSUE", "PID", "DURATION", "DESCRIPTION"];

pub fn render_task_table(tasks: &[TaskMeta], now: DateTime<Utc>) -> String {
    if tasks.is_empty() {
        return "No tasks found".to_string();
    }

    let rows: Vec<[String; 6]> = tasks.iter().map(|meta| row(meta, now)).collect();
    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(format_line(&HEADERS.map(str::to_string), &widths));
    for row in &rows {
        lines.push(format_line(row, &widths));
    }
    lines.join("\n")
}

fn row(meta: &TaskMeta, now: DateTime<Utc>) -> [String; 6] {
    let issue = meta
        .issue
        .map(|issue| format!("#{issue}"))
        .unwrap_or_else(|| "-".to_string());
    let pid = meta
        .pid
        .map(|pid| pid.to_string())
        .unwrap_or_else(|| "-".to_string());
    let duration = match meta.started_at_utc() {
        Some(started) => {
            let end = meta.finished_at_utc().unwrap_or(now);
            format_duration((end - started).num_milliseconds() as f64 / 1000.0)
        }
        None => "-".to_string(),
    };
    [
        meta.task_id.clone(),
        meta.status.to_string(),
        issue,
        pid,
        duration,
        truncate(&meta.description, DESCRIPTION_WIDTH),
    ]
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

fn format_line(cells: &[String; 6], widths: &[usize; 6]) -> String {
    let last = cells.len() - 1;
    cells
        .iter()
        .zip(widths.iter())
        .enumerate()
        .map(|(idx, (cell, &width))| {
            if idx == last {
                cell.clone()
            } else {
                format!("{cell:<width$}")
            }
        })
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

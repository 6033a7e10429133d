//! services/insight/src/console/render.rs
//!
//! Plain-text rendering of query results and status screens for the console.

use erp_insight_core::domain::{
    DataRow, DatabaseInfo, DatabaseSummary, ModelInfo, QueryKind, QueryResult,
};
use erp_insight_core::QueryHistory;
use serde_json::Value;
use std::fmt::Write;
use std::time::Duration;

/// Rows shown in the result table. The rest are only counted.
pub const DISPLAY_ROWS: usize = 20;
/// Cells wider than this are cut with an ellipsis.
const MAX_CELL_WIDTH: usize = 40;

/// Renders a full query result: table, explanation, SQL and suggestions.
pub fn render_result(result: &QueryResult) -> String {
    let mut out = String::new();

    if result.success {
        let _ = writeln!(
            out,
            "{} row(s) in {}",
            result.record_count,
            format_elapsed(result.elapsed)
        );
        if !result.rows.is_empty() {
            out.push_str(&render_table(&result.rows, DISPLAY_ROWS));
        }
    } else {
        let _ = writeln!(
            out,
            "Query failed after {}: {}",
            format_elapsed(result.elapsed),
            result.error
        );
    }

    if !result.sql.is_empty() {
        let _ = writeln!(out, "\nSQL:\n{}", result.sql);
    }
    if !result.explanation.is_empty() {
        let _ = writeln!(out, "\nExplanation:\n{}", result.explanation.trim());
    }
    if !result.suggestions.is_empty() {
        out.push_str("\nRelated queries:\n");
        out.push_str(&render_list(&result.suggestions));
    }

    out
}

/// Renders up to `limit` rows as an aligned text table. Columns follow the
/// order of the first row.
pub fn render_table(rows: &[DataRow], limit: usize) -> String {
    let Some(first) = rows.first() else {
        return String::new();
    };

    let columns: Vec<&String> = first.keys().collect();
    let shown = &rows[..rows.len().min(limit)];

    let cells: Vec<Vec<String>> = shown
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| truncate(&cell_text(row.get(c.as_str()))))
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let header: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    push_row(&mut out, &header, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_row(&mut out, &rule, &widths);
    for row in &cells {
        push_row(&mut out, row, &widths);
    }

    if rows.len() > shown.len() {
        let _ = writeln!(out, "... {} more row(s) not shown", rows.len() - shown.len());
    }
    out
}

/// Renders the database and model status screen.
pub fn render_status(database: &DatabaseInfo, model: &ModelInfo, model_available: bool) -> String {
    let mut out = String::new();

    out.push_str("Database\n");
    if database.connected {
        let _ = writeln!(out, "  status:   connected");
        let _ = writeln!(out, "  server:   {}", database.server_name);
        let _ = writeln!(out, "  database: {}", database.database_name);
        let _ = writeln!(out, "  version:  {}", database.server_version);
    } else {
        let _ = writeln!(out, "  status:   not connected");
    }
    let _ = writeln!(out, "  checked:  {}", database.checked_at.format("%Y-%m-%d %H:%M:%S"));

    out.push_str("Model\n");
    let _ = writeln!(
        out,
        "  status:   {}",
        if model_available { "available" } else { "unavailable" }
    );
    let _ = writeln!(out, "  name:     {}", model.name);
    if !model.version.is_empty() {
        let _ = writeln!(out, "  size:     {}", model.version);
    }
    let _ = writeln!(out, "  detail:   {}", model.description);

    out
}

/// Renders the history, newest first, numbered for `:rerun`.
pub fn render_history(history: &QueryHistory) -> String {
    if history.is_empty() {
        return "No queries yet.\n".to_string();
    }

    let mut out = String::new();
    for (position, item) in history.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>3}. [{}] {} {} {} row(s) {} {}",
            position + 1,
            item.executed_at.format("%H:%M:%S"),
            match item.kind {
                QueryKind::NaturalLanguage => "ask",
                QueryKind::Sql => "sql",
            },
            if item.success { "ok  " } else { "fail" },
            item.record_count,
            format_elapsed(item.elapsed),
            item.display_text()
        );
    }
    out
}

/// Renders the statistics with the model's analysis.
pub fn render_summary(summary: &DatabaseSummary) -> String {
    let stats = &summary.statistics;
    let mut out = String::new();

    out.push_str("Statistics\n");
    let _ = writeln!(out, "  receipts:          {}", stats.total_headers);
    let _ = writeln!(out, "  receipt lines:     {}", stats.total_lines);
    let _ = writeln!(out, "  active suppliers:  {}", stats.active_suppliers);
    let _ = writeln!(out, "  active articles:   {}", stats.active_articles);
    let _ = writeln!(out, "  total amount:      {}", stats.total_amount);
    let _ = writeln!(
        out,
        "  latest receipt:    {}",
        stats
            .latest_header_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    let _ = writeln!(
        out,
        "  top supplier:      {}",
        stats.most_active_supplier.as_deref().unwrap_or("-")
    );
    let _ = writeln!(
        out,
        "  top article:       {}",
        stats.most_moved_article.as_deref().unwrap_or("-")
    );

    let _ = writeln!(out, "\nAnalysis:\n{}", summary.analysis.trim());
    out.push_str("\nKey insights:\n");
    out.push_str(&render_list(&summary.key_insights));
    out.push_str("\nRecommended queries:\n");
    out.push_str(&render_list(&summary.recommended_queries));

    out
}

pub fn render_list(items: &[String]) -> String {
    items.iter().map(|item| format!("  - {}\n", item)).collect()
}

fn push_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect();
    out.push_str(line.join(" | ").trim_end());
    out.push('\n');
}

pub(crate) fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "NULL".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn truncate(text: &str) -> String {
    let single_line = text.replace(['\n', '\r'], " ");
    if single_line.chars().count() <= MAX_CELL_WIDTH {
        return single_line;
    }
    let head: String = single_line.chars().take(MAX_CELL_WIDTH - 3).collect();
    format!("{}...", head)
}

fn format_elapsed(elapsed: Duration) -> String {
    if elapsed.as_secs() >= 1 {
        format!("{:.2}s", elapsed.as_secs_f64())
    } else {
        format!("{}ms", elapsed.as_millis())
    }
}

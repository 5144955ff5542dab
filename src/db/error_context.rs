//! Rich context for PostgreSQL errors raised while running probe scripts.

use sqlx::postgres::{PgDatabaseError, PgErrorPosition};

const CONTEXT_LINES: usize = 3;

/// Error details extracted from a PostgreSQL error response
#[derive(Debug, Clone, Default)]
pub struct SqlErrorContext {
    pub message: String,
    /// Line in the script, derived from the reported character position
    pub line_number: Option<usize>,
    pub detail: Option<String>,
    pub hint: Option<String>,
    /// PL/pgSQL or statement context reported by the server
    pub context: Option<String>,
    /// SQLSTATE code (e.g. "42P01" for undefined_table)
    pub code: Option<String>,
}

impl SqlErrorContext {
    /// Extract context from a sqlx error
    pub fn from_sqlx_error(error: &sqlx::Error, sql: &str) -> Self {
        if let Some(db_error) = error.as_database_error()
            && let Some(pg_error) = db_error.try_downcast_ref::<PgDatabaseError>()
        {
            let line_number = pg_error
                .position()
                .and_then(|pos| script_line(pos, sql));

            return Self {
                message: pg_error.message().to_string(),
                line_number,
                detail: pg_error.detail().map(str::to_string),
                hint: pg_error.hint().map(str::to_string),
                context: pg_error.r#where().map(str::to_string),
                code: Some(pg_error.code().to_string()),
            };
        }

        Self {
            message: error.to_string(),
            ..Default::default()
        }
    }

    /// Render the error together with the offending script lines
    pub fn format(&self, script_name: &str, sql: &str) -> String {
        let mut out = format!("SQL error in '{}'", script_name);

        if let Some(line) = self.line_number {
            out.push_str(&format!(" at line {}", line));
        }
        if let Some(code) = &self.code {
            out.push_str(&format!(" [{}]", code));
        }
        out.push_str(&format!(":\n\n  {}\n", self.message));

        for (label, value) in [
            ("Detail", &self.detail),
            ("Hint", &self.hint),
            ("Context", &self.context),
        ] {
            if let Some(value) = value {
                out.push_str(&format!("\n  {}: {}", label, value));
            }
        }

        if let Some(line) = self.line_number {
            out.push_str(&format!("\n\n{}", format_line_context(sql, line)));
        }

        out
    }
}

/// Convert a 1-indexed character position to a 1-indexed line number
pub fn position_to_line(content: &str, position: usize) -> usize {
    content
        .chars()
        .take(position.saturating_sub(1))
        .filter(|c| *c == '\n')
        .count()
        + 1
}

/// Show the lines around `error_line`, marking the failing one with `>`
pub fn format_line_context(content: &str, error_line: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let error_idx = error_line.saturating_sub(1);
    let start = error_idx.saturating_sub(CONTEXT_LINES);
    let end = (error_idx + CONTEXT_LINES + 1).min(lines.len());

    let mut rendered = Vec::new();

    if start > 0 {
        rendered.push(format!("  ... [{} lines above]", start));
    }

    for (offset, line) in lines[start.min(end)..end].iter().enumerate() {
        let line_num = start + offset + 1;
        let marker = if line_num == error_line { ">" } else { " " };
        rendered.push(format!("  {} {:4} | {}", marker, line_num, line));
    }

    if end < lines.len() {
        rendered.push(format!("  ... [{} lines below]", lines.len() - end));
    }

    rendered.join("\n")
}

/// Script line for an error position
///
/// Only `Original` positions index into the script. `Internal` positions
/// point into a query generated by the server (e.g. inside a PL/pgSQL
/// function), so they have no line in the script.
fn script_line(position: PgErrorPosition<'_>, sql: &str) -> Option<usize> {
    match position {
        PgErrorPosition::Original(offset) => Some(position_to_line(sql, offset)),
        PgErrorPosition::Internal { .. } => None,
    }
}

use anyhow::{Result, anyhow};
use sqlx::{PgConnection, Row};
use std::time::{Duration, Instant};

use super::value::{is_truthy, parse_hstore};
use super::{Check, Expectation};
use crate::report::CheckOutcome;

/// SQLSTATE for `query_canceled`, raised when `statement_timeout` fires
const QUERY_CANCELED: &str = "57014";

/// Extra time the client waits past `statement_timeout` before giving up
const CLIENT_TIMEOUT_GRACE: Duration = Duration::from_secs(5);

/// Statement that makes the server cancel any query running past `timeout`
pub fn statement_timeout_sql(timeout: Duration) -> String {
    format!("SET statement_timeout = {}", timeout.as_millis())
}

/// Limit every later statement on this session to `timeout`
///
/// The server cancels the query itself, so the session is immediately
/// usable for the next check.
pub async fn apply_statement_timeout(conn: &mut PgConnection, timeout: Duration) -> Result<()> {
    sqlx::raw_sql(&statement_timeout_sql(timeout))
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Run one check and record its outcome; never fails the caller
///
/// Expects `statement_timeout` to be set on the session (see
/// [`apply_statement_timeout`]). The client-side timeout only fires if the
/// server does not cancel in time.
pub async fn run_check(conn: &mut PgConnection, check: &Check, timeout: Duration) -> CheckOutcome {
    let start = Instant::now();
    let timed_out = || format!("query timed out after {}s", timeout.as_secs());

    let result = match tokio::time::timeout(
        timeout + CLIENT_TIMEOUT_GRACE,
        fetch_first_column(conn, &check.query),
    )
    .await
    {
        Ok(Ok(rows)) => evaluate(&rows, &check.expect),
        Ok(Err(e)) if is_statement_timeout(&e) => Err(timed_out()),
        Ok(Err(e)) => Err(format!("query failed: {:#}", e)),
        Err(_) => Err(timed_out()),
    };

    CheckOutcome {
        query: check.query.clone(),
        passed: result.is_ok(),
        message: result.err(),
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

fn is_statement_timeout(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .and_then(|db| db.code())
        .is_some_and(|code| code == QUERY_CANCELED)
}

/// Fetch the first column of every row as text
///
/// The simple query protocol returns values in text format, so any column
/// type (ltree, hstore, tsvector, ...) reads as its textual form.
pub async fn fetch_first_column(conn: &mut PgConnection, query: &str) -> Result<Vec<Option<String>>> {
    let rows = sqlx::raw_sql(query).fetch_all(&mut *conn).await?;

    rows.iter()
        .map(|row| {
            if row.columns().is_empty() {
                return Err(anyhow!("query returned rows without columns"));
            }
            Ok(row.try_get_unchecked::<Option<String>, _>(0)?)
        })
        .collect()
}

/// Compare fetched values against an expectation
pub fn evaluate(rows: &[Option<String>], expect: &Expectation) -> Result<(), String> {
    match expect {
        Expectation::Scalar { value } => {
            let actual = first_value(rows)?;
            if actual == value {
                Ok(())
            } else {
                Err(format!("expected '{}', got '{}'", value, actual))
            }
        }
        Expectation::Truthy { value } => {
            let actual = first_value(rows)?;
            match is_truthy(actual) {
                Some(truth) if truth == *value => Ok(()),
                Some(truth) => Err(format!(
                    "expected {}, got {} ('{}')",
                    value, truth, actual
                )),
                None => Err(format!("'{}' is not a boolean or number", actual)),
            }
        }
        Expectation::ContainsRows { values } => {
            let missing: Vec<&str> = values
                .iter()
                .filter(|v| !rows.iter().any(|r| r.as_deref() == Some(v.as_str())))
                .map(String::as_str)
                .collect();
            if missing.is_empty() {
                Ok(())
            } else {
                Err(format!(
                    "missing rows: {} (got {})",
                    missing.join(", "),
                    describe_rows(rows)
                ))
            }
        }
        Expectation::ExactRows { values } => {
            let matches = rows.len() == values.len()
                && rows
                    .iter()
                    .zip(values)
                    .all(|(row, expected)| row.as_deref() == Some(expected.as_str()));
            if matches {
                Ok(())
            } else {
                Err(format!(
                    "expected rows [{}], got {}",
                    values.join(", "),
                    describe_rows(rows)
                ))
            }
        }
        Expectation::Hstore { contains, absent } => {
            let actual = first_value(rows)?;
            let map = parse_hstore(actual).map_err(|e| format!("not an hstore value: {}", e))?;

            for (key, expected) in contains {
                match map.get(key) {
                    Some(Some(v)) if v == expected => {}
                    Some(Some(v)) => {
                        return Err(format!("key '{}': expected '{}', got '{}'", key, expected, v));
                    }
                    Some(None) => {
                        return Err(format!("key '{}': expected '{}', got NULL", key, expected));
                    }
                    None => return Err(format!("key '{}' is missing", key)),
                }
            }

            if let Some(key) = absent.iter().find(|k| map.contains_key(k.as_str())) {
                return Err(format!("key '{}' should be absent", key));
            }

            Ok(())
        }
        Expectation::Empty => {
            if rows.is_empty() {
                Ok(())
            } else {
                Err(format!("expected no rows, got {}", describe_rows(rows)))
            }
        }
    }
}

fn first_value(rows: &[Option<String>]) -> Result<&str, String> {
    match rows.first() {
        None => Err("query returned no rows".to_string()),
        Some(None) => Err("first row is NULL".to_string()),
        Some(Some(v)) => Ok(v.as_str()),
    }
}

fn describe_rows(rows: &[Option<String>]) -> String {
    const MAX_SHOWN: usize = 10;

    let shown: Vec<&str> = rows
        .iter()
        .take(MAX_SHOWN)
        .map(|r| r.as_deref().unwrap_or("NULL"))
        .collect();
    let more = rows.len().saturating_sub(MAX_SHOWN);

    if more > 0 {
        format!("[{}, ... {} more]", shown.join(", "), more)
    } else {
        format!("[{}]", shown.join(", "))
    }
}

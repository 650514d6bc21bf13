//! Post-run verification: row counts and per-column values, source against target.
//!
//! Rows are matched by entity id rather than by position, so differing scan
//! orders between SQLite and Postgres cannot pair unrelated rows. Values are
//! normalized per field kind before comparison; see [`normalize_value`].

use crate::catalog::Catalog;
use crate::error::{ConsistencyError, MigrateError, Result};
use crate::record::FieldKind;
use crate::table::{Table, TableKind};
use crate::timestamp::normalize_timestamp;
use itertools::Itertools;
use postgres::Client;
use rusqlite::Connection;
use rusqlite::types::Value;
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableCheck {
    pub table: TableKind,
    pub rows: i64,
    pub outcome: std::result::Result<(), ConsistencyError>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    pub tables: Vec<TableCheck>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.tables.iter().all(|t| t.outcome.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ConsistencyError> {
        self.tables.iter().filter_map(|t| t.outcome.as_ref().err())
    }
}

pub struct ConsistencyChecker<'a> {
    source: &'a Connection,
    target: &'a mut Client,
    catalog: &'a Catalog,
    schema: String,
}

impl<'a> ConsistencyChecker<'a> {
    pub fn new(
        source: &'a Connection,
        target: &'a mut Client,
        catalog: &'a Catalog,
        schema: &str,
    ) -> Self {
        Self {
            source,
            target,
            catalog,
            schema: schema.to_string(),
        }
    }

    /// Checks every managed table. Mismatches are collected per table; store
    /// errors abort the pass.
    pub fn check_all(&mut self) -> Result<ConsistencyReport> {
        let mut report = ConsistencyReport::default();
        for table in self.catalog.tables() {
            let check = match self.check_table(table) {
                Ok(rows) => {
                    info!(table = %table, rows, "Table consistent");
                    TableCheck {
                        table,
                        rows,
                        outcome: Ok(()),
                    }
                }
                Err(MigrateError::Consistency(mismatch)) => {
                    warn!(table = %table, error = %mismatch, "Table inconsistent");
                    TableCheck {
                        table,
                        rows: 0,
                        outcome: Err(mismatch),
                    }
                }
                Err(other) => return Err(other),
            };
            report.tables.push(check);
        }
        Ok(report)
    }

    /// Compares one table and returns its row count.
    pub fn check_table(&mut self, table: TableKind) -> Result<i64> {
        let catalog = self.catalog;
        let spec = catalog.spec(table)?;
        let source_table = Table::source(table);
        let target_table = Table::target(&self.schema, table);

        let source_count: i64 = self.source.query_row(
            &format!("SELECT COUNT(*) FROM {}", source_table),
            [],
            |row| row.get(0),
        )?;
        let target_count: i64 = self
            .target
            .query_one(format!("SELECT COUNT(*) FROM {}", target_table).as_str(), &[])?
            .get(0);
        if source_count != target_count {
            return Err(ConsistencyError::RowCount {
                table: table.to_string(),
                source_count,
                target_count,
            }
            .into());
        }

        let columns: Vec<(&str, &str, FieldKind)> = spec.column_map.iter().collect();
        let id_idx = columns
            .iter()
            .position(|(field, _, _)| *field == "id")
            .ok_or_else(|| MigrateError::Config(format!("column map of {} has no id field", table)))?;

        let target_sql = format!(
            "SELECT {} FROM {}",
            columns
                .iter()
                .map(|(_, target, _)| format!("\"{}\"::text", target))
                .join(", "),
            target_table
        );
        let mut target_rows: HashMap<String, Vec<Option<String>>> = HashMap::new();
        for row in self.target.query(target_sql.as_str(), &[])? {
            let values: Vec<Option<String>> = columns
                .iter()
                .enumerate()
                .map(|(idx, (_, _, kind))| normalize_value(*kind, row.get(idx)))
                .collect();
            let id = values[id_idx].clone().unwrap_or_default();
            target_rows.insert(id, values);
        }

        let source_sql = format!(
            "SELECT {} FROM {}",
            columns
                .iter()
                .map(|(field, _, _)| format!("\"{}\"", field))
                .join(", "),
            source_table
        );
        let mut stmt = self.source.prepare(&source_sql)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for (idx, (_, _, kind)) in columns.iter().enumerate() {
                values.push(normalize_value(*kind, source_text(row.get(idx)?)));
            }
            let id = values[id_idx].clone().unwrap_or_default();
            let Some(target) = target_rows.get(&id) else {
                return Err(ConsistencyError::MissingRow {
                    table: table.to_string(),
                    row: id,
                }
                .into());
            };
            for (idx, (field, _, _)) in columns.iter().enumerate() {
                if values[idx] != target[idx] {
                    return Err(ConsistencyError::Value {
                        table: table.to_string(),
                        row: id,
                        column: field.to_string(),
                        source_value: values[idx].clone(),
                        target_value: target[idx].clone(),
                    }
                    .into());
                }
            }
        }
        Ok(source_count)
    }
}

/// Renders a SQLite value as text, the way Postgres renders its own with `::text`.
pub fn source_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Text(text) => Some(text),
        Value::Blob(bytes) => Some(match Uuid::from_slice(&bytes) {
            Ok(id) => id.to_string(),
            Err(_) => bytes.iter().map(|b| format!("{:02x}", b)).collect(),
        }),
    }
}

/// Brings a textual value into a form both stores agree on.
///
/// Timestamps lose sub-second digits and their offset, floats are re-rendered,
/// dates keep their first ten characters and ids are lower-cased. NULL only
/// equals NULL.
pub fn normalize_value(kind: FieldKind, value: Option<String>) -> Option<String> {
    let value = value?;
    Some(match kind {
        FieldKind::Timestamp => normalize_timestamp(&value),
        FieldKind::Uuid => match Uuid::parse_str(value.trim()) {
            Ok(id) => id.to_string(),
            Err(_) => value.to_lowercase(),
        },
        FieldKind::Float => match value.trim().parse::<f64>() {
            Ok(f) => f.to_string(),
            Err(_) => value,
        },
        FieldKind::Date => value.chars().take(10).collect(),
        FieldKind::Text => value,
    })
}

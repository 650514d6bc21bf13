use crate::catalog::{Catalog, TableSpec};
use crate::error::{MigrateError, Result};
use crate::record::{RawRow, Record};
use crate::table::{Table, TableKind};
use itertools::Itertools;
use rusqlite::{Connection, Rows, Statement};

/// Up to `batch_size` records of one table, in source fetch order.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    pub table: TableKind,
    pub records: Vec<Record>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Reads managed tables out of the SQLite source, one table at a time.
pub struct Extractor<'a> {
    conn: &'a Connection,
    catalog: &'a Catalog,
    batch_size: usize,
}

impl<'a> Extractor<'a> {
    pub fn new(conn: &'a Connection, catalog: &'a Catalog, batch_size: usize) -> Self {
        Self {
            conn,
            catalog,
            batch_size,
        }
    }

    pub fn select_statement(spec: &TableSpec) -> String {
        format!(
            "SELECT {} FROM {}",
            spec.source_columns
                .iter()
                .map(|c| format!("\"{}\"", c))
                .join(", "),
            Table::source(spec.kind)
        )
    }

    /// Prepares the select for one table. Each call opens a fresh query.
    pub fn extract(&self, table: TableKind) -> Result<TableCursor<'a>> {
        if self.batch_size == 0 {
            return Err(MigrateError::Config("batch_size must be at least 1".into()));
        }
        let spec = self.catalog.spec(table)?;
        let statement = Self::select_statement(spec);
        tracing::debug!(table = %table, sql = %statement, "Preparing source query");
        let stmt = self.conn.prepare(&statement)?;
        Ok(TableCursor {
            spec,
            stmt,
            batch_size: self.batch_size,
        })
    }
}

/// A prepared source query for one table.
pub struct TableCursor<'a> {
    spec: &'a TableSpec,
    stmt: Statement<'a>,
    batch_size: usize,
}

impl TableCursor<'_> {
    pub fn table(&self) -> TableKind {
        self.spec.kind
    }

    /// Runs the query and returns its batches. The sequence is consumed once;
    /// calling this again re-runs the query from the start.
    pub fn batches(&mut self) -> Result<Batches<'_>> {
        let spec = self.spec;
        let rows = self.stmt.query([])?;
        Ok(Batches {
            spec,
            rows,
            batch_size: self.batch_size,
            exhausted: false,
        })
    }
}

/// Lazily pulls `batch_size` rows at a time off an open source query.
pub struct Batches<'c> {
    spec: &'c TableSpec,
    rows: Rows<'c>,
    batch_size: usize,
    exhausted: bool,
}

impl Batches<'_> {
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

impl Iterator for Batches<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        let mut records = Vec::with_capacity(self.batch_size);
        while records.len() < self.batch_size {
            match self.rows.next() {
                Ok(Some(row)) => {
                    let decoded = RawRow::from_sqlite(row, &self.spec.source_columns)
                        .map_err(MigrateError::from)
                        .and_then(|raw| Record::from_row(self.spec.kind, &raw));
                    match decoded {
                        Ok(record) => records.push(record),
                        Err(e) => {
                            self.exhausted = true;
                            return Some(Err(e));
                        }
                    }
                }
                Ok(None) => {
                    self.exhausted = true;
                    break;
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e.into()));
                }
            }
        }
        if records.is_empty() {
            return None;
        }
        Some(Ok(Batch {
            table: self.spec.kind,
            records,
        }))
    }
}

use crate::catalog::Catalog;
use crate::error::{MigrateError, Result};
use crate::record::Record;
use crate::table::{Table, TableKind};
use itertools::Itertools;
use postgres::Client;
use postgres::error::SqlState;
use postgres::types::ToSql;

/// Postgres refuses statements with more bind parameters than this.
pub const MAX_BIND_PARAMS: usize = 65535;

/// Write side of a migration run: one `reset`, then any number of batches.
pub trait Load {
    fn reset(&mut self) -> Result<()>;

    /// Inserts one homogeneous batch and commits it. Returns the number of
    /// rows actually inserted, which excludes ids already present.
    fn save_batch(&mut self, records: &[Record], table: TableKind) -> Result<u64>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LoaderState {
    Fresh,
    Reset,
    Loading,
}

pub struct PostgresLoader<'a> {
    client: &'a mut Client,
    catalog: &'a Catalog,
    schema: String,
    state: LoaderState,
}

impl<'a> PostgresLoader<'a> {
    pub fn new(client: &'a mut Client, catalog: &'a Catalog, schema: &str) -> Self {
        Self {
            client,
            catalog,
            schema: schema.to_string(),
            state: LoaderState::Fresh,
        }
    }
}

impl Load for PostgresLoader<'_> {
    fn reset(&mut self) -> Result<()> {
        if self.state != LoaderState::Fresh {
            return Err(MigrateError::load(
                self.schema.as_str(),
                "reset must run once, before the first batch",
            ));
        }
        let mut txn = self.client.transaction()?;
        for table in self.catalog.tables() {
            let statement = truncate_statement(&Table::target(&self.schema, table));
            tracing::debug!(%statement, "Clearing target table");
            txn.batch_execute(&statement)?;
        }
        txn.commit()?;
        self.state = LoaderState::Reset;
        Ok(())
    }

    fn save_batch(&mut self, records: &[Record], table: TableKind) -> Result<u64> {
        validate_batch(records, table)?;
        if self.state == LoaderState::Fresh {
            return Err(MigrateError::load(
                table.name(),
                "target was not reset before the first batch",
            ));
        }
        let spec = self.catalog.spec(table)?;
        let columns = spec.column_map.target_cols();
        let params: Vec<&(dyn ToSql + Sync)> =
            records.iter().flat_map(|record| record.params()).collect();
        if params.len() != columns.len() * records.len() {
            return Err(MigrateError::load(
                table.name(),
                format!(
                    "column map has {} columns for {} fields",
                    columns.len(),
                    params.len() / records.len()
                ),
            ));
        }
        let target = Table::target(&self.schema, table);
        let mut txn = self.client.transaction()?;
        let mut inserted = 0;
        for (rows, chunk) in statement_chunks(records.len(), columns.len())
            .into_iter()
            .zip(params.chunks(rows_per_statement(columns.len()) * columns.len()))
        {
            let statement = insert_statement(&target, &columns, rows);
            inserted += txn
                .execute(statement.as_str(), chunk)
                .map_err(|e| classify_error(table, e))?;
        }
        txn.commit()?;
        self.state = LoaderState::Loading;
        tracing::debug!(table = %table, batch = records.len(), inserted, "Committed batch");
        Ok(inserted)
    }
}

/// Rejects empty batches and batches holding records of another table.
pub fn validate_batch(records: &[Record], table: TableKind) -> Result<()> {
    if records.is_empty() {
        return Err(MigrateError::load(table.name(), "empty batch"));
    }
    if let Some(stray) = records.iter().find(|r| r.kind() != table) {
        return Err(MigrateError::load(
            table.name(),
            format!("batch contains a {} record ({})", stray.kind(), stray.id()),
        ));
    }
    Ok(())
}

/// Most rows of `width` columns one statement can bind.
pub fn rows_per_statement(width: usize) -> usize {
    (MAX_BIND_PARAMS / width.max(1)).max(1)
}

/// Row counts of the insert statements a batch of `rows` is split into.
pub fn statement_chunks(rows: usize, width: usize) -> Vec<usize> {
    let per_statement = rows_per_statement(width);
    (0..rows)
        .step_by(per_statement)
        .map(|start| per_statement.min(rows - start))
        .collect()
}

pub fn truncate_statement(table: &Table) -> String {
    format!("TRUNCATE TABLE {} CASCADE", table)
}

/// Multi-row insert with positional placeholders that skips ids already present.
pub fn insert_statement(table: &Table, columns: &[&str], rows: usize) -> String {
    let width = columns.len();
    let values = (0..rows)
        .map(|row| {
            format!(
                "({})",
                (1..=width).map(|col| format!("${}", row * width + col)).join(", ")
            )
        })
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES {} ON CONFLICT (id) DO NOTHING",
        table,
        columns.iter().map(|c| format!("\"{}\"", c)).join(", "),
        values
    )
}

fn classify_error(table: TableKind, err: postgres::Error) -> MigrateError {
    if err.code() == Some(&SqlState::FOREIGN_KEY_VIOLATION) {
        let detail = match err.as_db_error() {
            Some(db) => match db.detail() {
                Some(detail) => format!("{} ({})", db.message(), detail),
                None => db.message().to_string(),
            },
            None => err.to_string(),
        };
        return MigrateError::ReferentialIntegrity {
            table: table.to_string(),
            detail,
        };
    }
    MigrateError::Target(err)
}

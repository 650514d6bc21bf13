//! Per-table migration settings, built once and shared read-only by the
//! extractor, the loader and the consistency checker.

use crate::column_map::ColumnMap;
use crate::error::{MigrateError, Result};
use crate::table::{PROCESSING_ORDER, TableKind};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSpec {
    pub kind: TableKind,
    /// Columns selected from the source, in select order.
    pub source_columns: Vec<String>,
    pub column_map: ColumnMap,
}

impl TableSpec {
    pub fn standard(kind: TableKind) -> Self {
        let source_columns: &[&str] = match kind {
            TableKind::Genre => &["id", "name", "description", "created_at", "updated_at"],
            TableKind::Person => &["id", "full_name", "created_at", "updated_at"],
            TableKind::FilmWork => &[
                "id",
                "title",
                "description",
                "creation_date",
                "file_path",
                "rating",
                "type",
                "created_at",
                "updated_at",
            ],
            TableKind::GenreFilmWork => &["id", "genre_id", "film_work_id", "created_at"],
            TableKind::PersonFilmWork => &["id", "film_work_id", "person_id", "role", "created_at"],
        };
        TableSpec {
            kind,
            source_columns: source_columns.iter().map(|c| c.to_string()).collect(),
            column_map: ColumnMap::for_table(kind),
        }
    }

    pub fn with_source_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_column_map(mut self, column_map: ColumnMap) -> Self {
        self.column_map = column_map;
        self
    }
}

/// The static `table -> spec` lookup. Tables without a spec are never processed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Catalog {
    specs: Vec<TableSpec>,
}

impl Catalog {
    pub fn standard() -> Self {
        Catalog {
            specs: PROCESSING_ORDER.iter().map(|k| TableSpec::standard(*k)).collect(),
        }
    }

    /// Replaces the spec for `spec.kind`, or adds it.
    pub fn with_spec(mut self, spec: TableSpec) -> Self {
        match self.specs.iter_mut().find(|s| s.kind == spec.kind) {
            Some(existing) => *existing = spec,
            None => self.specs.push(spec),
        }
        self
    }

    pub fn spec(&self, kind: TableKind) -> Result<&TableSpec> {
        self.specs
            .iter()
            .find(|s| s.kind == kind)
            .ok_or_else(|| MigrateError::UnknownTable(kind.to_string()))
    }

    /// Looks a table up by its name.
    pub fn spec_by_name(&self, name: &str) -> Result<&TableSpec> {
        self.spec(name.parse()?)
    }

    /// Managed tables in processing order.
    pub fn tables(&self) -> Vec<TableKind> {
        PROCESSING_ORDER
            .iter()
            .copied()
            .filter(|k| self.specs.iter().any(|s| s.kind == *k))
            .collect()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Catalog::standard()
    }
}

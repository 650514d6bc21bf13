use crate::error::{MigrateError, Result};
use crate::extract::Extractor;
use crate::load::Load;
use crate::table::{PROCESSING_ORDER, TableKind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSummary {
    pub table: TableKind,
    pub batches: usize,
    pub rows: usize,
    pub inserted: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MigrationSummary {
    pub tables: Vec<TableSummary>,
}

impl MigrationSummary {
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|t| t.rows).sum()
    }

    pub fn table(&self, kind: TableKind) -> Option<&TableSummary> {
        self.tables.iter().find(|t| t.table == kind)
    }
}

/// Drives extraction into the loader, table by table, in dependency order.
pub struct MigrationOrchestrator<'a, L: Load> {
    extractor: Extractor<'a>,
    loader: L,
    stop: Arc<AtomicBool>,
}

impl<'a, L: Load> MigrationOrchestrator<'a, L> {
    pub fn new(extractor: Extractor<'a>, loader: L) -> Self {
        Self {
            extractor,
            loader,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Checked between batches; once set, the run aborts with `Cancelled`
    /// after the batch in flight has committed.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    pub fn orchestrate(&mut self) -> Result<MigrationSummary> {
        self.loader.reset()?;
        let mut summary = MigrationSummary::default();
        for table in PROCESSING_ORDER {
            let table_summary = self.migrate_table(table)?;
            info!(
                table = %table,
                batches = table_summary.batches,
                rows = table_summary.rows,
                inserted = table_summary.inserted,
                "Table migrated"
            );
            summary.tables.push(table_summary);
        }
        info!(rows = summary.total_rows(), "Migration complete");
        Ok(summary)
    }

    fn migrate_table(&mut self, table: TableKind) -> Result<TableSummary> {
        info!(table = %table, "Migrating table");
        let mut summary = TableSummary {
            table,
            batches: 0,
            rows: 0,
            inserted: 0,
        };
        let mut cursor = self.extractor.extract(table)?;
        for batch in cursor.batches()? {
            if self.stop.load(Ordering::Relaxed) {
                warn!(table = %table, rows = summary.rows, "Stop requested, aborting run");
                return Err(MigrateError::Cancelled);
            }
            let batch = batch?;
            summary.inserted += self.loader.save_batch(&batch.records, batch.table)?;
            summary.batches += 1;
            summary.rows += batch.len();
        }
        Ok(summary)
    }

    pub fn into_loader(self) -> L {
        self.loader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::load::validate_batch;
    use crate::record::Record;
    use rusqlite::Connection;

    #[derive(Default)]
    struct RecordingLoader {
        resets: usize,
        saved: Vec<(TableKind, usize)>,
        fail_on: Option<TableKind>,
    }

    impl Load for RecordingLoader {
        fn reset(&mut self) -> Result<()> {
            assert!(self.saved.is_empty(), "reset after a batch");
            self.resets += 1;
            Ok(())
        }

        fn save_batch(&mut self, records: &[Record], table: TableKind) -> Result<u64> {
            validate_batch(records, table)?;
            if self.fail_on == Some(table) {
                return Err(MigrateError::ReferentialIntegrity {
                    table: table.to_string(),
                    detail: "parent row missing".to_string(),
                });
            }
            self.saved.push((table, records.len()));
            Ok(records.len() as u64)
        }
    }

    const GENRE: &str = "120a21cf-9097-479e-904a-13dd7198c1dd";
    const PERSON: &str = "26e83050-29ef-4163-a99d-b546cac208f8";
    const FILM: &str = "3d825f60-9fff-4dfe-b294-1a45fa1e115d";
    const TS: &str = "2021-06-16 20:14:09.221838+00";

    fn source() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE genre (id TEXT, name TEXT, description TEXT, created_at TEXT, updated_at TEXT);
             CREATE TABLE person (id TEXT, full_name TEXT, created_at TEXT, updated_at TEXT);
             CREATE TABLE film_work (id TEXT, title TEXT, description TEXT, creation_date DATE,
                 certificate TEXT, file_path TEXT, rating FLOAT, type TEXT, created_at TEXT, updated_at TEXT);
             CREATE TABLE genre_film_work (id TEXT, film_work_id TEXT, genre_id TEXT, created_at TEXT);
             CREATE TABLE person_film_work (id TEXT, film_work_id TEXT, person_id TEXT, role TEXT, created_at TEXT);",
        )
        .unwrap();
        for i in 0..3 {
            conn.execute(
                "INSERT INTO genre VALUES (?1, ?2, NULL, ?3, ?3)",
                rusqlite::params![uuid::Uuid::new_v4().to_string(), format!("genre {}", i), TS],
            )
            .unwrap();
        }
        conn.execute("INSERT INTO genre VALUES (?1, 'Sci-Fi', NULL, ?2, ?2)", [GENRE, TS])
            .unwrap();
        conn.execute("INSERT INTO person VALUES (?1, 'George Lucas', ?2, ?2)", [PERSON, TS])
            .unwrap();
        conn.execute(
            "INSERT INTO film_work VALUES (?1, 'Star Wars', NULL, '1977-05-25', NULL, NULL, 8.6, 'movie', ?2, ?2)",
            [FILM, TS],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO genre_film_work VALUES ('0e6b6a8a-4b1c-4d22-8d30-5cfb7c1fdc42', ?1, ?2, ?3)",
            [FILM, GENRE, TS],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO person_film_work VALUES ('5f3c0f6e-6a43-4b67-9a1a-0b8b5a7e8e11', ?1, ?2, 'director', ?3)",
            [FILM, PERSON, TS],
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_tables_drained_in_dependency_order() {
        let conn = source();
        let catalog = Catalog::standard();
        let extractor = Extractor::new(&conn, &catalog, 2);
        let mut orchestrator = MigrationOrchestrator::new(extractor, RecordingLoader::default());
        let summary = orchestrator.orchestrate().unwrap();
        let loader = orchestrator.into_loader();
        assert_eq!(loader.resets, 1);
        assert_eq!(
            loader.saved,
            vec![
                (TableKind::Genre, 2),
                (TableKind::Genre, 2),
                (TableKind::Person, 1),
                (TableKind::FilmWork, 1),
                (TableKind::GenreFilmWork, 1),
                (TableKind::PersonFilmWork, 1),
            ]
        );
        assert_eq!(summary.total_rows(), 8);
        assert_eq!(summary.table(TableKind::Genre).unwrap().batches, 2);
    }

    #[test]
    fn test_error_aborts_remaining_tables() {
        let conn = source();
        let catalog = Catalog::standard();
        let extractor = Extractor::new(&conn, &catalog, 100);
        let loader = RecordingLoader {
            fail_on: Some(TableKind::GenreFilmWork),
            ..RecordingLoader::default()
        };
        let mut orchestrator = MigrationOrchestrator::new(extractor, loader);
        let err = orchestrator.orchestrate().unwrap_err();
        assert!(matches!(err, MigrateError::ReferentialIntegrity { .. }));
        let loader = orchestrator.into_loader();
        assert!(loader.saved.iter().all(|(t, _)| *t != TableKind::PersonFilmWork));
        assert_eq!(loader.saved.len(), 3);
    }

    #[test]
    fn test_stop_flag_cancels_before_next_batch() {
        let conn = source();
        let catalog = Catalog::standard();
        let extractor = Extractor::new(&conn, &catalog, 100);
        let stop = Arc::new(AtomicBool::new(true));
        let mut orchestrator =
            MigrationOrchestrator::new(extractor, RecordingLoader::default()).with_stop_flag(stop);
        assert!(matches!(orchestrator.orchestrate(), Err(MigrateError::Cancelled)));
        let loader = orchestrator.into_loader();
        assert_eq!(loader.resets, 1);
        assert!(loader.saved.is_empty());
    }
}

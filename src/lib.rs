//! One-shot migration of the movie catalog from SQLite into PostgreSQL.

pub mod args;
pub mod catalog;
pub mod column_map;
pub mod config;
pub mod consistency;
pub mod error;
pub mod extract;
pub mod load;
pub mod orchestrator;
pub mod record;
pub mod table;
pub mod timestamp;

// Re-export key types for ergonomic access

pub use self::table::*;
pub use catalog::*;
pub use column_map::*;
pub use config::*;
pub use consistency::*;
pub use error::*;
pub use extract::*;
pub use load::*;
pub use orchestrator::*;
pub use record::*;

use r2d2::Pool;
use r2d2_postgres::{PostgresConnectionManager, postgres::NoTls as R2d2NoTls};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::{Arc, atomic::AtomicBool};

pub type PgPool = Pool<PostgresConnectionManager<R2d2NoTls>>;

/// Opens the SQLite source read-only.
pub fn open_source(path: &Path) -> Result<Connection> {
    if !path.is_file() {
        return Err(MigrateError::Config(format!(
            "source database {} does not exist",
            path.display()
        )));
    }
    Ok(Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?)
}

pub fn target_pool(dsn: &str) -> Result<PgPool> {
    let manager = PostgresConnectionManager::new(dsn.parse()?, R2d2NoTls);
    Ok(Pool::builder().max_size(2).build(manager)?)
}

/// Runs a full migration: reset the target, then copy every table in order.
pub fn run_migration(config: &MigrateConfig, stop: Arc<AtomicBool>) -> Result<MigrationSummary> {
    config.validate()?;
    let source = open_source(&config.source_path)?;
    let pool = target_pool(&config.target_dsn)?;
    let mut client = pool.get()?;
    let catalog = Catalog::standard();
    let extractor = Extractor::new(&source, &catalog, config.batch_size);
    let loader = PostgresLoader::new(&mut client, &catalog, &config.schema_name);
    let mut orchestrator = MigrationOrchestrator::new(extractor, loader).with_stop_flag(stop);
    orchestrator.orchestrate()
}

/// Compares every managed table between source and target.
pub fn run_verification(config: &MigrateConfig) -> Result<ConsistencyReport> {
    config.validate()?;
    let source = open_source(&config.source_path)?;
    let pool = target_pool(&config.target_dsn)?;
    let mut client = pool.get()?;
    let catalog = Catalog::standard();
    let mut checker = ConsistencyChecker::new(&source, &mut client, &catalog, &config.schema_name);
    checker.check_all()
}

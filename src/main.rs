//! Main binary entry point for movies-migrate.

use anyhow::{Result, bail};
use movies_migrate::args::{Command, LogFormat, get_args};
use movies_migrate::{ConsistencyReport, MigrateConfig, PartialConfig};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tracing_subscriber::EnvFilter;

fn init_logging(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "movies_migrate=info".into());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    match format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }
}

fn report(report: &ConsistencyReport) -> Result<()> {
    for check in &report.tables {
        match &check.outcome {
            Ok(()) => println!("{:<18} ok ({} rows)", check.table, check.rows),
            Err(mismatch) => println!("{:<18} FAILED: {}", check.table, mismatch),
        }
    }
    if !report.is_consistent() {
        bail!(
            "{} table(s) differ between source and target",
            report.failures().count()
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = get_args().unwrap_or_else(|e| e.exit());
    init_logging(args.log_format);

    let file_config = match &args.config {
        Some(path) => PartialConfig::load_file(path)?,
        None => PartialConfig::default(),
    };

    match args.command {
        Command::Migrate { connection, verify } => {
            let config = MigrateConfig::resolve(file_config.merge(connection.into()))?;
            let stop = Arc::new(AtomicBool::new(false));
            let stop_clone = stop.clone();
            ctrlc::set_handler(move || {
                stop_clone.store(true, Ordering::Relaxed);
            })?;
            let summary = movies_migrate::run_migration(&config, stop)?;
            println!(
                "Migrated {} rows across {} tables",
                summary.total_rows(),
                summary.tables.len()
            );
            if verify {
                report(&movies_migrate::run_verification(&config)?)?;
            }
        }
        Command::Verify { connection } => {
            let config = MigrateConfig::resolve(file_config.merge(connection.into()))?;
            report(&movies_migrate::run_verification(&config)?)?;
        }
    }
    Ok(())
}

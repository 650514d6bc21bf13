use crate::config::PartialConfig;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// JSON configuration file; environment variables and flags override it
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// SQLite database to read from
    #[arg(short, long, env = "SQLITE_DB_PATH")]
    pub source: Option<PathBuf>,

    /// PostgreSQL connection string for the target
    #[arg(short, long, env = "TARGET_DSN")]
    pub target_dsn: Option<String>,

    /// Target schema holding the movie tables
    #[arg(long, env = "SCHEMA_NAME")]
    pub schema: Option<String>,

    /// Rows fetched and inserted per batch
    #[arg(short, long, env = "BATCH_SIZE")]
    pub batch_size: Option<usize>,
}

impl From<ConnectionArgs> for PartialConfig {
    fn from(args: ConnectionArgs) -> Self {
        PartialConfig {
            source_path: args.source,
            target_dsn: args.target_dsn,
            schema_name: args.schema,
            batch_size: args.batch_size,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Clear the target tables and copy every managed table from the source
    Migrate {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Run the consistency check after the migration
        #[arg(long, default_value = "false")]
        verify: bool,
    },
    /// Compare source and target without writing anything
    Verify {
        #[command(flatten)]
        connection: ConnectionArgs,
    },
}

pub fn get_args() -> Result<Args, clap::Error> {
    Args::try_parse()
}

use anyhow::{bail, Context};
use clap::Parser;
use itemflow_core::service::item_processor::DEFAULT_MAX_WORKERS;
use itemflow_core::{default_log_level, ProcessorConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the `itemflow-server` binary.
///
/// Every value can come from a CLI flag or an environment variable; a `.env`
/// file in the working directory is loaded before parsing.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "itemflow-server",
    version,
    about = "REST service for items with concurrent batch processing"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub server_addr: String,

    /// SQLite database file. Created and migrated on first start.
    ///
    /// Environment variable: `DATABASE_PATH`
    #[arg(long, env = "DATABASE_PATH", default_value = "itemflow.sqlite3")]
    pub database_path: PathBuf,

    /// One of `trace|debug|info|warn|error`. Defaults to `debug` in debug
    /// builds and `info` otherwise.
    ///
    /// Environment variable: `LOG_LEVEL`
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Absolute directory for rotating log files. Logs go to stderr when unset.
    ///
    /// Environment variable: `LOG_DIR`
    #[arg(long, env = "LOG_DIR")]
    pub log_dir: Option<String>,

    /// Artificial delay, in milliseconds, applied to each unit of work of a
    /// processing run.
    ///
    /// Environment variable: `PROCESS_TASK_DELAY_MS`
    #[arg(long, env = "PROCESS_TASK_DELAY_MS", default_value_t = 100)]
    pub process_task_delay_ms: u64,

    /// Maximum number of items processed concurrently.
    ///
    /// Environment variable: `PROCESS_MAX_WORKERS`
    #[arg(long, env = "PROCESS_MAX_WORKERS", default_value_t = DEFAULT_MAX_WORKERS)]
    pub process_max_workers: usize,

    /// Upper bound, in milliseconds, for a whole processing run. No limit when
    /// unset.
    ///
    /// Environment variable: `PROCESS_TIMEOUT_MS`
    #[arg(long, env = "PROCESS_TIMEOUT_MS")]
    pub process_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: SocketAddr,
    pub database_path: PathBuf,
    pub log_level: String,
    pub log_dir: Option<String>,
    pub processor: ProcessorConfig,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let server_addr = args
            .server_addr
            .parse::<SocketAddr>()
            .with_context(|| {
                format!("SERVER_ADDR `{}` is not a socket address", args.server_addr)
            })?;

        if args.process_max_workers == 0 {
            bail!("PROCESS_MAX_WORKERS must be greater than 0");
        }

        let join_timeout = match args.process_timeout_ms {
            Some(0) => bail!("PROCESS_TIMEOUT_MS must be greater than 0 when set"),
            Some(millis) => Some(Duration::from_millis(millis)),
            None => None,
        };

        Ok(Self {
            server_addr,
            database_path: args.database_path,
            log_level: args
                .log_level
                .unwrap_or_else(|| default_log_level().to_string()),
            log_dir: args.log_dir,
            processor: ProcessorConfig {
                task_delay: Duration::from_millis(args.process_task_delay_ms),
                max_workers: args.process_max_workers,
                join_timeout,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{CliArgs, ServerConfig};
    use clap::Parser;
    use std::time::Duration;

    fn parse(args: &[&str]) -> anyhow::Result<ServerConfig> {
        let mut argv = vec!["itemflow-server"];
        argv.extend_from_slice(args);
        ServerConfig::try_from(CliArgs::try_parse_from(argv)?)
    }

    #[test]
    fn explicit_flags_are_carried_into_processor_config() {
        let config = parse(&[
            "--server-addr",
            "127.0.0.1:9000",
            "--process-task-delay-ms",
            "0",
            "--process-max-workers",
            "4",
            "--process-timeout-ms",
            "1500",
        ])
        .unwrap();

        assert_eq!(config.server_addr.port(), 9000);
        assert_eq!(config.processor.task_delay, Duration::ZERO);
        assert_eq!(config.processor.max_workers, 4);
        assert_eq!(
            config.processor.join_timeout,
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn zero_workers_are_rejected() {
        let err = parse(&["--process-max-workers", "0"]).unwrap_err();
        assert!(err.to_string().contains("PROCESS_MAX_WORKERS"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = parse(&["--process-timeout-ms", "0"]).unwrap_err();
        assert!(err.to_string().contains("PROCESS_TIMEOUT_MS"));
    }

    #[test]
    fn malformed_address_is_rejected() {
        let err = parse(&["--server-addr", "not-an-address"]).unwrap_err();
        assert!(err.to_string().contains("SERVER_ADDR"));
    }
}

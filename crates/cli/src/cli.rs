use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Import S3 objects into BigQuery through a GCS staging bucket.
#[derive(Parser, Debug)]
#[command(name = "ferry", version, about)]
pub struct CliArgs {
    /// Path to the YAML config file
    #[arg(long, short, env = "FERRY_CONFIG", default_value = "config.yml", global = true)]
    pub config: PathBuf,

    /// Log at debug level regardless of RUST_LOG
    #[arg(long, global = true)]
    pub debug: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Receive notifications from the configured queue until signalled
    Run {
        /// Seconds to wait for the in-flight cycle on shutdown
        #[arg(long, env = "FERRY_SHUTDOWN_TIMEOUT", default_value_t = 30)]
        shutdown_timeout: u64,
    },

    /// Drain a queue and exit; fails on the first message that cannot be imported
    Batch {
        /// Queue to drain instead of the configured one (e.g. a dead-letter queue)
        #[arg(long)]
        queue: Option<String>,
    },

    /// Read s3://bucket/key lines from stdin and print the jobs they resolve to
    Check,

    /// Import the objects listed in request files, bypassing the queue
    Request {
        /// JSON files of the form {"records":[{"bucket":"..","key":".."}]}
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_batch_with_queue_override() {
        let args = CliArgs::try_parse_from(["ferry", "batch", "--queue", "ferry-dlq"]).unwrap();
        match args.command {
            Command::Batch { queue } => assert_eq!(queue.as_deref(), Some("ferry-dlq")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let args = CliArgs::try_parse_from([
            "ferry",
            "check",
            "--config",
            "prod.yml",
            "--log-format",
            "json",
            "--debug",
        ])
        .unwrap();
        assert_eq!(args.config, PathBuf::from("prod.yml"));
        assert_eq!(args.log_format, LogFormat::Json);
        assert!(args.debug);
    }

    #[test]
    fn request_needs_a_file() {
        assert!(CliArgs::try_parse_from(["ferry", "request"]).is_err());
    }
}

use clap::Parser;
use clap::builder::NonEmptyStringValueParser;
use engine::RunOptions;
use model::{ConnectionDescriptor, CyclePolicy};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Run queries concurrently on a set of PostgreSQL databases.
#[derive(Parser, Debug, Clone)]
#[command(name = "concurrent-query", version, long_about = None)]
pub struct Options {
    /// Database user
    #[arg(short, long, value_parser = NonEmptyStringValueParser::new())]
    pub user: String,

    /// Database password
    #[arg(short, long, env = "PGPASSWORD", hide_env_values = true, value_parser = NonEmptyStringValueParser::new())]
    pub password: String,

    /// Query group YAML file
    #[arg(short, long)]
    pub config: PathBuf,

    /// Server port
    #[arg(short = 'P', long, default_value_t = 5432)]
    pub port: u16,

    /// Server host, as an IP address
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Limit the run to this many seconds (0 runs until done or interrupted)
    #[arg(short, long, default_value_t = 0)]
    pub duration: u64,

    /// Don't cycle databases, process each only once
    #[arg(long)]
    pub dontcycle: bool,

    /// Exit on the first query error
    #[arg(short, long)]
    pub errexit: bool,

    /// Log level, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Options {
    pub fn cycle_policy(&self) -> CyclePolicy {
        CyclePolicy::from_dont_cycle(self.dontcycle)
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions::new()
            .max_duration(Duration::from_secs(self.duration))
            .cancel_on_first_error(self.errexit)
    }

    pub fn descriptor(&self, target: &str) -> ConnectionDescriptor {
        let host = match self.host {
            IpAddr::V4(v4) => v4.to_string(),
            IpAddr::V6(v6) => format!("[{v6}]"),
        };
        ConnectionDescriptor::postgres(&self.user, &self.password, &host, self.port, target)
    }
}

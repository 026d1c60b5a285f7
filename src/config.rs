use clap::Parser;

use crate::store::Retention;

#[derive(Parser, Debug, Clone)]
#[command(name = "jobwatch", about = "Desktop alerts for new job postings")]
pub struct Config {
    /// Database connection URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://jobwatch.db?mode=rwc")]
    pub database_url: String,

    /// Run database migrations on startup
    #[arg(long, env = "RUN_MIGRATIONS", default_value = "true")]
    pub run_migrations: bool,

    /// User agent sent when fetching search pages
    #[arg(
        long,
        env = "USER_AGENT",
        default_value = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36"
    )]
    pub user_agent: String,

    /// Seconds a loaded search page may be reused before refetching
    #[arg(long, env = "CONTEXT_TTL_SECS", default_value = "60")]
    pub context_ttl_secs: u64,

    /// Seen ids kept (0 = unbounded)
    #[arg(long, env = "MAX_SEEN_IDS", default_value = "5000")]
    pub max_seen_ids: usize,

    /// Saved postings kept (0 = unbounded)
    #[arg(long, env = "MAX_SAVED_POSTINGS", default_value = "500")]
    pub max_saved_postings: usize,

    /// Check records kept (0 = unbounded)
    #[arg(long, env = "MAX_CHECK_RECORDS", default_value = "100")]
    pub max_check_records: usize,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the scheduler and the local API (default when no subcommand given)
    Serve {
        /// Listen address
        #[arg(long, env = "LISTEN_ADDR", default_value = "127.0.0.1:8731")]
        listen_addr: String,

        /// Bearer token required by the API; unset leaves it open
        #[arg(long, env = "API_TOKEN")]
        api_token: Option<String>,
    },
    /// Run one check and print its report
    Check,
    /// Show a sample job notification
    TestNotification,
}

impl Config {
    /// Resolve the command, defaulting to Serve if none specified.
    pub fn resolved_command(&self) -> Command {
        self.command.clone().unwrap_or_else(|| Command::Serve {
            listen_addr: std::env::var("LISTEN_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:8731".to_string()),
            api_token: std::env::var("API_TOKEN").ok(),
        })
    }

    pub fn retention(&self) -> Retention {
        Retention {
            max_seen_ids: self.max_seen_ids,
            max_saved_postings: self.max_saved_postings,
            max_check_records: self.max_check_records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_arguments() {
        let config = Config::try_parse_from(["jobwatch"]).unwrap();
        assert_eq!(config.context_ttl_secs, 60);
        assert_eq!(config.retention().max_saved_postings, 500);
        assert!(config.command.is_none());
    }

    #[test]
    fn parses_subcommands() {
        let config = Config::try_parse_from([
            "jobwatch",
            "--max-seen-ids",
            "0",
            "serve",
            "--listen-addr",
            "127.0.0.1:9000",
        ])
        .unwrap();
        assert_eq!(config.retention().max_seen_ids, 0);
        assert!(matches!(
            config.resolved_command(),
            Command::Serve { listen_addr, .. } if listen_addr == "127.0.0.1:9000"
        ));

        let config = Config::try_parse_from(["jobwatch", "test-notification"]).unwrap();
        assert!(matches!(config.resolved_command(), Command::TestNotification));
    }
}

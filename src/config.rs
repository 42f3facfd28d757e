use crate::domain::message::Container;
use clap::{Args, Parser, Subcommand, ValueEnum};
use uuid::Uuid;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub database: DatabaseConfig,

    #[command(flatten)]
    pub pagination: PaginationConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Debug, Args)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[arg(long = "database-url", env = "DM_DATABASE_URL")]
    pub url: String,

    /// Maximum number of pooled connections
    #[arg(long, env = "DM_DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    /// Minimum number of idle connections kept open
    #[arg(long, env = "DM_DB_MIN_CONNECTIONS", default_value_t = 0)]
    pub min_connections: u32,

    /// Seconds to wait for a free connection before failing
    #[arg(long, env = "DM_DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
    pub acquire_timeout_secs: u64,

    /// Seconds an idle connection may stay in the pool
    #[arg(long, env = "DM_DB_IDLE_TIMEOUT_SECS", default_value_t = 300)]
    pub idle_timeout_secs: u64,

    /// Maximum lifetime of a pooled connection in seconds
    #[arg(long, env = "DM_DB_MAX_LIFETIME_SECS", default_value_t = 1800)]
    pub max_lifetime_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct PaginationConfig {
    /// Page size used when a listing does not ask for one
    #[arg(long, env = "DM_DEFAULT_PAGE_SIZE", default_value_t = 10)]
    pub default_page_size: u32,

    /// Upper bound applied to any requested page size
    #[arg(long, env = "DM_MAX_PAGE_SIZE", default_value_t = 50)]
    pub max_page_size: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long, env = "DM_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP collector endpoint; traces and metrics are exported only when set
    #[arg(long, env = "DM_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Apply pending database migrations
    Migrate,

    /// Register a user, optionally with a main photo
    AddUser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        photo_url: Option<String>,
    },

    /// Send a direct message
    Send {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        content: String,
    },

    /// Show a single message
    Show {
        #[arg(long)]
        id: Uuid,
    },

    /// List a page of a user's inbox, outbox or unread messages
    List {
        #[arg(long)]
        user: String,
        #[arg(long, default_value_t = Container::default())]
        container: Container,
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long)]
        page_size: Option<i64>,
    },

    /// Show the conversation between two users, marking the caller's messages read
    Thread {
        #[arg(long)]
        user: String,
        #[arg(long = "with")]
        other: String,
    },

    /// Delete a message on behalf of one of its parties
    Delete {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        user: String,
    },
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}

use clap::Parser;

/// Every setting is read from the environment; the long flags exist for ad-hoc overrides.
#[derive(Parser, Debug)]
#[command(
    name = "dbpush",
    version,
    about = "Push rows from a PostgreSQL table to a Prometheus PushGateway"
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,

    /// Reveal secrets in the debug configuration dump
    #[arg(long, env = "SHOW_SECRETS")]
    pub show_secrets: bool,

    /// Log filter when RUST_LOG is unset (e.g. debug, warn)
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Database host
    #[arg(long, env = "DB_HOST")]
    pub db_host: Option<String>,

    /// Database port (default: 5432)
    #[arg(long, env = "DB_PORT")]
    pub db_port: Option<String>,

    /// Database name
    #[arg(long, env = "DB_NAME")]
    pub db_name: Option<String>,

    /// Database user
    #[arg(long, env = "DB_USER")]
    pub db_user: Option<String>,

    /// Database password
    #[arg(long, env = "DB_PASS", hide_env_values = true)]
    pub db_pass: Option<String>,

    /// PostgreSQL sslmode (default: prefer)
    #[arg(long, env = "DB_SSLMODE")]
    pub db_sslmode: Option<String>,

    /// Table to read
    #[arg(long, env = "TABLE_NAME")]
    pub table_name: Option<String>,

    /// Custom read-only query replacing the generated SELECT
    #[arg(long, env = "QUERY")]
    pub query: Option<String>,

    /// Column providing the `id` label (default: id)
    #[arg(long, env = "ID_COLUMN")]
    pub id_column: Option<String>,

    /// Column providing the metric value (default: value)
    #[arg(long, env = "VALUE_COLUMN")]
    pub value_column: Option<String>,

    /// Column providing the last-update timestamp (default: updatedon)
    #[arg(long, env = "UPDATEDON_COLUMN")]
    pub updatedon_column: Option<String>,

    /// PushGateway base URL
    #[arg(long, env = "PUSHGATEWAY_URL")]
    pub pushgateway_url: Option<String>,

    /// PushGateway basic-auth user
    #[arg(long, env = "PUSHGATEWAY_USERNAME")]
    pub pushgateway_username: Option<String>,

    /// PushGateway basic-auth password
    #[arg(long, env = "PUSHGATEWAY_PASSWORD", hide_env_values = true)]
    pub pushgateway_password: Option<String>,

    /// Job grouping key (default: <db>_<table>)
    #[arg(long, env = "JOB_NAME")]
    pub job_name: Option<String>,

    /// Instance grouping key (default: the job name)
    #[arg(long, env = "INSTANCE_NAME")]
    pub instance_name: Option<String>,

    /// Extra labels for every sample, as k=v,k2=v2
    #[arg(long, env = "STATIC_LABELS")]
    pub static_labels: Option<String>,

    /// Database connect timeout in seconds (default: 30)
    #[arg(long, env = "CONNECT_TIMEOUT")]
    pub connect_timeout: Option<String>,

    /// Query execution timeout in seconds (default: 30)
    #[arg(long, env = "QUERY_TIMEOUT")]
    pub query_timeout: Option<String>,

    /// Push request timeout in seconds (default: 30)
    #[arg(long, env = "PUSH_TIMEOUT")]
    pub push_timeout: Option<String>,
}

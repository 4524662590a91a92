use crate::backend::postgres::select_statement;
use crate::cli::RunArgs;
use crate::error::DbpushError;
use crate::masking::{redact, redact_optional, redact_url};
use crate::validation::{self, ValidationResult};
use reqwest::Url;
use secrecy::SecretString;
use sqlx::postgres::PgSslMode;
use std::str::FromStr;

const DEFAULT_DB_PORT: u16 = 5432;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_ID_COLUMN: &str = "id";
const DEFAULT_VALUE_COLUMN: &str = "value";
const DEFAULT_UPDATEDON_COLUMN: &str = "updatedon";

/// Label names set by the gateway grouping key or by the row mapping.
pub const RESERVED_LABELS: [&str; 3] = ["job", "instance", "id"];

/// Top-level application configuration.
#[derive(Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub source: SourceConfig,
    pub gateway: GatewayConfig,
    pub show_secrets: bool,
}

/// Where and how to connect to PostgreSQL.
#[derive(Debug)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: SecretString,
    pub ssl_mode: PgSslMode,
    pub connect_timeout_secs: u64,
    pub query_timeout_secs: u64,
}

/// What to read and how rows map to samples.
#[derive(Debug)]
pub struct SourceConfig {
    pub table: String,
    pub query: String,
    pub custom_query: bool,
    pub columns: ColumnMapping,
    /// `<db>_<table>`, sanitized; every metric name starts with it.
    pub metric_prefix: String,
}

/// Result columns feeding the `id` label, the value and the update timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub id: String,
    pub value: String,
    pub updatedon: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            id: DEFAULT_ID_COLUMN.to_string(),
            value: DEFAULT_VALUE_COLUMN.to_string(),
            updatedon: DEFAULT_UPDATEDON_COLUMN.to_string(),
        }
    }
}

/// PushGateway target and grouping key.
#[derive(Debug)]
pub struct GatewayConfig {
    pub url: Url,
    pub auth: Option<BasicAuth>,
    pub job: String,
    pub instance: String,
    pub static_labels: Vec<(String, String)>,
    pub timeout_secs: u64,
}

#[derive(Debug)]
pub struct BasicAuth {
    pub username: String,
    pub password: SecretString,
}

/// Treat empty strings as unset.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Replace every character outside `[A-Za-z0-9_]` with `_`.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn required(value: Option<&String>, var: &str) -> Result<String, DbpushError> {
    non_empty(value.map(String::as_str))
        .map(str::to_string)
        .ok_or_else(|| DbpushError::Config {
            message: format!("{var} is not set"),
        })
}

fn optional(value: Option<&String>) -> Option<String> {
    non_empty(value.map(String::as_str)).map(str::to_string)
}

fn parse_number<T: FromStr>(value: Option<&String>, var: &str, default: T) -> Result<T, DbpushError> {
    match non_empty(value.map(String::as_str)) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| DbpushError::Config {
            message: format!("{var} is not a valid number: '{raw}'"),
        }),
    }
}

fn parse_timeout(value: Option<&String>, var: &str) -> Result<u64, DbpushError> {
    let secs = parse_number(value, var, DEFAULT_TIMEOUT_SECS)?;
    if secs == 0 {
        return Err(DbpushError::Config {
            message: format!("{var} must be greater than zero"),
        });
    }
    Ok(secs)
}

/// Prometheus label names: `[a-zA-Z_][a-zA-Z0-9_]*`, with `__` reserved.
pub fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with("__")
}

/// Parse `k=v,k2=v2` into ordered label pairs.
pub fn parse_static_labels(raw: &str) -> Result<Vec<(String, String)>, DbpushError> {
    let mut labels: Vec<(String, String)> = Vec::new();

    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').ok_or_else(|| DbpushError::Config {
            message: format!("STATIC_LABELS entry '{pair}' is not of the form name=value"),
        })?;
        let name = name.trim();

        if !is_valid_label_name(name) {
            return Err(DbpushError::Config {
                message: format!("STATIC_LABELS has invalid label name '{name}'"),
            });
        }
        if RESERVED_LABELS.contains(&name) {
            return Err(DbpushError::Config {
                message: format!("STATIC_LABELS cannot set reserved label '{name}'"),
            });
        }
        if labels.iter().any(|(existing, _)| existing == name) {
            return Err(DbpushError::Config {
                message: format!("STATIC_LABELS sets '{name}' more than once"),
            });
        }

        labels.push((name.to_string(), value.trim().to_string()));
    }

    Ok(labels)
}

fn parse_gateway_url(raw: &str) -> Result<Url, DbpushError> {
    let url = Url::parse(raw).map_err(|e| DbpushError::Config {
        message: format!("PUSHGATEWAY_URL is not a valid URL: {e}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(DbpushError::Config {
            message: format!("PUSHGATEWAY_URL must be an http(s) URL, got '{raw}'"),
        });
    }
    Ok(url)
}

fn resolve_query(args: &RunArgs, table: &str, columns: &ColumnMapping) -> Result<(String, bool), DbpushError> {
    let Some(sql) = optional(args.query.as_ref()) else {
        return Ok((select_statement(table, columns), false));
    };

    match validation::validate(&sql) {
        ValidationResult::Safe => Ok((sql, true)),
        ValidationResult::Denied { reasons } => {
            let detail = reasons
                .iter()
                .map(|r| r.detail.clone())
                .collect::<Vec<_>>()
                .join("; ");
            Err(DbpushError::Config {
                message: format!("QUERY rejected: {detail}"),
            })
        }
    }
}

/// Build the run configuration, failing on the first missing or invalid variable.
pub fn load(args: &RunArgs, show_secrets: bool) -> Result<AppConfig, DbpushError> {
    let host = required(args.db_host.as_ref(), "DB_HOST")?;
    let db_name = required(args.db_name.as_ref(), "DB_NAME")?;
    let user = required(args.db_user.as_ref(), "DB_USER")?;
    let password = SecretString::from(required(args.db_pass.as_ref(), "DB_PASS")?);
    let table = required(args.table_name.as_ref(), "TABLE_NAME")?;
    let gateway_url = required(args.pushgateway_url.as_ref(), "PUSHGATEWAY_URL")?;

    let port = parse_number(args.db_port.as_ref(), "DB_PORT", DEFAULT_DB_PORT)?;

    let ssl_mode = match optional(args.db_sslmode.as_ref()) {
        None => PgSslMode::Prefer,
        Some(mode) => PgSslMode::from_str(&mode).map_err(|_| DbpushError::Config {
            message: format!(
                "DB_SSLMODE '{mode}' is not one of disable, allow, prefer, require, verify-ca, verify-full"
            ),
        })?,
    };

    let columns = ColumnMapping {
        id: optional(args.id_column.as_ref()).unwrap_or_else(|| DEFAULT_ID_COLUMN.to_string()),
        value: optional(args.value_column.as_ref())
            .unwrap_or_else(|| DEFAULT_VALUE_COLUMN.to_string()),
        updatedon: optional(args.updatedon_column.as_ref())
            .unwrap_or_else(|| DEFAULT_UPDATEDON_COLUMN.to_string()),
    };

    let (query, custom_query) = resolve_query(args, &table, &columns)?;

    let url = parse_gateway_url(&gateway_url)?;

    let auth = match (
        optional(args.pushgateway_username.as_ref()),
        optional(args.pushgateway_password.as_ref()),
    ) {
        (Some(username), Some(password)) => Some(BasicAuth {
            username,
            password: SecretString::from(password),
        }),
        (None, None) => None,
        (Some(_), None) => {
            return Err(DbpushError::Config {
                message: "PUSHGATEWAY_PASSWORD is not set but PUSHGATEWAY_USERNAME is".to_string(),
            });
        }
        (None, Some(_)) => {
            return Err(DbpushError::Config {
                message: "PUSHGATEWAY_USERNAME is not set but PUSHGATEWAY_PASSWORD is".to_string(),
            });
        }
    };

    let metric_prefix = format!("{}_{}", sanitize(&db_name), sanitize(&table));

    // The grouping key defaults cascade: prefix -> job -> instance.
    let job = sanitize(&optional(args.job_name.as_ref()).unwrap_or_else(|| metric_prefix.clone()));
    let instance = sanitize(&optional(args.instance_name.as_ref()).unwrap_or_else(|| job.clone()));

    let static_labels = match optional(args.static_labels.as_ref()) {
        Some(raw) => parse_static_labels(&raw)?,
        None => Vec::new(),
    };

    let connect_timeout_secs = parse_timeout(args.connect_timeout.as_ref(), "CONNECT_TIMEOUT")?;
    let query_timeout_secs = parse_timeout(args.query_timeout.as_ref(), "QUERY_TIMEOUT")?;
    let push_timeout_secs = parse_timeout(args.push_timeout.as_ref(), "PUSH_TIMEOUT")?;

    Ok(AppConfig {
        database: DatabaseConfig {
            host,
            port,
            name: db_name,
            user,
            password,
            ssl_mode,
            connect_timeout_secs,
            query_timeout_secs,
        },
        source: SourceConfig {
            table,
            query,
            custom_query,
            columns,
            metric_prefix,
        },
        gateway: GatewayConfig {
            url,
            auth,
            job,
            instance,
            static_labels,
            timeout_secs: push_timeout_secs,
        },
        show_secrets,
    })
}

impl AppConfig {
    /// One-line summary for diagnostics, with secrets masked unless `show_secrets` is set.
    pub fn describe(&self) -> String {
        let db = &self.database;
        let gw = &self.gateway;
        format!(
            "db={}@{}:{}/{} password={} sslmode={:?} table={} custom_query={} \
             gateway={} gateway_password={} job={} instance={} static_labels={}",
            db.user,
            db.host,
            db.port,
            db.name,
            redact(&db.password, self.show_secrets),
            db.ssl_mode,
            self.source.table,
            self.source.custom_query,
            redact_url(&gw.url, self.show_secrets),
            redact_optional(gw.auth.as_ref().map(|a| &a.password), self.show_secrets),
            gw.job,
            gw.instance,
            gw.static_labels.len(),
        )
    }
}

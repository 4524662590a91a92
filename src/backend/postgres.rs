use crate::backend::{Backend, CellValue, ColumnMeta, QueryResult, Row};
use crate::config::{ColumnMapping, DatabaseConfig};
use crate::error::DbpushError;
use crate::logging::Timer;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use secrecy::ExposeSecret;
use sqlx::postgres::{PgConnectOptions, PgRow};
use sqlx::{Column, ConnectOptions, Connection, PgConnection, Row as _, TypeInfo, ValueRef};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Quote a PostgreSQL identifier, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// The default query: the three mapped columns of one table.
pub fn select_statement(table: &str, columns: &ColumnMapping) -> String {
    format!(
        "SELECT {}, {}, {} FROM {}",
        quote_ident(&columns.id),
        quote_ident(&columns.value),
        quote_ident(&columns.updatedon),
        quote_ident(table)
    )
}

pub struct PostgresBackend {
    options: PgConnectOptions,
    endpoint: String,
    connect_timeout: Duration,
    query_timeout: Duration,
}

impl PostgresBackend {
    pub fn new(config: &DatabaseConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.name)
            .username(&config.user)
            .password(config.password.expose_secret())
            .ssl_mode(config.ssl_mode)
            .application_name(env!("CARGO_PKG_NAME"))
            .disable_statement_logging();

        Self {
            options,
            endpoint: format!("{}:{}/{}", config.host, config.port, config.name),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            query_timeout: Duration::from_secs(config.query_timeout_secs),
        }
    }

    async fn connect(&self) -> Result<PgConnection, DbpushError> {
        match tokio::time::timeout(self.connect_timeout, PgConnection::connect_with(&self.options))
            .await
        {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => Err(DbpushError::Connection {
                message: format!("cannot connect to {}: {}", self.endpoint, e),
            }),
            Err(_) => Err(DbpushError::Connection {
                message: format!(
                    "timed out after {}s connecting to {}",
                    self.connect_timeout.as_secs(),
                    self.endpoint
                ),
            }),
        }
    }
}

impl Backend for PostgresBackend {
    async fn fetch(&self, sql: &str) -> Result<QueryResult, DbpushError> {
        let timer = Timer::start();
        let mut conn = self.connect().await?;
        debug!(endpoint = %self.endpoint, elapsed_ms = timer.elapsed_ms(), "connected");

        let result = run_query(&mut conn, sql, self.query_timeout).await;

        if let Err(e) = conn.close().await {
            warn!(error = %e, "failed to close database connection cleanly");
        } else {
            debug!("database connection closed");
        }

        result
    }
}

async fn run_query(
    conn: &mut PgConnection,
    sql: &str,
    limit: Duration,
) -> Result<QueryResult, DbpushError> {
    let pg_rows = match tokio::time::timeout(limit, sqlx::query(sql).fetch_all(&mut *conn)).await {
        Ok(Ok(rows)) => rows,
        Ok(Err(e)) => {
            return Err(DbpushError::Query {
                message: format!("query execution failed: {}", e),
            });
        }
        Err(_) => {
            return Err(DbpushError::Query {
                message: format!("query timed out after {}s", limit.as_secs()),
            });
        }
    };

    let columns = pg_rows
        .first()
        .map(|row| {
            row.columns()
                .iter()
                .map(|c| ColumnMeta {
                    name: c.name().to_string(),
                    type_name: c.type_info().name().to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    let rows = pg_rows
        .iter()
        .map(decode_row)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(QueryResult { columns, rows })
}

fn decode_row(row: &PgRow) -> Result<Row, DbpushError> {
    let cells = row
        .columns()
        .iter()
        .map(|col| -> Result<(String, CellValue), DbpushError> {
            Ok((col.name().to_string(), decode_cell(row, col.ordinal(), col.name())?))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Row::new(cells))
}

fn decode_cell(row: &PgRow, idx: usize, column: &str) -> Result<CellValue, DbpushError> {
    let decode_err = |e: sqlx::Error| DbpushError::Query {
        message: format!("cannot decode column '{}': {}", column, e),
    };

    let raw = row.try_get_raw(idx).map_err(decode_err)?;
    if raw.is_null() {
        return Ok(CellValue::Null);
    }
    let type_name = raw.type_info().name().to_string();

    let cell = match type_name.as_str() {
        // sqlx reports `char(n)` as CHAR.
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => {
            CellValue::Text(row.try_get::<String, _>(idx).map_err(decode_err)?)
        }
        "UUID" => CellValue::Text(row.try_get::<Uuid, _>(idx).map_err(decode_err)?.to_string()),
        "INT2" => CellValue::Number(f64::from(row.try_get::<i16, _>(idx).map_err(decode_err)?)),
        "INT4" => CellValue::Number(f64::from(row.try_get::<i32, _>(idx).map_err(decode_err)?)),
        "INT8" => CellValue::Number(row.try_get::<i64, _>(idx).map_err(decode_err)? as f64),
        "FLOAT4" => CellValue::Number(f64::from(row.try_get::<f32, _>(idx).map_err(decode_err)?)),
        "FLOAT8" => CellValue::Number(row.try_get::<f64, _>(idx).map_err(decode_err)?),
        "NUMERIC" => {
            let decimal = row.try_get::<Decimal, _>(idx).map_err(decode_err)?;
            let value = decimal.to_f64().ok_or_else(|| DbpushError::Query {
                message: format!("column '{}' value {} does not fit a float", column, decimal),
            })?;
            CellValue::Number(value)
        }
        "BOOL" => {
            let flag = row.try_get::<bool, _>(idx).map_err(decode_err)?;
            CellValue::Number(if flag { 1.0 } else { 0.0 })
        }
        "TIMESTAMPTZ" => {
            CellValue::Timestamp(row.try_get::<DateTime<Utc>, _>(idx).map_err(decode_err)?)
        }
        // Naive timestamps are read as UTC.
        "TIMESTAMP" => CellValue::Timestamp(
            row.try_get::<NaiveDateTime, _>(idx)
                .map_err(decode_err)?
                .and_utc(),
        ),
        "DATE" => CellValue::Timestamp(
            row.try_get::<NaiveDate, _>(idx)
                .map_err(decode_err)?
                .and_time(NaiveTime::MIN)
                .and_utc(),
        ),
        other => {
            return Err(DbpushError::Query {
                message: format!("column '{}' has unsupported type {}", column, other),
            });
        }
    };

    Ok(cell)
}

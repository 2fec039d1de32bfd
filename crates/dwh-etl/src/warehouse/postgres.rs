//! Postgres wire-protocol warehouse connection (Redshift compatible)

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{Column, Connection, Executor, Row, TypeInfo, ValueRef};
use std::time::Duration;
use tracing::{debug, info, instrument};

use super::{Scalar, Warehouse, WarehouseError};
use crate::config::ClusterConfig;

/// Single exclusive connection used for a whole pipeline run
///
/// Statements go through the simple query protocol: the pipeline only issues
/// parameterless DDL, COPY and INSERT ... SELECT text, and Redshift handles
/// those more reliably unprepared.
pub struct PgWarehouse {
    conn: Option<PgConnection>,
}

impl PgWarehouse {
    /// Open the connection described by the cluster settings
    #[instrument(skip(cluster), fields(host = %cluster.host, database = %cluster.db_name))]
    pub async fn connect(cluster: &ClusterConfig) -> Result<Self, WarehouseError> {
        let options = PgConnectOptions::new()
            .host(&cluster.host)
            .port(cluster.db_port)
            .database(&cluster.db_name)
            .username(&cluster.db_user)
            .password(&cluster.db_password)
            .ssl_mode(cluster.ssl_mode.into())
            .application_name("dwh-etl");

        let conn = tokio::time::timeout(
            Duration::from_secs(cluster.connect_timeout_secs),
            PgConnection::connect_with(&options),
        )
        .await
        .map_err(|_| WarehouseError::Timeout(cluster.connect_timeout_secs))??;

        info!(port = cluster.db_port, "Warehouse connection established");

        Ok(Self { conn: Some(conn) })
    }

    fn conn(&mut self) -> Result<&mut PgConnection, WarehouseError> {
        self.conn.as_mut().ok_or(WarehouseError::Closed)
    }
}

#[async_trait]
impl Warehouse for PgWarehouse {
    async fn execute(&mut self, sql: &str) -> Result<u64, WarehouseError> {
        let conn = self.conn()?;
        let mut tx = conn.begin().await?;
        let result = (&mut *tx).execute(sqlx::raw_sql(sql)).await?;
        tx.commit().await?;

        debug!(rows_affected = result.rows_affected(), "Statement committed");
        Ok(result.rows_affected())
    }

    async fn fetch_scalar(&mut self, sql: &str) -> Result<Option<Scalar>, WarehouseError> {
        let conn = self.conn()?;
        let rows = conn.fetch_all(sqlx::raw_sql(sql)).await?;

        first_scalar(&rows, decode_scalar)
    }

    async fn close(&mut self) -> Result<(), WarehouseError> {
        match self.conn.take() {
            Some(conn) => {
                conn.close().await?;
                info!("Warehouse connection closed");
                Ok(())
            },
            None => Err(WarehouseError::Closed),
        }
    }
}

/// Scalar of the first returned row; extra rows are ignored
fn first_scalar<R>(
    rows: &[R],
    decode: impl FnOnce(&R) -> Result<Scalar, WarehouseError>,
) -> Result<Option<Scalar>, WarehouseError> {
    rows.first().map(decode).transpose()
}

/// Decode the first column of a row into a comparable scalar
fn decode_scalar(row: &PgRow) -> Result<Scalar, WarehouseError> {
    let column = row
        .columns()
        .first()
        .ok_or_else(|| WarehouseError::Decode("probe returned no columns".to_string()))?;

    if row.try_get_raw(0)?.is_null() {
        return Ok(Scalar::Null);
    }

    let scalar = match column.type_info().name() {
        "INT8" => Scalar::Int(row.try_get::<i64, _>(0)?),
        "INT4" => Scalar::Int(i64::from(row.try_get::<i32, _>(0)?)),
        "INT2" => Scalar::Int(i64::from(row.try_get::<i16, _>(0)?)),
        "FLOAT8" => Scalar::Float(row.try_get::<f64, _>(0)?),
        "FLOAT4" => Scalar::Float(f64::from(row.try_get::<f32, _>(0)?)),
        "BOOL" => Scalar::Bool(row.try_get::<bool, _>(0)?),
        "NUMERIC" => {
            let text = row.try_get_unchecked::<String, _>(0)?;
            text.parse::<i64>()
                .map(Scalar::Int)
                .or_else(|_| text.parse::<f64>().map(Scalar::Float))
                .map_err(|_| WarehouseError::Decode(format!("NUMERIC value '{}'", text)))?
        },
        "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" => {
            Scalar::Text(row.try_get_unchecked::<String, _>(0)?)
        },
        other => return Err(WarehouseError::Decode(format!("column type {}", other))),
    };

    Ok(scalar)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_int(row: &i64) -> Result<Scalar, WarehouseError> {
        Ok(Scalar::Int(*row))
    }

    #[test]
    fn test_first_scalar_without_rows() {
        let rows: Vec<i64> = Vec::new();
        assert!(first_scalar(&rows, decode_int).unwrap().is_none());
    }

    #[test]
    fn test_first_scalar_single_row() {
        assert_eq!(first_scalar(&[7], decode_int).unwrap(), Some(Scalar::Int(7)));
    }

    #[test]
    fn test_first_scalar_ignores_extra_rows() {
        assert_eq!(first_scalar(&[3, 4, 5], decode_int).unwrap(), Some(Scalar::Int(3)));
    }

    #[test]
    fn test_first_scalar_propagates_decode_error() {
        let result = first_scalar(&[1], |_: &i64| Err(WarehouseError::Decode("bad".to_string())));
        assert!(matches!(result, Err(WarehouseError::Decode(_))));
    }
}

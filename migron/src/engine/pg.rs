use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_query::{ColumnDef, Expr, ExprTrait, Index, PostgresQueryBuilder, Query, Table};
use sea_query_binder::SqlxBinder;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use uuid::Uuid;

use crate::config::PgConfig;
use crate::engine::{AppliedStep, Engine};
use crate::error::{ProvisionError, Result};

#[derive(sea_query::Iden)]
enum SchemaHistory {
    Table,
    Service,
    Version,
    Checksum,
    AppliedAt,
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    service: String,
    version: i32,
    checksum: String,
    applied_at: DateTime<Utc>,
}

const TENANT_CONTEXT_SQL: &str = r#"
CREATE OR REPLACE FUNCTION set_current_tenant(tenant uuid) RETURNS void AS $$
    SELECT set_config('app.current_tenant', tenant::text, false);
$$ LANGUAGE sql;

CREATE OR REPLACE FUNCTION current_tenant() RETURNS uuid AS $$
BEGIN
    RETURN NULLIF(current_setting('app.current_tenant', true), '')::uuid;
EXCEPTION WHEN others THEN
    RETURN NULL;
END;
$$ LANGUAGE plpgsql STABLE;

CREATE OR REPLACE FUNCTION touch_updated_at() RETURNS trigger AS $$
BEGIN
    NEW.updated_at = now();
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;
"#;

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Postgres engine. Holds two pools: one against the administrative
/// database for bootstrap work that cannot run in the target database, and
/// one against the target database for everything else.
#[derive(Debug, Clone)]
pub struct Pg {
    pool: PgPool,
    admin: PgPool,
}

impl Pg {
    /// Opens the administrative connection, creates the target database if
    /// absent, then opens the target pool. Connect failures map to
    /// `ProvisionError::Connection` so operators can tell "unreachable"
    /// from "migration content problem".
    pub async fn connect(config: &PgConfig) -> Result<Self> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.username)
            .password(&config.password);

        let admin = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone().database(&config.admin_database))
            .await
            .map_err(ProvisionError::Connection)?;

        ensure_database_on(&admin, &config.database).await?;

        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect_with(options.database(&config.database))
            .await
            .map_err(ProvisionError::Connection)?;

        Ok(Self { pool, admin })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

async fn ensure_database_on(admin: &PgPool, name: &str) -> Result<bool> {
    let exists = sqlx::query_scalar::<_, i32>("SELECT 1 FROM pg_database WHERE datname = $1")
        .bind(name)
        .fetch_optional(admin)
        .await?
        .is_some();

    if exists {
        return Ok(false);
    }

    // CREATE DATABASE cannot run inside a transaction; sqlx executes this
    // in autocommit, which is what we need here.
    sqlx::query(&format!("CREATE DATABASE {}", quote_ident(name)))
        .execute(admin)
        .await?;

    Ok(true)
}

#[async_trait]
impl Engine for Pg {
    async fn ensure_database(&self, name: &str) -> Result<bool> {
        ensure_database_on(&self.admin, name).await
    }

    async fn ensure_schema(&self, name: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, i32>(
            "SELECT 1 FROM information_schema.schemata WHERE schema_name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        .is_some();

        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(name)))
            .execute(&self.pool)
            .await?;

        Ok(!exists)
    }

    async fn ensure_extension(&self, name: &str) -> Result<()> {
        sqlx::query(&format!(
            "CREATE EXTENSION IF NOT EXISTS {}",
            quote_ident(name)
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn ensure_history(&self) -> Result<()> {
        let statement = Table::create()
            .table(SchemaHistory::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(SchemaHistory::Service)
                    .string()
                    .string_len(64)
                    .not_null(),
            )
            .col(ColumnDef::new(SchemaHistory::Version).integer().not_null())
            .col(
                ColumnDef::new(SchemaHistory::Checksum)
                    .string()
                    .string_len(64)
                    .not_null(),
            )
            .col(
                ColumnDef::new(SchemaHistory::AppliedAt)
                    .timestamp_with_time_zone()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .primary_key(
                Index::create()
                    .col(SchemaHistory::Service)
                    .col(SchemaHistory::Version),
            )
            .to_owned();

        sqlx::query(&statement.to_string(PostgresQueryBuilder))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn record(&self, service: &str, version: u32) -> Result<Option<AppliedStep>> {
        let (sql, values) = Query::select()
            .columns([
                SchemaHistory::Service,
                SchemaHistory::Version,
                SchemaHistory::Checksum,
                SchemaHistory::AppliedAt,
            ])
            .from(SchemaHistory::Table)
            .and_where(Expr::col(SchemaHistory::Service).eq(service))
            .and_where(Expr::col(SchemaHistory::Version).eq(version as i32))
            .build_sqlx(PostgresQueryBuilder);

        let row = sqlx::query_as_with::<_, HistoryRow, _>(&sql, values)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| AppliedStep {
            service: row.service,
            version: row.version as u32,
            checksum: row.checksum,
            applied_at: row.applied_at,
        }))
    }

    async fn apply(&self, payload: &str, record: AppliedStep) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::raw_sql(payload).execute(&mut *tx).await?;

        let (sql, values) = Query::insert()
            .into_table(SchemaHistory::Table)
            .columns([
                SchemaHistory::Service,
                SchemaHistory::Version,
                SchemaHistory::Checksum,
                SchemaHistory::AppliedAt,
            ])
            .values_panic([
                record.service.into(),
                (record.version as i32).into(),
                record.checksum.into(),
                record.applied_at.into(),
            ])
            .build_sqlx(PostgresQueryBuilder);

        sqlx::query_with(&sql, values).execute(&mut *tx).await?;

        tx.commit().await?;

        Ok(())
    }

    async fn install_tenant_context(&self) -> Result<()> {
        sqlx::raw_sql(TENANT_CONTEXT_SQL).execute(&self.pool).await?;

        Ok(())
    }

    async fn current_tenant(&self) -> Result<Option<Uuid>> {
        let tenant = sqlx::query_scalar::<_, Option<Uuid>>("SELECT current_tenant()")
            .fetch_one(&self.pool)
            .await?;

        Ok(tenant)
    }

    async fn tenant_roundtrip(&self, tenant: Uuid) -> Result<Option<Uuid>> {
        // set_config with is_local = false is session-scoped, so set and
        // read must share one connection.
        let mut conn = self.pool.acquire().await?;

        sqlx::query("SELECT set_current_tenant($1)")
            .bind(tenant)
            .execute(&mut *conn)
            .await?;

        let got = sqlx::query_scalar::<_, Option<Uuid>>("SELECT current_tenant()")
            .fetch_one(&mut *conn)
            .await?;

        Ok(got)
    }
}

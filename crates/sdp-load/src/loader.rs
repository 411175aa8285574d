//! Staging-to-production loader
//!
//! Reads the raw CSVs produced by the ingestion stage and loads each one
//! into the staging schema, then promotes it into production. The staging
//! write fully replaces any previous table of the same name; promotion runs
//! the drop of the old production table and the `ALTER TABLE ... SET SCHEMA`
//! inside a single transaction. Promoted tables are verified by row count.

use crate::db::{qualified, quote_ident, DbError};
use futures::stream::{self, StreamExt};
use sdp_common::table::KEY_COLUMNS;
use sdp_common::{DataSource, PipelineConfig, TableError, WideTable};
use sqlx::PgPool;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info, warn};

/// Upper bound on bind parameters per INSERT statement; Postgres caps a
/// statement at u16::MAX binds, this leaves headroom.
const MAX_BIND_PARAMS: usize = 60_000;

/// Errors raised while loading a table
#[derive(Error, Debug)]
pub enum LoadError {
    /// A SQL statement failed
    #[error(transparent)]
    Db(#[from] DbError),

    /// An input CSV could not be read
    #[error(transparent)]
    Table(#[from] TableError),

    /// The promoted table does not hold the rows that were staged
    #[error("row count mismatch after promoting '{table}': staged {staged}, found {found}")]
    Verification {
        table: String,
        staged: i64,
        found: i64,
    },

    /// One or more tables failed; the rest were still loaded
    #[error("{failed} of {total} tables failed to load")]
    Incomplete { failed: usize, total: usize },
}

impl From<sqlx::Error> for LoadError {
    fn from(err: sqlx::Error) -> Self {
        LoadError::Db(DbError::Sqlx(err))
    }
}

pub type LoadResult<T> = Result<T, LoadError>;

/// Loads wide tables into staging and promotes them to production.
pub struct Loader {
    pool: PgPool,
    staging_schema: String,
    production_schema: String,
    workers: usize,
}

impl Loader {
    /// Create a loader over an existing pool
    pub fn new(pool: PgPool, config: &PipelineConfig) -> Self {
        Self {
            pool,
            staging_schema: config.staging_schema.clone(),
            production_schema: config.production_schema.clone(),
            workers: config.load_workers.max(1),
        }
    }

    /// Load every configured source's CSV from `data_dir` and promote the
    /// resulting tables, `self.workers` tables at a time.
    ///
    /// A missing CSV skips its source; a failed load is logged and counted,
    /// and the run ends with [`LoadError::Incomplete`] once every table has
    /// been attempted.
    pub async fn run(&self, data_dir: &Path, sources: &[DataSource]) -> LoadResult<()> {
        info!("starting data load from {}", data_dir.display());

        self.ensure_schemas().await?;

        let tables = read_input_csvs(data_dir, sources)?;
        if tables.is_empty() {
            warn!("no input CSV files found, nothing to load");
            return Ok(());
        }

        info!(
            "loading {} tables with {} concurrent workers",
            tables.len(),
            self.workers
        );

        let results: Vec<(String, LoadResult<()>)> = stream::iter(tables)
            .map(|(name, table)| {
                let loader = self;
                async move {
                    let outcome = loader.load_and_promote(&name, &table).await;
                    (name, outcome)
                }
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let total = results.len();
        let mut failed = 0usize;
        for (name, outcome) in results {
            match outcome {
                Ok(()) => info!(table = %name, "table loaded and promoted"),
                Err(err) => {
                    failed += 1;
                    error!(table = %name, "table load failed: {err}");
                },
            }
        }

        if failed > 0 {
            return Err(LoadError::Incomplete { failed, total });
        }

        info!("data load finished");
        Ok(())
    }

    /// Create the staging and production schemas when absent
    pub async fn ensure_schemas(&self) -> LoadResult<()> {
        for schema in [&self.staging_schema, &self.production_schema] {
            self.execute(&format!(
                "CREATE SCHEMA IF NOT EXISTS {}",
                quote_ident(schema)
            ))
            .await?;
        }
        Ok(())
    }

    /// Execute one raw statement
    pub async fn execute(&self, sql: &str) -> LoadResult<()> {
        sqlx::query(sql).execute(&self.pool).await?;
        Ok(())
    }

    /// Replace the staging table with `table`'s rows, promote it into the
    /// production schema, and verify the promoted row count.
    pub async fn load_and_promote(&self, name: &str, table: &WideTable) -> LoadResult<()> {
        self.replace_staging(name, table).await?;
        self.promote(name).await?;
        self.verify(name, table.len() as i64).await
    }

    /// Drop and recreate the staging table, then insert all rows in chunks
    async fn replace_staging(&self, name: &str, table: &WideTable) -> LoadResult<()> {
        let staged = qualified(&self.staging_schema, name);

        self.execute(&format!("DROP TABLE IF EXISTS {staged}")).await?;
        self.execute(&create_table_sql(&self.staging_schema, name, table))
            .await?;

        let column_count = KEY_COLUMNS.len() + table.years.len();
        for chunk in table.rows.chunks(rows_per_chunk(column_count)) {
            let sql = insert_sql(&self.staging_schema, name, table, chunk.len());
            let mut query = sqlx::query(&sql);
            for row in chunk {
                query = query
                    .bind(row.country_code.as_str())
                    .bind(row.country_name.as_str())
                    .bind(row.indicator_code.as_str())
                    .bind(row.indicator_name.as_str());
                for value in &row.values {
                    query = query.bind(*value);
                }
            }
            query.execute(&self.pool).await?;
        }

        info!(
            table = %name,
            "staged {} rows into {}",
            table.len(),
            staged
        );
        Ok(())
    }

    /// Swap the staged table into production atomically
    async fn promote(&self, name: &str) -> LoadResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "DROP TABLE IF EXISTS {}",
            qualified(&self.production_schema, name)
        ))
        .execute(&mut *tx)
        .await?;

        sqlx::query(&format!(
            "ALTER TABLE {} SET SCHEMA {}",
            qualified(&self.staging_schema, name),
            quote_ident(&self.production_schema)
        ))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(table = %name, "promoted from {} to {}", self.staging_schema, self.production_schema);
        Ok(())
    }

    /// Compare the promoted table's row count against the staged count
    async fn verify(&self, name: &str, staged: i64) -> LoadResult<()> {
        let (found,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM {}",
            qualified(&self.production_schema, name)
        ))
        .fetch_one(&self.pool)
        .await?;

        if found != staged {
            return Err(LoadError::Verification {
                table: name.to_string(),
                staged,
                found,
            });
        }
        Ok(())
    }
}

/// Read each configured source's CSV; missing files are logged and skipped.
pub fn read_input_csvs(
    data_dir: &Path,
    sources: &[DataSource],
) -> LoadResult<Vec<(String, WideTable)>> {
    let mut tables = Vec::with_capacity(sources.len());

    for source in sources {
        let path = data_dir.join(format!("{}.csv", source.filename));
        if !path.exists() {
            error!(source = %source.name, "file not found: {}", path.display());
            continue;
        }

        info!(source = %source.name, "reading {}", path.display());
        let table = WideTable::read_csv(&path)?;
        tables.push((source.name.clone(), table));
    }

    Ok(tables)
}

/// CREATE TABLE statement matching a wide table's layout: TEXT key columns
/// followed by one DOUBLE PRECISION column per year.
fn create_table_sql(schema: &str, name: &str, table: &WideTable) -> String {
    let columns: Vec<String> = KEY_COLUMNS
        .iter()
        .map(|c| format!("{} TEXT", quote_ident(c)))
        .chain(
            table
                .years
                .iter()
                .map(|y| format!("{} DOUBLE PRECISION", quote_ident(&WideTable::year_label(*y)))),
        )
        .collect();

    format!(
        "CREATE TABLE {} ({})",
        qualified(schema, name),
        columns.join(", ")
    )
}

/// Multi-row INSERT statement with positional placeholders for `row_count`
/// rows.
fn insert_sql(schema: &str, name: &str, table: &WideTable, row_count: usize) -> String {
    let column_names: Vec<String> = KEY_COLUMNS
        .iter()
        .map(|c| quote_ident(c))
        .chain(
            table
                .years
                .iter()
                .map(|y| quote_ident(&WideTable::year_label(*y))),
        )
        .collect();
    let column_count = column_names.len();

    let mut placeholder = 1usize;
    let rows: Vec<String> = (0..row_count)
        .map(|_| {
            let binds: Vec<String> = (0..column_count)
                .map(|_| {
                    let p = format!("${placeholder}");
                    placeholder += 1;
                    p
                })
                .collect();
            format!("({})", binds.join(", "))
        })
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES {}",
        qualified(schema, name),
        column_names.join(", "),
        rows.join(", ")
    )
}

/// Rows per INSERT chunk for a given column count, bounded by the bind
/// parameter limit.
fn rows_per_chunk(column_count: usize) -> usize {
    (MAX_BIND_PARAMS / column_count.max(1)).max(1)
}

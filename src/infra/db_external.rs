use async_trait::async_trait;
use sqlx::{Column, Executor, PgPool, Row};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::infra::utils::pg_row_to_cells;
use crate::models::result_set::ResultSet;

/// 数据访问层错误。执行失败与"零行结果"严格区分，不借助字符串前缀判断
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unable to acquire database connection: {0}")]
    Connection(#[source] sqlx::Error),
    #[error("query execution failed: {0}")]
    Execution(#[source] sqlx::Error),
}

/// 只读 SQL 执行入口
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<ResultSet, StoreError>;
}

/// 每次调用都包在只读事务里，写语句由数据库拒绝
const READ_ONLY_TRANSACTION: &str = "SET TRANSACTION READ ONLY";

/// Postgres 实现：每次调用开一个只读事务，结束后回滚归还连接
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DataStore for PgStore {
    #[instrument(skip(self, sql))]
    async fn execute(&self, sql: &str) -> Result<ResultSet, StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::Connection)?;
        sqlx::query(READ_ONLY_TRANSACTION)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::Execution)?;

        let rows = sqlx::query(sql)
            .fetch_all(&mut *tx)
            .await
            .map_err(StoreError::Execution)?;

        // 零行时拿不到行上的列信息，改用 describe 取列名
        let columns: Vec<String> = match rows.first() {
            Some(first) => first.columns().iter().map(|c| c.name().to_string()).collect(),
            None => (&mut *tx)
                .describe(sql)
                .await
                .map_err(StoreError::Execution)?
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
        };
        tx.rollback().await.map_err(StoreError::Execution)?;

        let data: Vec<_> = rows.iter().map(pg_row_to_cells).collect();
        debug!("查询返回 {} 行, {} 列", data.len(), columns.len());
        Ok(ResultSet::new(columns, data))
    }
}

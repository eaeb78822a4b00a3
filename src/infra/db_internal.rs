use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::infra::config::DatabaseConfig;

/// 会话默认只读，连接串里的参数之外再加一道
fn connect_options(url: &str) -> Result<PgConnectOptions, sqlx::Error> {
    Ok(PgConnectOptions::from_str(url)?.options([("default_transaction_read_only", "on")]))
}

/// 懒连接：启动时不要求数据库可达，首次查询时才建立连接
pub fn init_pool(config: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect_lazy_with(connect_options(&config.url)?);
    info!("数据库连接池已创建 (max_connections={})", config.max_connections);
    Ok(pool)
}

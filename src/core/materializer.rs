//! 地图查询的组装与执行：提取 -> 规范化 -> 物化，线性无状态，每一步只有一个失败出口。

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::core::clause_normalizer::{build_where_clause, split_predicates, strip_geo_predicates};
use crate::core::map_render::{self, MapDocument, UNFOCUSED_ZOOM};
use crate::core::sql_extractor::{extract_bounding_box, extract_table_and_where, BoundingBox};
use crate::infra::db_external::{DataStore, StoreError};
use crate::models::result_set::ResultSet;

/// 与外部库表结构的固定约定，不做参数化
pub const MAP_PROJECTION: &str = "time, latitude, longitude, depth, temperature, salinity";

#[derive(Debug, Error)]
pub enum MapError {
    #[error("No latitude/longitude BETWEEN ... AND ... clauses found in provided SQL.")]
    MissingBoundingBox,
    #[error("No table found after FROM in provided SQL.")]
    NoTableFound,
    #[error(transparent)]
    QueryExecution(#[from] StoreError),
}

impl MapError {
    /// 输入形态错误（调用方给的 SQL 本身不可用）
    pub fn is_input_shape(&self) -> bool {
        matches!(self, MapError::MissingBoundingBox | MapError::NoTableFound)
    }
}

/// 重建后的地图查询
#[derive(Debug, Clone, PartialEq)]
pub struct MapQuery {
    pub bbox: BoundingBox,
    pub table: String,
    pub where_clause: String,
}

fn select_sql(table: &str, where_clause: &str) -> String {
    format!("SELECT {MAP_PROJECTION} FROM {table} WHERE {where_clause};")
}

/// 从任意 SQL 重建地图查询，不访问数据库
pub fn plan_map_query(sql: &str) -> Result<MapQuery, MapError> {
    let bbox = extract_bounding_box(sql).ok_or(MapError::MissingBoundingBox)?;
    let parsed = extract_table_and_where(sql);
    let table = parsed.table_name.ok_or(MapError::NoTableFound)?;
    let predicates = split_predicates(&strip_geo_predicates(&parsed.where_body));
    let where_clause = build_where_clause(&bbox, &predicates);
    Ok(MapQuery { bbox, table, where_clause })
}

/// 执行失败返回错误，零行是合法的空结果
pub async fn build_and_run(
    store: &dyn DataStore,
    table: &str,
    where_clause: &str,
) -> Result<ResultSet, MapError> {
    let sql = select_sql(table, where_clause);
    info!("地图查询: {}", sql);
    Ok(store.execute(&sql).await?)
}

/// 完整地图流程。零行时回退到以包围盒中心为中心的未聚焦地图
#[instrument(skip(store, sql))]
pub async fn generate_map(
    store: &dyn DataStore,
    sql: &str,
    padding: f64,
) -> Result<MapDocument, MapError> {
    let query = plan_map_query(sql)?;
    let rs = build_and_run(store, &query.table, &query.where_clause).await?;

    let points = map_render::points_from_result_set(&rs);
    match map_render::render_points(&points, padding) {
        Some(doc) => {
            info!("地图生成完成: {} 个点位", points.len());
            Ok(doc)
        }
        None => {
            if !rs.is_empty() {
                warn!("{} 行结果均无有效坐标，使用未聚焦地图", rs.len());
            }
            let (lat, lon) = query.bbox.center();
            Ok(map_render::render_unfocused(lat, lon, UNFOCUSED_ZOOM))
        }
    }
}

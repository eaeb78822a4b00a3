//! WHERE 子句重建：去掉经纬度范围谓词，按 AND 拆分剩余条件，
//! 再把标准化后的包围盒谓词放在最前面重新拼接。

use regex::Regex;
use std::sync::LazyLock;

use crate::core::sql_extractor::{BoundingBox, LATITUDE_RANGE, LONGITUDE_RANGE};

static AND_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bAND\b").expect("valid AND pattern"));

static STRAY_AND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(^\s*AND\s+)|(\s+AND\s*$)").expect("valid stray AND pattern")
});

/// 删除所有经纬度 BETWEEN 谓词，其余文本（包括悬空的 AND）原样保留
pub fn strip_geo_predicates(where_body: &str) -> String {
    let without_lat = LATITUDE_RANGE.replace_all(where_body, "");
    LONGITUDE_RANGE.replace_all(&without_lat, "").into_owned()
}

/// 按独立的 AND 关键字拆分谓词，保持原有顺序。
///
/// 只处理扁平的合取：含 OR 或括号的片段整体作为一个谓词透传，不做拆解。
pub fn split_predicates(text: &str) -> Vec<String> {
    AND_KEYWORD
        .split(text)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| STRAY_AND.replace_all(part, "").trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

/// SQL 数值字面量：最短往返表示，整数保留 `.0`
pub fn format_coordinate(value: f64) -> String {
    format!("{value:?}")
}

/// 固定顺序拼接：纬度范围、经度范围、其余谓词
pub fn build_where_clause(bbox: &BoundingBox, predicates: &[String]) -> String {
    let mut parts = Vec::with_capacity(predicates.len() + 2);
    parts.push(format!(
        "latitude BETWEEN {} AND {}",
        format_coordinate(bbox.lat_min),
        format_coordinate(bbox.lat_max)
    ));
    parts.push(format!(
        "longitude BETWEEN {} AND {}",
        format_coordinate(bbox.lon_min),
        format_coordinate(bbox.lon_max)
    ));
    parts.extend(predicates.iter().cloned());
    parts.join(" AND ")
}

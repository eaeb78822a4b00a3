//! 从 LLM 生成的 SQL 文本中恢复表名、WHERE 子句和经纬度范围。
//!
//! 这里把 SQL 当作受限文本处理：输入只会是单表、扁平 AND 连接的查询，
//! 正则足够应付。调用方只依赖本模块的函数签名，将来可以替换成真正的 SQL 解析器。

use regex::Regex;
use std::sync::LazyLock;

/// 数值语法：可选符号、整数部分、可选小数部分。只认 ASCII 数字，和 f64 解析保持一致
pub(crate) const NUMBER: &str = r"[+-]?[0-9]+(?:\.[0-9]+)?";

pub(crate) static LATITUDE_RANGE: LazyLock<Regex> = LazyLock::new(|| geo_range("latitude"));
pub(crate) static LONGITUDE_RANGE: LazyLock<Regex> = LazyLock::new(|| geo_range("longitude"));

static FROM_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)FROM\s+([^\s;]+)").expect("valid FROM pattern")
});

// regex crate 不支持前瞻，终止关键字用非捕获分组吃掉即可
static WHERE_BODY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)WHERE\s+(.*?)(?:GROUP\s+BY|ORDER\s+BY|LIMIT\b|;|$)")
        .expect("valid WHERE pattern")
});

fn geo_range(column: &str) -> Regex {
    let pattern = format!(r"(?i){column}\s+BETWEEN\s*({NUMBER})\s+AND\s*({NUMBER})");
    Regex::new(&pattern).expect("valid geo range pattern")
}

/// 经纬度包围盒，构造后保证 min <= max
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    /// 任一轴给反了都会被交换
    pub fn new(lat_a: f64, lat_b: f64, lon_a: f64, lon_b: f64) -> Self {
        let (lat_min, lat_max) = ordered(lat_a, lat_b);
        let (lon_min, lon_max) = ordered(lon_a, lon_b);
        Self { lat_min, lat_max, lon_min, lon_max }
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.lat_min + self.lat_max) / 2.0,
            (self.lon_min + self.lon_max) / 2.0,
        )
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a > b {
        (b, a)
    } else {
        (a, b)
    }
}

/// 表名与 WHERE 子句正文
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedStatement {
    pub table_name: Option<String>,
    pub where_body: String,
}

fn capture_range(re: &Regex, sql: &str) -> Option<(f64, f64)> {
    let caps = re.captures(sql)?;
    let low = caps.get(1)?.as_str().parse::<f64>().ok()?;
    let high = caps.get(2)?.as_str().parse::<f64>().ok()?;
    Some((low, high))
}

/// 同时找到纬度与经度的 BETWEEN 谓词才返回包围盒，缺任何一个都返回 None
pub fn extract_bounding_box(sql: &str) -> Option<BoundingBox> {
    let (lat_a, lat_b) = capture_range(&LATITUDE_RANGE, sql)?;
    let (lon_a, lon_b) = capture_range(&LONGITUDE_RANGE, sql)?;
    Some(BoundingBox::new(lat_a, lat_b, lon_a, lon_b))
}

/// 取第一个 FROM 之后的表名，以及 WHERE 与第一个终止关键字之间的正文。
/// 没有 WHERE 时正文为空串，不算错误。
pub fn extract_table_and_where(sql: &str) -> ParsedStatement {
    let table_name = FROM_TABLE
        .captures(sql)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    let where_body = WHERE_BODY
        .captures(sql)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    ParsedStatement { table_name, where_body }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARGO_SQL: &str = "SELECT * FROM floatchat.argo_data WHERE AND latitude BETWEEN 8 AND 30 AND longitude BETWEEN 50 AND 75 AND depth = 10;";

    #[test]
    fn extracts_box_from_argo_statement() {
        let bbox = extract_bounding_box(ARGO_SQL).unwrap();
        assert_eq!(bbox, BoundingBox { lat_min: 8.0, lat_max: 30.0, lon_min: 50.0, lon_max: 75.0 });
    }

    #[test]
    fn swaps_reversed_ranges_in_any_case() {
        let sql = "select time from t where LATITUDE between 30.5 and -8 and Longitude BeTwEeN 75 AND 50.25";
        let bbox = extract_bounding_box(sql).unwrap();
        assert!(bbox.lat_min <= bbox.lat_max);
        assert!(bbox.lon_min <= bbox.lon_max);
        assert_eq!((bbox.lat_min, bbox.lat_max), (-8.0, 30.5));
        assert_eq!((bbox.lon_min, bbox.lon_max), (50.25, 75.0));
    }

    #[test]
    fn tolerates_newlines_between_tokens() {
        let sql = "SELECT *\n FROM argo\n WHERE\n latitude BETWEEN 8\n AND 30\n AND longitude\tBETWEEN +50\n AND 75;";
        let bbox = extract_bounding_box(sql).unwrap();
        assert_eq!(bbox.lon_min, 50.0);
        assert_eq!(bbox.lat_max, 30.0);
    }

    #[test]
    fn missing_either_axis_yields_none() {
        assert!(extract_bounding_box("SELECT * FROM t WHERE latitude BETWEEN 1 AND 2").is_none());
        assert!(extract_bounding_box("SELECT * FROM t WHERE longitude BETWEEN 1 AND 2").is_none());
        let open_ended = "SELECT * FROM t WHERE latitude > 1 AND longitude < 2";
        assert!(extract_bounding_box(open_ended).is_none());
    }

    #[test]
    fn only_ascii_digits_count_as_numbers() {
        let sql = "SELECT * FROM argo WHERE latitude BETWEEN ٨ AND ٣٠ OR latitude BETWEEN 8 AND 30 \
                   AND longitude BETWEEN 50 AND 75";
        assert_eq!(extract_bounding_box(sql), Some(BoundingBox::new(8.0, 30.0, 50.0, 75.0)));
    }

    #[test]
    fn extracts_table_and_where_body() {
        let parsed = extract_table_and_where(ARGO_SQL);
        assert_eq!(parsed.table_name.as_deref(), Some("floatchat.argo_data"));
        assert_eq!(
            parsed.where_body,
            "AND latitude BETWEEN 8 AND 30 AND longitude BETWEEN 50 AND 75 AND depth = 10"
        );
    }

    #[test]
    fn where_body_stops_at_first_trailing_clause() {
        let sql = "SELECT time, avg(salinity) FROM argo WHERE depth = 10\nAND salinity > 30\ngroup by time ORDER BY time LIMIT 5";
        let parsed = extract_table_and_where(sql);
        assert_eq!(parsed.where_body, "depth = 10\nAND salinity > 30");

        let limited = extract_table_and_where("SELECT * FROM argo WHERE depth = 5 limit 10");
        assert_eq!(limited.where_body, "depth = 5");
    }

    #[test]
    fn table_name_stops_at_semicolon() {
        let parsed = extract_table_and_where("SELECT * FROM argo;");
        assert_eq!(parsed.table_name.as_deref(), Some("argo"));
        assert_eq!(parsed.where_body, "");
    }

    #[test]
    fn missing_from_and_where_are_reported_as_absent_and_empty() {
        let parsed = extract_table_and_where("SELECT 1");
        assert_eq!(parsed, ParsedStatement::default());
    }

    #[test]
    fn box_found_outside_where_does_not_leak_into_where_body() {
        // 子查询里的范围仍会被识别为包围盒，但外层没有 WHERE 时正文为空
        let sql = "SELECT * FROM (SELECT * FROM argo) sub";
        assert_eq!(extract_table_and_where(sql).where_body, "");
        let nested = "SELECT * FROM (SELECT * FROM argo WHERE latitude BETWEEN 1 AND 2 AND longitude BETWEEN 3 AND 4) sub";
        assert!(extract_bounding_box(nested).is_some());
        let parsed = extract_table_and_where(nested);
        assert_eq!(parsed.table_name.as_deref(), Some("(SELECT"));
    }
}

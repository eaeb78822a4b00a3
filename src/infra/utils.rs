use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde_json::{json, Value};
use sqlx::{postgres::PgRow, Column, Row, TypeInfo};

/// 按列顺序把一行转换成 JSON 单元格，顺序与列名一一对应
pub fn pg_row_to_cells(row: &PgRow) -> Vec<Value> {
    row.columns()
        .iter()
        .map(|col| {
            let idx = col.ordinal();
            let type_info = col.type_info();
            let type_name = type_info.name(); // 获取数据库原生类型名，如 "INT4", "NUMERIC"

            match type_name {
                "INT2" => json!(row.try_get::<Option<i16>, _>(idx).unwrap_or(None)),
                "INT4" => json!(row.try_get::<Option<i32>, _>(idx).unwrap_or(None)),
                "INT8" => json!(row.try_get::<Option<i64>, _>(idx).unwrap_or(None)),
                "FLOAT4" => json!(row.try_get::<Option<f32>, _>(idx).unwrap_or(None)),
                "FLOAT8" => json!(row.try_get::<Option<f64>, _>(idx).unwrap_or(None)),
                "NUMERIC" => {
                    let v: Option<rust_decimal::Decimal> = row.try_get(idx).unwrap_or(None);
                    // 观测值按浮点输出，方便地图和图表直接使用
                    json!(v.and_then(|d| d.to_f64()))
                }
                "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
                    json!(row.try_get::<Option<String>, _>(idx).unwrap_or(None))
                }
                "BOOL" => json!(row.try_get::<Option<bool>, _>(idx).unwrap_or(None)),
                "DATE" => {
                    let v: Option<NaiveDate> = row.try_get(idx).unwrap_or(None);
                    json!(v.map(|d| d.to_string()))
                }
                "TIME" => {
                    let v: Option<NaiveTime> = row.try_get(idx).unwrap_or(None);
                    json!(v.map(|t| t.to_string()))
                }
                "TIMESTAMP" => {
                    let v: Option<NaiveDateTime> = row.try_get(idx).unwrap_or(None);
                    json!(v.map(|dt| dt.to_string()))
                }
                "TIMESTAMPTZ" => {
                    let v: Option<DateTime<Utc>> = row.try_get(idx).unwrap_or(None);
                    json!(v.map(|dt| dt.to_rfc3339()))
                }
                "JSON" | "JSONB" => {
                    let v: Option<Value> = row.try_get(idx).unwrap_or(None);
                    v.unwrap_or(Value::Null)
                }
                _ => {
                    // 对于未知类型，尝试转为字符串
                    json!(row.try_get::<Option<String>, _>(idx).unwrap_or(None))
                }
            }
        })
        .collect()
}

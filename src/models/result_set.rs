use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::{Map, Value};

/// 外部数据源返回的结果集：`columns[i]` 对应每一行的 `rows[*][i]`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// 按列名读取单元格，列不存在或行过短时返回 None
    pub fn cell<'a>(&self, row: &'a [Value], name: &str) -> Option<&'a Value> {
        self.column_index(name).and_then(|idx| row.get(idx))
    }

    /// 行转为 `列名 -> 值` 的 JSON 对象
    pub fn record(&self, row: &[Value]) -> Value {
        let mut map = Map::new();
        for (name, val) in self.columns.iter().zip(row.iter()) {
            map.insert(name.clone(), val.clone());
        }
        Value::Object(map)
    }

    /// 按 time 列升序排序。只有当全部 time 值可解析时才排序，否则保持原顺序并返回 false
    pub fn sort_by_time(&mut self) -> bool {
        let Some(idx) = self.column_index("time") else {
            return false;
        };
        let mut keyed = Vec::with_capacity(self.rows.len());
        for row in self.rows.drain(..) {
            keyed.push((row.get(idx).and_then(parse_time_value), row));
        }
        if keyed.iter().any(|(t, _)| t.is_none()) {
            self.rows = keyed.into_iter().map(|(_, row)| row).collect();
            return false;
        }
        // 稳定排序，相同时间保持原有先后
        keyed.sort_by_key(|(t, _)| *t);
        self.rows = keyed.into_iter().map(|(_, row)| row).collect();
        true
    }
}

/// 把单元格值转成展示文本，null 为空串
pub fn cell_text(val: &Value) -> String {
    match val {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn cell_f64(val: &Value) -> Option<f64> {
    match val {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// 兼容数据库导出的几种时间文本格式
pub fn parse_time_value(val: &Value) -> Option<NaiveDateTime> {
    let text = match val {
        Value::String(s) => s.trim(),
        _ => return None,
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f %:z",
        "%Y-%m-%d %H:%M:%S%.f%#z",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
        if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
            return Some(dt.naive_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

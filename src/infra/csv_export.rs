use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::info;

use crate::models::result_set::{cell_text, ResultSet};

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// 结果集渲染为 CSV 文本：表头 + 每行一条记录
pub fn to_csv(rs: &ResultSet) -> String {
    let mut out = String::new();
    let header: Vec<String> = rs.columns.iter().map(|c| escape_field(c)).collect();
    out.push_str(&header.join(","));
    out.push('\n');
    for row in &rs.rows {
        let line: Vec<String> = row.iter().map(|v| escape_field(&cell_text(v))).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

/// 先删掉上一次的导出再写入，写失败时不会留下旧数据
pub fn write_csv(rs: &ResultSet, path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, to_csv(rs))?;
    info!("结果已导出到 {} ({} 行)", path.display(), rs.len());
    Ok(())
}

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::core::charts::Chart;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String, // 用户提问内容
}

#[derive(Debug, Deserialize)]
pub struct MapRequest {
    pub sql: String,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatStatus {
    Success,
    Empty,
}

/// 聊天接口的完整应答：SQL、地图、表格预览、摘要与图表
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub id: Uuid,
    pub status: ChatStatus,
    pub sql: String,
    pub row_count: usize,
    pub columns: Vec<String>,
    pub preview: Vec<Vec<Value>>,
    pub export_error: Option<String>,
    pub map_html: Option<String>,
    pub map_error: Option<String>,
    pub summary: Option<String>,
    pub summary_error: Option<String>,
    pub charts: Vec<Chart>,
}

impl ChatResponse {
    /// 查询成功但没有任何匹配行
    pub fn empty(sql: String, columns: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: ChatStatus::Empty,
            sql,
            row_count: 0,
            columns,
            preview: Vec::new(),
            export_error: None,
            map_html: None,
            map_error: None,
            summary: None,
            summary_error: None,
            charts: Vec::new(),
        }
    }
}

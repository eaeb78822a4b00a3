use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::ax_state::AppState;
use crate::core::{charts, materializer, sql_agent, summarizer};
use crate::infra::csv_export;
use crate::infra::db_external::StoreError;
use crate::infra::llm::LlmError;
use crate::models::context::{ChatRequest, ChatResponse, ChatStatus};
use crate::models::result_set::ResultSet;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("SQL generation failed: {0}")]
    Llm(#[from] LlmError),
    #[error("Query failed to execute: {0}")]
    Query(#[from] StoreError),
}

/// 表格预览：超过 5 行时用 "..." 行隔开首尾
pub fn preview_rows(rs: &ResultSet) -> Vec<Vec<Value>> {
    let n = rs.len();
    if n <= 5 {
        return rs.rows.clone();
    }
    let separator = vec![json!("..."); rs.columns.len()];
    let tail_start = if n > 10 { n - 5 } else { 5 };
    let mut out = rs.rows[..5].to_vec();
    out.push(separator);
    out.extend_from_slice(&rs.rows[tail_start..]);
    out
}

/// 聊天主流程：生成 SQL -> 执行 -> 导出/地图/预览/摘要/图表
#[instrument(skip(state))]
pub async fn run_chat(state: &AppState, query: &str) -> Result<ChatResponse, ChatError> {
    let sql_llm = state.llm.for_tier(state.config.llm.sql_tier);
    let sql = sql_agent::generate_sql(sql_llm.as_ref(), &state.config.table_name, query).await?;

    let mut rs = state.store.execute(&sql).await?;
    if rs.is_empty() {
        info!("查询成功但没有匹配行");
        return Ok(ChatResponse::empty(sql, rs.columns));
    }

    if !rs.sort_by_time() {
        warn!("time 列无法排序，保持查询返回的顺序");
    }
    let export_error = match csv_export::write_csv(&rs, &state.config.output_csv) {
        Ok(()) => None,
        Err(e) => {
            error!("CSV 导出失败: {}", e);
            Some(e.to_string())
        }
    };

    // 地图失败不影响其余结果
    let padding = state.config.map_padding;
    let map = materializer::generate_map(state.store.as_ref(), &sql, padding).await;
    let (map_html, map_error) = match map {
        Ok(doc) => (Some(doc.html), None),
        Err(e) => {
            warn!("地图生成失败: {}", e);
            (None, Some(e.to_string()))
        }
    };

    let chunk_llm = state.llm.for_tier(state.config.llm.chunk_tier);
    let final_llm = state.llm.for_tier(state.config.llm.final_tier);
    let summary = summarizer::summarize(&rs, chunk_llm, final_llm.as_ref()).await;
    let (summary, summary_error) = match summary {
        Ok(summary) => (summary, None),
        Err(e) => {
            warn!("摘要生成失败: {}", e);
            (None, Some(e.to_string()))
        }
    };

    Ok(ChatResponse {
        id: Uuid::new_v4(),
        status: ChatStatus::Success,
        row_count: rs.len(),
        preview: preview_rows(&rs),
        charts: charts::plot_time_series(&rs),
        columns: rs.columns,
        sql,
        export_error,
        map_html,
        map_error,
        summary,
        summary_error,
    })
}

pub async fn chat_query(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequest>,
) -> impl IntoResponse {
    let query_text = payload.query.trim();
    if query_text.is_empty() {
        let body = Json(json!({ "error": "query must not be empty" }));
        return (StatusCode::BAD_REQUEST, body).into_response();
    }

    match run_chat(&state, query_text).await {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => {
            error!("聊天请求失败: {}", e);
            let status = match e {
                ChatError::Llm(_) => "llm_failed",
                ChatError::Query(_) => "query_failed",
            };
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "status": status, "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::materializer::tests::FakeStore;
    use crate::infra::config::AppConfig;
    use crate::infra::llm::tests::ScriptedLlm;
    use crate::infra::llm::{ModelSelector, TextCompletion};
    use std::collections::HashMap;
    use std::path::PathBuf;

    /// 档位 -> 预设 LLM；同档位共享同一个实例
    struct FakeSelector {
        by_tier: HashMap<u32, Arc<ScriptedLlm>>,
    }

    impl ModelSelector for FakeSelector {
        fn for_tier(&self, tier: u32) -> Arc<dyn TextCompletion> {
            self.by_tier[&tier].clone()
        }
    }

    const GENERATED: &str = concat!(
        "```sql\n",
        "SELECT time, latitude, longitude, depth, temperature, salinity FROM argo ",
        "WHERE latitude BETWEEN 30 AND 8 AND longitude BETWEEN 50 AND 75 AND depth = 10;\n",
        "```",
    );

    type Script = Vec<Result<String, LlmError>>;

    fn state(store: FakeStore, lite: Script, flash: Script, dir: &std::path::Path) -> AppState {
        state_with_csv(store, lite, flash, dir.join("dataExtracted.csv"))
    }

    fn state_with_csv(store: FakeStore, lite: Script, flash: Script, csv: PathBuf) -> AppState {
        let config = AppConfig::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://localhost/ocean".into()),
            "TABLE_NAME" => Some("argo".into()),
            "GEMINI_API_KEY" => Some("k".into()),
            "OUTPUT_CSV" => Some(csv.display().to_string()),
            _ => None,
        })
        .unwrap();
        let by_tier = HashMap::from([
            (config.llm.sql_tier, Arc::new(ScriptedLlm::new(lite))),
            (config.llm.final_tier, Arc::new(ScriptedLlm::new(flash))),
        ]);
        AppState {
            store: Arc::new(store),
            llm: Arc::new(FakeSelector { by_tier }),
            config,
        }
    }

    fn argo_rows() -> ResultSet {
        ResultSet::new(
            crate::core::materializer::MAP_PROJECTION.split(", ").map(String::from).collect(),
            vec![
                vec![
                    json!("2014-01-05 00:00:00"),
                    json!(12.0),
                    json!(64.0),
                    json!(10),
                    json!(27.5),
                    json!(36.3),
                ],
                vec![
                    json!("2014-01-01 00:00:00"),
                    json!(10.0),
                    json!(60.0),
                    json!(10),
                    json!(28.0),
                    json!(36.1),
                ],
            ],
        )
    }

    #[tokio::test]
    async fn full_pipeline_produces_every_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(
            FakeStore::returning(argo_rows()),
            vec![Ok(GENERATED.into()), Ok("warm and salty".into())],
            vec![Ok("final summary".into())],
            dir.path(),
        );

        let resp = run_chat(&state, "salinity in the arabian sea").await.unwrap();
        assert_eq!(resp.status, ChatStatus::Success);
        assert_eq!(resp.row_count, 2);
        assert!(resp.sql.starts_with("SELECT time"));
        // 按时间升序
        assert_eq!(resp.preview[0][0], json!("2014-01-01 00:00:00"));
        assert!(resp.map_html.as_deref().unwrap().contains("fitBounds"));
        assert!(resp.map_error.is_none());
        assert!(resp.export_error.is_none());
        assert_eq!(resp.summary.as_deref(), Some("final summary"));
        assert_eq!(resp.charts.len(), 2);

        let csv = std::fs::read_to_string(dir.path().join("dataExtracted.csv")).unwrap();
        assert!(csv.starts_with("time,latitude,longitude,depth,temperature,salinity\n"));
        assert!(csv.contains("\n2014-01-01 00:00:00,10.0,"));
    }

    #[tokio::test]
    async fn map_failure_does_not_fail_the_chat() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(
            FakeStore::returning(argo_rows()),
            vec![Ok("SELECT time, salinity FROM argo WHERE depth = 10".into()), Ok("part".into())],
            vec![Ok("final".into())],
            dir.path(),
        );
        let resp = run_chat(&state, "salinity").await.unwrap();
        assert!(resp.map_html.is_none());
        assert!(resp.map_error.unwrap().contains("BETWEEN"));
        assert_eq!(resp.summary.as_deref(), Some("final"));
    }

    #[tokio::test]
    async fn zero_rows_is_an_empty_success() {
        let dir = tempfile::tempdir().unwrap();
        let empty = ResultSet::new(vec!["time".into()], vec![]);
        let store = FakeStore::returning(empty);
        let state = state(store, vec![Ok(GENERATED.into())], vec![], dir.path());
        let resp = run_chat(&state, "nothing").await.unwrap();
        assert_eq!(resp.status, ChatStatus::Empty);
        assert_eq!(resp.columns, vec!["time"]);
        assert!(!dir.path().join("dataExtracted.csv").exists());
    }

    #[tokio::test]
    async fn store_failure_is_a_query_error() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(FakeStore::failing(), vec![Ok(GENERATED.into())], vec![], dir.path());
        let err = run_chat(&state, "anything").await.unwrap_err();
        assert!(matches!(err, ChatError::Query(_)));
    }

    #[tokio::test]
    async fn llm_failure_is_reported_before_touching_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FakeStore::returning(argo_rows());
        let state = state(store, vec![Err(LlmError::EmptyResponse)], vec![], dir.path());
        let err = run_chat(&state, "anything").await.unwrap_err();
        assert!(matches!(err, ChatError::Llm(_)));
    }

    #[tokio::test]
    async fn failed_export_is_reported_and_leaves_no_stale_file() {
        let dir = tempfile::tempdir().unwrap();
        // 导出路径被目录占住，写不进去
        let csv = dir.path().join("dataExtracted.csv");
        std::fs::create_dir(&csv).unwrap();
        let state = state_with_csv(
            FakeStore::returning(argo_rows()),
            vec![Ok(GENERATED.into()), Ok("part".into())],
            vec![Ok("final".into())],
            csv.clone(),
        );

        let resp = run_chat(&state, "salinity").await.unwrap();
        assert_eq!(resp.status, ChatStatus::Success);
        assert!(resp.export_error.is_some());
        assert!(resp.map_html.is_some());
        assert!(!csv.is_file());
    }

    #[tokio::test]
    async fn previous_export_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("dataExtracted.csv");
        std::fs::write(&csv, "time\nfrom an older query\n").unwrap();
        let state = state(
            FakeStore::returning(argo_rows()),
            vec![Ok(GENERATED.into()), Ok("part".into())],
            vec![Ok("final".into())],
            dir.path(),
        );

        let resp = run_chat(&state, "salinity").await.unwrap();
        assert!(resp.export_error.is_none());
        assert!(!std::fs::read_to_string(&csv).unwrap().contains("older query"));
    }

    fn rows(n: usize) -> ResultSet {
        ResultSet::new(
            vec!["time".into(), "depth".into()],
            (0..n).map(|i| vec![json!(i), json!(10)]).collect(),
        )
    }

    #[test]
    fn small_results_are_shown_whole() {
        assert_eq!(preview_rows(&rows(5)).len(), 5);
        assert!(preview_rows(&rows(0)).is_empty());
    }

    #[test]
    fn medium_results_get_a_separator_after_five() {
        let preview = preview_rows(&rows(7));
        assert_eq!(preview.len(), 8);
        assert_eq!(preview[5], vec![json!("..."), json!("...")]);
        assert_eq!(preview[6][0], json!(5));
    }

    #[test]
    fn large_results_show_head_and_tail() {
        let preview = preview_rows(&rows(25));
        assert_eq!(preview.len(), 11);
        assert_eq!(preview[4][0], json!(4));
        assert_eq!(preview[6][0], json!(20));
        assert_eq!(preview[10][0], json!(24));
    }
}

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::ax_state::AppState;
use crate::core::materializer::{self, MapError};
use crate::models::context::MapRequest;

fn map_error_response(e: &MapError) -> Response {
    let status = if e.is_input_shape() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, Json(json!({ "error": e.to_string() }))).into_response()
}

/// 由任意 SQL 生成地图文档
pub async fn map_from_sql(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<MapRequest>,
) -> impl IntoResponse {
    let padding = state.config.map_padding;
    match materializer::generate_map(state.store.as_ref(), &payload.sql, padding).await {
        Ok(doc) => {
            info!("地图请求完成 (focused={})", doc.focused);
            Html(doc.html).into_response()
        }
        Err(e) => {
            warn!("地图请求失败: {}", e);
            map_error_response(&e)
        }
    }
}

/// 下载最近一次导出的 CSV
pub async fn export_csv(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let path = &state.config.output_csv;
    let body = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return (StatusCode::NOT_FOUND, "Data file not found.").into_response();
        }
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("dataExtracted.csv");
    info!("CSV 导出下载: {}", path.display());

    (
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        body,
    )
        .into_response()
}

pub async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::db_external::StoreError;

    #[test]
    fn input_shape_errors_map_to_422() {
        for err in [MapError::MissingBoundingBox, MapError::NoTableFound] {
            assert_eq!(map_error_response(&err).status(), StatusCode::UNPROCESSABLE_ENTITY);
        }
    }

    #[test]
    fn execution_errors_map_to_502() {
        let err = MapError::QueryExecution(StoreError::Execution(sqlx::Error::RowNotFound));
        assert_eq!(map_error_response(&err).status(), StatusCode::BAD_GATEWAY);
    }
}

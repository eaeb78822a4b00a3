//! 结果集分块摘要：按序列化长度切块，最多两路并发调用 LLM，再汇总成最终摘要。

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use crate::infra::llm::{LlmError, TextCompletion};
use crate::models::result_set::ResultSet;

/// 单块最大字符数
pub const CHUNK_SIZE: usize = 30_000;
/// 并发摘要的工作者数量
pub const NUM_WORKERS: usize = 2;

/// 按累计序列化长度装箱；单行超长时自成一块
pub fn chunk_records(records: &[Value], max_chars: usize) -> Vec<Vec<Value>> {
    let mut chunks = Vec::new();
    let mut current: Vec<Value> = Vec::new();
    let mut current_size = 0;

    for record in records {
        let row_size = record.to_string().len();
        if current_size + row_size <= max_chars || current.is_empty() {
            current.push(record.clone());
            current_size += row_size;
        } else {
            chunks.push(std::mem::take(&mut current));
            current.push(record.clone());
            current_size = row_size;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

async fn summarize_chunk(llm: &dyn TextCompletion, chunk: Vec<Value>) -> String {
    let prompt = format!("Summarize this data chunk:\n{}", Value::Array(chunk));
    match llm.complete(&prompt).await {
        Ok(text) => text,
        Err(e) => {
            warn!("分块摘要失败: {}", e);
            String::new()
        }
    }
}

/// 无数据返回 Ok(None)；分块失败只记日志，汇总失败才向上返回
#[instrument(skip_all, fields(rows = rs.len()))]
pub async fn summarize(
    rs: &ResultSet,
    chunk_llm: Arc<dyn TextCompletion>,
    final_llm: &dyn TextCompletion,
) -> Result<Option<String>, LlmError> {
    if rs.is_empty() {
        warn!("没有可摘要的数据");
        return Ok(None);
    }

    let records: Vec<Value> = rs.rows.iter().map(|row| rs.record(row)).collect();
    let chunks = chunk_records(&records, CHUNK_SIZE);
    info!("待摘要分块数: {}", chunks.len());

    let permits = Arc::new(Semaphore::new(NUM_WORKERS));
    let mut tasks = JoinSet::new();
    for chunk in chunks {
        let llm = chunk_llm.clone();
        let permits = permits.clone();
        tasks.spawn(async move {
            // 信号量不会被关闭，acquire 失败时直接放行
            let _permit = permits.acquire_owned().await.ok();
            summarize_chunk(llm.as_ref(), chunk).await
        });
    }

    // 完成顺序即拼接顺序，不保证与分块顺序一致
    let mut summaries = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(summary) => summaries.push(summary),
            Err(e) => warn!("分块摘要任务异常退出: {}", e),
        }
    }

    let combined_prompt = format!(
        "Based on the following chunk summaries, generate a final concise summary:\n{}",
        summaries.join("\n---\n")
    );
    let summary = final_llm.complete(&combined_prompt).await?;
    info!("最终摘要生成完成");
    Ok(Some(summary))
}

use tracing::{info, instrument};

use crate::infra::llm::{LlmError, TextCompletion};

pub fn build_sql_prompt(table_name: &str, request: &str) -> String {
    format!(
        r#"You are an AI that writes SQL queries for a PostgreSQL table called "{table_name}".
Columns: time, latitude, longitude, depth, temperature, salinity.

Instructions:
1. Always include the "time" column in the SELECT query, even if the user does not request it.
2. If the user does not mention depth, assume depth = 10 and add it as a filter in the WHERE clause.
3. Ensure the query is syntactically correct PostgreSQL.
4. Correct any user spelling mistakes in column names (e.g., "temprature" -> "temperature").
5. Return only the SQL query without any explanation or formatting.
6. While using aggregation operations name the columns as "avg_columnname" like avg_salinity or avg_temperature, or max_salinity, min_columnname and so on.

User request: {request}
"#
    )
}

/// 去掉模型输出里的 markdown 代码块标记
pub fn clean_sql_response(raw: &str) -> String {
    raw.trim()
        .replace("```sql", "")
        .replace("```SQL", "")
        .replace("```", "")
        .trim()
        .to_string()
}

#[instrument(skip(llm, table_name))]
pub async fn generate_sql(
    llm: &dyn TextCompletion,
    table_name: &str,
    request: &str,
) -> Result<String, LlmError> {
    let response = llm.complete(&build_sql_prompt(table_name, request)).await?;
    let sql = clean_sql_response(&response);
    if sql.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    info!("生成的 SQL: {}", sql);
    Ok(sql)
}

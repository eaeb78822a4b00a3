//! Gemini 文本补全客户端与模型档位路由。

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("LLM HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("LLM response could not be decoded: {0}")]
    Decode(String),
    #[error("LLM returned an empty response")]
    EmptyResponse,
}

impl LlmError {
    /// 模型不存在或配额耗尽，可以换默认模型再试一次
    fn is_model_unavailable(&self) -> bool {
        matches!(
            self,
            LlmError::Status { status, .. }
                if *status == StatusCode::NOT_FOUND || *status == StatusCode::TOO_MANY_REQUESTS
        )
    }
}

/// 外部 LLM 文本补全服务
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// 显式的档位 -> 模型名映射，替代全局常量表
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    tiers: BTreeMap<u32, String>,
    default_tier: u32,
}

impl ModelRegistry {
    pub fn new(tiers: BTreeMap<u32, String>, default_tier: u32) -> Self {
        Self { tiers, default_tier }
    }

    pub fn default_model(&self) -> &str {
        self.tiers
            .get(&self.default_tier)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// 未知档位回落到默认档
    pub fn resolve(&self, tier: u32) -> &str {
        match self.tiers.get(&tier) {
            Some(model) => model.as_str(),
            None => {
                warn!(
                    "模型档位 {} 无效，改用默认档 {}",
                    tier,
                    self.default_model()
                );
                self.default_model()
            }
        }
    }
}

/// Gemini generateContent 接口
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, api_key: String, model: String, temperature: f32) -> Self {
        Self { http, api_key, model, temperature }
    }
}

/// 拼接第一个候选的全部文本片段
pub(crate) fn extract_candidate_text(data: &Value) -> Result<String, LlmError> {
    let parts = data["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| LlmError::Decode("missing candidates[0].content.parts".into()))?;
    let text: String = parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .join("");
    if text.trim().is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(text)
}

/// 响应体不是合法 JSON 属于解码错误，不是传输错误
fn decode_body(body: &[u8]) -> Result<Value, LlmError> {
    serde_json::from_slice(body).map_err(|e| LlmError::Decode(e.to_string()))
}

#[async_trait]
impl TextCompletion for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{GEMINI_BASE_URL}/{}:generateContent", self.model);
        let payload = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": self.temperature },
        });

        debug!("LLM 请求: model={}, prompt_len={}", self.model, prompt.len());
        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            let truncated: String = body.chars().take(300).collect();
            return Err(LlmError::Status { status, body: truncated });
        }

        let body = resp.bytes().await?;
        let text = extract_candidate_text(&decode_body(&body)?)?;
        debug!("LLM 响应: model={}, text_len={}", self.model, text.len());
        Ok(text)
    }
}

/// 按档位选择模型；请求的模型不可用时换默认档模型替补一次
pub struct TieredCompletion {
    primary: Arc<dyn TextCompletion>,
    fallback: Option<Arc<dyn TextCompletion>>,
}

impl TieredCompletion {
    pub fn new(
        primary: Arc<dyn TextCompletion>,
        fallback: Option<Arc<dyn TextCompletion>>,
    ) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl TextCompletion for TieredCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        match self.primary.complete(prompt).await {
            Err(e) if e.is_model_unavailable() => match &self.fallback {
                Some(fallback) => {
                    warn!("模型不可用或触发限流，改用默认档模型: {}", e);
                    fallback.complete(prompt).await
                }
                None => Err(e),
            },
            other => other,
        }
    }
}

/// 按档位提供补全客户端
pub trait ModelSelector: Send + Sync {
    fn for_tier(&self, tier: u32) -> Arc<dyn TextCompletion>;
}

/// 持有 API key 与档位表，为各环节生成对应模型的客户端
#[derive(Clone)]
pub struct LlmRouter {
    http: reqwest::Client,
    api_key: String,
    temperature: f32,
    registry: ModelRegistry,
}

impl LlmRouter {
    pub fn new(api_key: String, temperature: f32, registry: ModelRegistry) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            temperature,
            registry,
        }
    }

    fn client(&self, model: &str) -> Arc<dyn TextCompletion> {
        Arc::new(GeminiClient::new(
            self.http.clone(),
            self.api_key.clone(),
            model.to_string(),
            self.temperature,
        ))
    }
}

impl ModelSelector for LlmRouter {
    fn for_tier(&self, tier: u32) -> Arc<dyn TextCompletion> {
        let model = self.registry.resolve(tier);
        let default_model = self.registry.default_model();
        info!("选用模型: tier={} -> {}", tier, model);
        let fallback = (model != default_model).then(|| self.client(default_model));
        Arc::new(TieredCompletion::new(self.client(model), fallback))
    }
}

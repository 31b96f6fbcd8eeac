// SPDX-License-Identifier: MIT

//! Client for the remote reasoning endpoint (chat-completions style API)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::RemoteConfig;

/// Literal the prompt instructs the model to return when it cannot infer
/// any naming fields. Candidates equal to this are never accepted.
pub const DECLINE_SENTINEL: &str = "无法识别";

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: String,
}

/// Classified remote rejection categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    InvalidCredential,
    QuotaExhausted,
    RateLimited,
    ServerError,
    Transport,
    Other,
}

impl RejectionKind {
    pub fn classify(status: u16) -> Self {
        match status {
            401 | 403 => Self::InvalidCredential,
            402 => Self::QuotaExhausted,
            429 => Self::RateLimited,
            500..=599 => Self::ServerError,
            _ => Self::Other,
        }
    }

    /// Whether another attempt may succeed without operator intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::ServerError | Self::Transport)
    }

    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::InvalidCredential => "请检查并更新 API 密钥",
            Self::QuotaExhausted => "请为 API 账户充值或等待配额重置",
            Self::RateLimited => "请稍后重试或检查配额使用情况",
            Self::ServerError => "远端服务器错误，请稍后重试",
            Self::Transport => "请检查网络连接和代理设置",
            Self::Other => "请检查网络连接和 API 状态",
        }
    }
}

/// Structured last-error/suggestion pair recorded when the remote tier
/// cannot produce a candidate. Degrades the chain instead of aborting it.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RemoteFailure {
    pub kind: RejectionKind,
    pub message: String,
    pub suggestion: String,
}

impl RemoteFailure {
    fn new(kind: RejectionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            suggestion: kind.suggestion().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Wire-level seam for the chat endpoint, injectable for tests.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(
        &self,
        request: &ChatRequest,
        timeout: Duration,
    ) -> std::result::Result<TransportResponse, String>;
}

struct HttpTransport {
    client: Client,
    url: String,
    api_key: String,
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(
        &self,
        request: &ChatRequest,
        timeout: Duration,
    ) -> std::result::Result<TransportResponse, String> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(request)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| e.to_string())?;
        Ok(TransportResponse { status, body })
    }
}

/// Remote reasoning client with bounded retry
pub struct RemoteClient {
    transport: Option<Arc<dyn ChatTransport>>,
    model: String,
    vision_model: String,
    max_attempts: u32,
    retry_delay: Duration,
    text_timeout: Duration,
    vision_timeout: Duration,
}

impl RemoteClient {
    /// Create a client from configuration. Without a resolvable credential
    /// the client is constructed unavailable and the tier is skipped.
    pub fn new(config: &RemoteConfig) -> Self {
        let transport = config.resolve_api_key().map(|api_key| {
            Arc::new(HttpTransport {
                client: Client::new(),
                url: config.base_url.trim_end_matches('/').to_string(),
                api_key,
            }) as Arc<dyn ChatTransport>
        });

        Self::from_parts(config, transport)
    }

    /// Build a client over an injected transport (tests, alternate backends).
    pub fn with_transport(config: &RemoteConfig, transport: Arc<dyn ChatTransport>) -> Self {
        Self::from_parts(config, Some(transport))
    }

    fn from_parts(config: &RemoteConfig, transport: Option<Arc<dyn ChatTransport>>) -> Self {
        Self {
            transport,
            model: config.model.clone(),
            vision_model: config.vision_model.clone(),
            max_attempts: config.max_attempts.max(1),
            retry_delay: Duration::from_secs(config.retry_delay_secs),
            text_timeout: Duration::from_secs(config.text_timeout_secs),
            vision_timeout: Duration::from_secs(config.vision_timeout_secs),
        }
    }

    /// Availability gate: a credential was configured.
    pub fn is_available(&self) -> bool {
        self.transport.is_some()
    }

    /// Ask the text model for a filename candidate.
    pub async fn infer_text(&self, prompt: &str) -> std::result::Result<String, RemoteFailure> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: MessageContent::Text(prompt.to_string()),
            }],
            max_tokens: 500,
            temperature: 0.1,
        };
        self.send_with_retry(request, self.text_timeout).await
    }

    /// Ask the vision model for a filename candidate from a base64 JPEG.
    pub async fn infer_image(
        &self,
        prompt: &str,
        image_base64: &str,
    ) -> std::result::Result<String, RemoteFailure> {
        let request = ChatRequest {
            model: self.vision_model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: prompt.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:image/jpeg;base64,{}", image_base64),
                        },
                    },
                ]),
            }],
            max_tokens: 300,
            temperature: 0.1,
        };
        self.send_with_retry(request, self.vision_timeout).await
    }

    /// At most `max_attempts` calls, fixed delay between them. Transport
    /// failures and retryable rejections are retried; a non-retryable
    /// rejection ends the loop immediately.
    async fn send_with_retry(
        &self,
        request: ChatRequest,
        timeout: Duration,
    ) -> std::result::Result<String, RemoteFailure> {
        let transport = self.transport.as_ref().ok_or_else(|| {
            RemoteFailure::new(RejectionKind::InvalidCredential, "API 密钥未配置")
        })?;

        let mut last = RemoteFailure::new(RejectionKind::Other, "no attempt made");

        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                debug!("retrying remote call in {:?} (attempt {})", self.retry_delay, attempt);
                tokio::time::sleep(self.retry_delay).await;
            }

            match transport.send(&request, timeout).await {
                Err(e) => {
                    warn!("remote transport failure (attempt {}): {}", attempt, e);
                    last = RemoteFailure::new(
                        RejectionKind::Transport,
                        format!("网络请求失败: {}", e),
                    );
                }
                Ok(response) if (200..300).contains(&response.status) => {
                    return parse_content(&response.body);
                }
                Ok(response) => {
                    let kind = RejectionKind::classify(response.status);
                    let snippet: String = response.body.chars().take(200).collect();
                    warn!(
                        "remote rejected request (attempt {}): {} {}",
                        attempt, response.status, snippet
                    );
                    last = RemoteFailure::new(
                        kind,
                        format!("API 调用失败 ({}): {}", response.status, snippet),
                    );
                    if !kind.is_retryable() {
                        break;
                    }
                }
            }
        }

        Err(last)
    }
}

fn parse_content(body: &str) -> std::result::Result<String, RemoteFailure> {
    let parsed: ChatResponse = serde_json::from_str(body).map_err(|e| {
        RemoteFailure::new(RejectionKind::Other, format!("API 响应格式异常: {}", e))
    })?;

    parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content.trim().to_string())
        .ok_or_else(|| RemoteFailure::new(RejectionKind::Other, "API 响应缺少 choices"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn test_config() -> RemoteConfig {
        RemoteConfig {
            retry_delay_secs: 0,
            ..RemoteConfig::default()
        }
    }

    /// Transport that replays a scripted list of outcomes and counts calls.
    struct ScriptedTransport {
        script: Mutex<Vec<std::result::Result<TransportResponse, String>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<std::result::Result<TransportResponse, String>>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(0),
            }
        }

        fn call_count(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn send(
            &self,
            _request: &ChatRequest,
            _timeout: Duration,
        ) -> std::result::Result<TransportResponse, String> {
            *self.calls.lock().unwrap() += 1;
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                Err("script exhausted".to_string())
            } else {
                script.remove(0)
            }
        }
    }

    fn success_body(content: &str) -> String {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
        .to_string()
    }

    #[test]
    fn classification_covers_failure_taxonomy() {
        assert_eq!(RejectionKind::classify(401), RejectionKind::InvalidCredential);
        assert_eq!(RejectionKind::classify(403), RejectionKind::InvalidCredential);
        assert_eq!(RejectionKind::classify(402), RejectionKind::QuotaExhausted);
        assert_eq!(RejectionKind::classify(429), RejectionKind::RateLimited);
        assert_eq!(RejectionKind::classify(503), RejectionKind::ServerError);
        assert_eq!(RejectionKind::classify(422), RejectionKind::Other);
    }

    #[test]
    fn invalid_credential_is_not_retryable() {
        assert!(!RejectionKind::InvalidCredential.is_retryable());
        assert!(!RejectionKind::QuotaExhausted.is_retryable());
        assert!(RejectionKind::RateLimited.is_retryable());
        assert!(RejectionKind::ServerError.is_retryable());
        assert!(RejectionKind::Transport.is_retryable());
    }

    #[tokio::test]
    async fn at_most_three_attempts_on_transport_failure() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err("connection refused".to_string()),
            Err("connection refused".to_string()),
            Err("connection refused".to_string()),
            Err("connection refused".to_string()),
        ]));
        let client = RemoteClient::with_transport(&test_config(), transport.clone());

        let result = client.infer_text("prompt").await;
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().kind, RejectionKind::Transport);
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn no_retry_after_invalid_credential() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(TransportResponse {
            status: 401,
            body: "unauthorized".to_string(),
        })]));
        let client = RemoteClient::with_transport(&test_config(), transport.clone());

        let result = client.infer_text("prompt").await;
        let failure = result.unwrap_err();
        assert_eq!(failure.kind, RejectionKind::InvalidCredential);
        assert!(!failure.suggestion.is_empty());
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn retries_server_errors_until_success() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(TransportResponse {
                status: 500,
                body: "boom".to_string(),
            }),
            Ok(TransportResponse {
                status: 500,
                body: "boom".to_string(),
            }),
            Ok(TransportResponse {
                status: 200,
                body: success_body("基金-合同-20250101"),
            }),
        ]));
        let client = RemoteClient::with_transport(&test_config(), transport.clone());

        let result = client.infer_text("prompt").await.unwrap();
        assert_eq!(result, "基金-合同-20250101");
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn unavailable_without_credential() {
        let config = RemoteConfig {
            api_key: None,
            ..RemoteConfig::default()
        };
        std::env::remove_var("DEEPSEEK_API_KEY");
        let client = RemoteClient::new(&config);
        assert!(!client.is_available());
    }

    #[test]
    fn parse_extracts_first_choice() {
        let content = parse_content(&success_body("  名称-类型-日期  ")).unwrap();
        assert_eq!(content, "名称-类型-日期");

        assert!(parse_content("{}").is_err());
        assert!(parse_content("not json").is_err());
    }
}

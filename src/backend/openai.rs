//! OpenAI Chat Completions API クライアント実装
//!
//! # 責務
//!
//! - Chat Completions API (`POST /v1/chat/completions`) との通信を担当
//! - [`Backend`] トレイトを実装し、統一インターフェースを提供
//! - OpenAI 固有のレスポンス形式と共通型の変換
//!
//! # 認証
//!
//! 環境変数 `OPENAI_API_KEY` の値を `Authorization: Bearer` ヘッダーで送信します。
//!
//! ## 出力例
//!
//! ```json
//! {
//!   "model": "gpt-4o",
//!   "choices": [{"message": {"role": "assistant", "content": "Hello"}, "finish_reason": "stop"}],
//!   "usage": {"prompt_tokens": 10, "completion_tokens": 5}
//! }
//! ```

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::settings::BackendOptions;
use crate::error::BackendError;
use super::traits::{Backend, Completion, StopReason, TokenUsage};
use super::{error_from_status, error_from_transport};

/// デフォルトのエンドポイント
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// API キーを読み込む環境変数
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// OpenAI Chat Completions API クライアント
pub struct OpenAiBackend {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiBackend {
    /// 環境変数から API キーを読み込んでクライアントを生成
    pub fn from_env(options: &BackendOptions) -> Result<Self, BackendError> {
        let api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty());
        Self::new(options, api_key)
    }

    /// API キーを指定してクライアントを生成
    pub fn new(options: &BackendOptions, api_key: Option<String>) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(options.timeout())
            .build()
            .map_err(|e| BackendError::Unavailable(format!("HTTP クライアントの初期化に失敗しました: {e}")))?;

        Ok(Self {
            http,
            base_url: options
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
        })
    }

    fn headers(&self) -> Result<HeaderMap, BackendError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            BackendError::Unauthorized(format!("{API_KEY_ENV} が設定されていません"))
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| BackendError::Unauthorized(format!("API キーが不正です: {e}")))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

#[async_trait]
impl Backend for OpenAiBackend {
    fn missing_credentials(&self) -> Option<String> {
        self.api_key
            .is_none()
            .then(|| format!("{API_KEY_ENV} が設定されていません"))
    }

    async fn complete(
        &self,
        system_prompt: &str,
        user_input: &str,
        options: &BackendOptions,
    ) -> Result<Completion, BackendError> {
        let headers = self.headers()?;
        let model = options.resolved_model();
        let body = build_request_body(system_prompt, user_input, &model, options);
        let url = format!("{}/v1/chat/completions", self.base_url);

        debug!(url = %url, model = %model, provider = "openai", "sending completion request");

        let resp = self
            .http
            .post(&url)
            .headers(headers)
            .timeout(options.timeout())
            .body(body)
            .send()
            .await
            .map_err(error_from_transport)?;

        let status = resp.status();
        let text = resp.text().await.map_err(error_from_transport)?;
        if !status.is_success() {
            return Err(error_from_status(status.as_u16(), &text));
        }

        parse_response(&text)
    }
}

fn build_request_body(
    system_prompt: &str,
    user_input: &str,
    model: &str,
    options: &BackendOptions,
) -> String {
    let request = ChatRequest {
        model,
        max_tokens: options.max_tokens,
        temperature: options.temperature,
        messages: vec![
            ChatMessage {
                role: "system",
                content: system_prompt,
            },
            ChatMessage {
                role: "user",
                content: user_input,
            },
        ],
    };
    serde_json::to_string(&request).unwrap_or_default()
}

fn parse_response(text: &str) -> Result<Completion, BackendError> {
    let response: ChatResponse = serde_json::from_str(text).map_err(|e| {
        BackendError::MalformedResponse(format!(
            "Chat Completions API のレスポンスを解釈できません: {e}"
        ))
    })?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::MalformedResponse("choices が空です".to_string()))?;

    let content = choice.message.content.unwrap_or_default();
    if content.is_empty() {
        return Err(BackendError::MalformedResponse(
            "No content in response".to_string(),
        ));
    }

    let stop_reason = match choice.finish_reason.as_deref() {
        Some("stop") => StopReason::EndTurn,
        Some("length") => StopReason::MaxTokens,
        Some("content_filter") => StopReason::ContentFilter,
        _ => StopReason::Unknown,
    };

    Ok(Completion {
        content,
        token_usage: TokenUsage {
            input_tokens: response.usage.prompt_tokens,
            output_tokens: response.usage.completion_tokens,
        },
        stop_reason,
        model: if response.model.is_empty() {
            "unknown".to_string()
        } else {
            response.model
        },
    })
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_success() {
        let json = r#"{
            "id": "chatcmpl-1",
            "model": "gpt-4o",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hello, world!"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;

        let completion = parse_response(json).unwrap();
        assert_eq!(completion.content, "Hello, world!");
        assert_eq!(completion.model, "gpt-4o");
        assert_eq!(completion.token_usage.input_tokens, 10);
        assert_eq!(completion.token_usage.output_tokens, 5);
        assert_eq!(completion.stop_reason, StopReason::EndTurn);
    }

    #[test]
    fn test_parse_response_max_tokens() {
        let json = r#"{"model": "gpt-4o", "choices": [{"message": {"content": "Truncated"}, "finish_reason": "length"}]}"#;
        let completion = parse_response(json).unwrap();
        assert_eq!(completion.stop_reason, StopReason::MaxTokens);
        assert_eq!(completion.token_usage.total(), 0);
    }

    #[test]
    fn test_parse_response_empty_content() {
        let json = r#"{"model": "gpt-4o", "choices": [{"message": {"content": null}, "finish_reason": "stop"}]}"#;
        assert!(matches!(parse_response(json), Err(BackendError::MalformedResponse(_))));

        let json = r#"{"model": "gpt-4o", "choices": []}"#;
        assert!(matches!(parse_response(json), Err(BackendError::MalformedResponse(_))));
    }

    #[test]
    fn test_parse_response_invalid_json() {
        assert!(matches!(
            parse_response("not valid json"),
            Err(BackendError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_request_body_has_system_message() {
        let options = BackendOptions::default();
        let body = build_request_body("sys", "hello", "gpt-4o-mini", &options);
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();

        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "hello");
    }

    #[tokio::test]
    async fn test_missing_api_key_is_unauthorized() {
        let options = BackendOptions::default();
        let backend = OpenAiBackend::new(&options, None).unwrap();
        assert!(backend.missing_credentials().is_some_and(|m| m.contains(API_KEY_ENV)));
        assert_eq!(
            OpenAiBackend::new(&options, Some("key".to_string())).unwrap().missing_credentials(),
            None
        );
        let result = backend.complete("sys", "hello", &options).await;
        assert!(matches!(result, Err(BackendError::Unauthorized(_))));
    }
}

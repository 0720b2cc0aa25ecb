//! Anthropic Messages API クライアント
//!
//! # 責務
//!
//! - Anthropic Messages API (`POST /v1/messages`) との通信を担当
//! - [`Backend`] トレイトを実装し、統一インターフェースを提供
//! - Anthropic 固有の JSON 形式と共通型の変換
//!
//! # 認証
//!
//! 環境変数 `ANTHROPIC_API_KEY` の値を `x-api-key` ヘッダーで送信します。
//!
//! # レスポンス形式
//!
//! ```json
//! {
//!   "model": "claude-sonnet-4-5",
//!   "content": [{"type": "text", "text": "..."}],
//!   "stop_reason": "end_turn",
//!   "usage": {"input_tokens": 100, "output_tokens": 250}
//! }
//! ```

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::settings::BackendOptions;
use crate::error::BackendError;
use super::traits::{Backend, Completion, StopReason, TokenUsage};
use super::{error_from_status, error_from_transport};

/// デフォルトのエンドポイント
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// API キーを読み込む環境変数
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// `anthropic-version` ヘッダーの値
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API クライアント
pub struct AnthropicBackend {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl AnthropicBackend {
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
            "x-api-key",
            HeaderValue::from_str(api_key)
                .map_err(|e| BackendError::Unauthorized(format!("API キーが不正です: {e}")))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

#[async_trait]
impl Backend for AnthropicBackend {
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
        let url = format!("{}/v1/messages", self.base_url);

        debug!(url = %url, model = %model, provider = "anthropic", "sending completion request");

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
    let request = MessagesRequest {
        model,
        max_tokens: options.max_tokens,
        temperature: options.temperature,
        system: system_prompt,
        messages: vec![RequestMessage {
            role: "user",
            content: user_input,
        }],
    };
    // 文字列と数値のみの構造体なので直列化は失敗しない
    serde_json::to_string(&request).unwrap_or_default()
}

/// レスポンス本文を共通形式に変換
fn parse_response(text: &str) -> Result<Completion, BackendError> {
    let response: MessagesResponse = serde_json::from_str(text).map_err(|e| {
        BackendError::MalformedResponse(format!("Messages API のレスポンスを解釈できません: {e}"))
    })?;

    let content: String = response
        .content
        .iter()
        .filter(|block| block.block_type == "text")
        .filter_map(|block| block.text.as_deref())
        .collect();

    if content.is_empty() {
        return Err(BackendError::MalformedResponse(
            "No content in response".to_string(),
        ));
    }

    let stop_reason = match response.stop_reason.as_deref() {
        Some("end_turn") => StopReason::EndTurn,
        Some("max_tokens") => StopReason::MaxTokens,
        Some("stop_sequence") => StopReason::StopSequence,
        Some("refusal") => StopReason::ContentFilter,
        _ => StopReason::Unknown,
    };

    Ok(Completion {
        content,
        token_usage: TokenUsage {
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
        },
        stop_reason,
        model: response.model,
    })
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: String,
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        let json = r#"{
            "id": "msg_01",
            "type": "message",
            "model": "claude-sonnet-4-5",
            "content": [
                {"type": "text", "text": "{\"match\": "},
                {"type": "text", "text": "false}"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 20}
        }"#;

        let completion = parse_response(json).unwrap();
        assert_eq!(completion.content, "{\"match\": false}");
        assert_eq!(completion.model, "claude-sonnet-4-5");
        assert_eq!(completion.token_usage.total(), 30);
        assert_eq!(completion.stop_reason, StopReason::EndTurn);
    }

    #[test]
    fn test_parse_response_without_text() {
        let json = r#"{"model": "m", "content": [], "stop_reason": "max_tokens"}"#;
        assert!(matches!(
            parse_response(json),
            Err(BackendError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_response("<html>bad gateway</html>"),
            Err(BackendError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_request_body_shape() {
        let options = BackendOptions::default();
        let body = build_request_body("sys", "hello", "claude-haiku-4-5", &options);
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();

        assert_eq!(value["model"], "claude-haiku-4-5");
        assert_eq!(value["system"], "sys");
        assert_eq!(value["max_tokens"], 512);
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "hello");
    }

    #[tokio::test]
    async fn test_missing_api_key_is_unauthorized() {
        let options = BackendOptions::default();
        let backend = AnthropicBackend::new(&options, None).unwrap();
        assert!(backend.missing_credentials().is_some_and(|m| m.contains(API_KEY_ENV)));
        assert_eq!(
            AnthropicBackend::new(&options, Some("key".to_string())).unwrap().missing_credentials(),
            None
        );
        let result = backend.complete("sys", "hello", &options).await;
        assert!(matches!(result, Err(BackendError::Unauthorized(msg)) if msg.contains(API_KEY_ENV)));
    }
}

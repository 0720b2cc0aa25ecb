//! LLM バックエンド抽象化レイヤー
//!
//! # 責務
//!
//! - 複数の LLM プロバイダー（Anthropic, OpenAI）を統一的に扱うインターフェースを提供
//! - 設定に応じた適切なクライアントを生成するファクトリー機能
//! - プロバイダー固有の HTTP ステータス・エラーを [`BackendError`] に正規化
//! - タイムアウトの強制
//!
//! # モジュール構成
//!
//! - `traits` - 共通インターフェース（[`Backend`] トレイト等）
//! - `extract` - LLM 出力から候補を取り出す正規化処理
//! - `model_tier` - モデルティアマッピング
//! - `anthropic` - Anthropic Messages API クライアント
//! - `openai` - OpenAI Chat Completions API クライアント
//!
//! # 使用例
//!
//! ```rust,no_run
//! use mentat::backend::{create_backend, extract_with_timeout};
//! use mentat::config::BackendOptions;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 事前に ANTHROPIC_API_KEY の設定が必要
//!     let options = BackendOptions::default();
//!     let backend = create_backend(&options)?;
//!
//!     let response = extract_with_timeout(
//!         backend.as_ref(),
//!         "Return the matching workflow as JSON.",
//!         "Post a tweet saying 'hi'",
//!         &options,
//!     ).await?;
//!
//!     println!("{:?}", response.extraction);
//!     Ok(())
//! }
//! ```

pub mod anthropic;
pub mod extract;
pub mod model_tier;
pub mod openai;
pub mod traits;

use std::sync::Arc;

use tracing::{debug, warn};

pub use extract::{Candidate, Extraction};
pub use traits::{Backend, BackendResponse, Completion, StopReason, TokenUsage};

use crate::config::intent::Provider;
use crate::config::settings::BackendOptions;
use crate::error::BackendError;

/// HTTP エラー本文をメッセージに含める最大文字数
const ERROR_BODY_CHARS: usize = 300;

/// バックエンドクライアントを生成するファクトリー関数
///
/// APIキーは各プロバイダーの環境変数（`ANTHROPIC_API_KEY` / `OPENAI_API_KEY`）から
/// 読み込まれます。キーが未設定でも生成は成功し、呼び出し時に
/// [`BackendError::Unauthorized`] が返されます。
///
/// # エラー
///
/// - [`BackendError::Unavailable`] - HTTP クライアントの初期化に失敗
pub fn create_backend(options: &BackendOptions) -> Result<Arc<dyn Backend>, BackendError> {
    debug!(provider = %options.provider, model = %options.resolved_model(), "creating backend");
    match options.provider {
        Provider::Anthropic => Ok(Arc::new(anthropic::AnthropicBackend::from_env(options)?)),
        Provider::OpenAI => Ok(Arc::new(openai::OpenAiBackend::from_env(options)?)),
    }
}

/// タイムアウト付きでテキスト応答を取得する
///
/// `options.timeout_ms` を超えた場合は [`BackendError::Timeout`] を返します。
/// 呼び出し側に状態は残りません。
pub async fn complete_with_timeout(
    backend: &dyn Backend,
    system_prompt: &str,
    user_input: &str,
    options: &BackendOptions,
) -> Result<Completion, BackendError> {
    match tokio::time::timeout(
        options.timeout(),
        backend.complete(system_prompt, user_input, options),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => {
            warn!(timeout_ms = options.timeout_ms, "backend completion timed out");
            Err(timeout_error(options))
        }
    }
}

/// タイムアウト付きで候補を抽出する
pub async fn extract_with_timeout(
    backend: &dyn Backend,
    system_prompt: &str,
    user_input: &str,
    options: &BackendOptions,
) -> Result<BackendResponse, BackendError> {
    match tokio::time::timeout(
        options.timeout(),
        backend.extract_candidates(system_prompt, user_input, options),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => {
            warn!(timeout_ms = options.timeout_ms, "backend extraction timed out");
            Err(timeout_error(options))
        }
    }
}

fn timeout_error(options: &BackendOptions) -> BackendError {
    BackendError::Timeout(format!("{}ms 以内に応答がありませんでした", options.timeout_ms))
}

/// 失敗した HTTP レスポンスを [`BackendError`] に分類する
pub(crate) fn error_from_status(status: u16, body: &str) -> BackendError {
    let detail: String = body.chars().take(ERROR_BODY_CHARS).collect();
    match status {
        401 | 403 => BackendError::Unauthorized(format!("HTTP {status}: {detail}")),
        429 => BackendError::RateLimited,
        408 | 504 => BackendError::Timeout(format!("HTTP {status}")),
        _ => BackendError::Unavailable(format!("HTTP {status}: {detail}")),
    }
}

/// 送信時の reqwest エラーを [`BackendError`] に分類する
pub(crate) fn error_from_transport(error: reqwest::Error) -> BackendError {
    if error.is_timeout() {
        BackendError::Timeout(error.to_string())
    } else {
        BackendError::Unavailable(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    struct SlowBackend;

    #[async_trait]
    impl Backend for SlowBackend {
        async fn complete(
            &self,
            _system_prompt: &str,
            _user_input: &str,
            _options: &BackendOptions,
        ) -> Result<Completion, BackendError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Err(BackendError::Unavailable("unreachable".to_string()))
        }
    }

    #[test]
    fn test_error_from_status() {
        assert!(matches!(error_from_status(401, "bad key"), BackendError::Unauthorized(_)));
        assert!(matches!(error_from_status(403, ""), BackendError::Unauthorized(_)));
        assert_eq!(error_from_status(429, ""), BackendError::RateLimited);
        assert!(matches!(error_from_status(504, ""), BackendError::Timeout(_)));
        assert!(matches!(error_from_status(500, "oops"), BackendError::Unavailable(msg) if msg.contains("oops")));
    }

    #[tokio::test]
    async fn test_extract_with_timeout_elapses() {
        let options = BackendOptions {
            timeout_ms: 20,
            ..BackendOptions::default()
        };
        let result = extract_with_timeout(&SlowBackend, "s", "u", &options).await;
        assert!(matches!(result, Err(BackendError::Timeout(_))));

        let result = complete_with_timeout(&SlowBackend, "s", "u", &options).await;
        assert!(matches!(result, Err(BackendError::Timeout(_))));
    }

    #[test]
    fn test_create_backend_for_each_provider() {
        for provider in [Provider::Anthropic, Provider::OpenAI] {
            let options = BackendOptions {
                provider,
                ..BackendOptions::default()
            };
            assert!(create_backend(&options).is_ok());
        }
    }
}

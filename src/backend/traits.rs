//! LLM バックエンドの共通インターフェース定義
//!
//! # 責務
//!
//! - LLM プロバイダー（Anthropic, OpenAI 等）の共通トレイト [`Backend`] を定義
//! - プロバイダー非依存のレスポンス型 [`Completion`] / [`BackendResponse`] を提供
//! - トークン使用量 [`TokenUsage`] と停止理由 [`StopReason`] の型を定義
//!
//! プロバイダーを差し替えても、他のコンポーネントの振る舞いは変わりません。
//! システムを LLM 非依存に保つ継ぎ目はこのトレイトだけです。
//!
//! # 使用例
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mentat::backend::Backend;
//! use mentat::config::BackendOptions;
//!
//! async fn example(backend: Arc<dyn Backend>) {
//!     let options = BackendOptions::default();
//!     let completion = backend
//!         .complete("You are a helpful assistant.", "Hello!", &options)
//!         .await
//!         .unwrap();
//!
//!     println!("Response: {}", completion.content);
//!     println!("Tokens: {}", completion.token_usage.total());
//! }
//! ```

use async_trait::async_trait;
use serde::Serialize;

use crate::config::settings::BackendOptions;
use crate::error::BackendError;
use super::extract::{Extraction, parse_extraction};

/// LLM バックエンドの共通インターフェース
///
/// 実装するのは [`complete`](Backend::complete) だけで十分です。
/// [`extract_candidates`](Backend::extract_candidates) は `complete` の出力を
/// 共通の候補形式に正規化するデフォルト実装を持ちます。ランク付き候補リストを
/// ネイティブに返せるプロバイダーはこちらを上書きできます。
///
/// # 実装要件
///
/// - `Send + Sync`: 並行するコマンド間で共有可能
/// - 内部で自動リトライしない（必要ならプロバイダー固有層で行う）
#[async_trait]
pub trait Backend: Send + Sync {
    /// プロンプトを実行し、テキスト応答を取得する
    ///
    /// # エラー
    ///
    /// - [`BackendError::Unauthorized`] - 認証失敗
    /// - [`BackendError::RateLimited`] - レート制限超過
    /// - [`BackendError::Timeout`] - タイムアウト
    /// - [`BackendError::MalformedResponse`] - 不正なレスポンス
    /// - [`BackendError::Unavailable`] - 通信失敗
    async fn complete(
        &self,
        system_prompt: &str,
        user_input: &str,
        options: &BackendOptions,
    ) -> Result<Completion, BackendError>;

    /// 呼び出しに必要な資格情報が欠けている場合、その説明を返す
    ///
    /// ネットワークには触れません。既定では常に `None` です。
    fn missing_credentials(&self) -> Option<String> {
        None
    }

    /// プロンプトを実行し、構造化された候補を抽出する
    ///
    /// 応答が期待する構造として解釈できない場合は
    /// [`BackendError::MalformedResponse`] を返し、生テキストは返しません。
    async fn extract_candidates(
        &self,
        system_prompt: &str,
        user_input: &str,
        options: &BackendOptions,
    ) -> Result<BackendResponse, BackendError> {
        let completion = self.complete(system_prompt, user_input, options).await?;
        let extraction = parse_extraction(&completion.content)?;

        Ok(BackendResponse {
            raw: completion.content,
            extraction,
            model: completion.model,
            token_usage: completion.token_usage,
        })
    }
}

/// LLM のテキスト応答
///
/// プロバイダー固有のレスポンス形式を共通の型に変換したもの。
#[derive(Debug, Clone)]
pub struct Completion {
    /// LLM が生成したテキスト
    pub content: String,

    /// トークン使用量
    pub token_usage: TokenUsage,

    /// 生成停止理由
    pub stop_reason: StopReason,

    /// 使用されたモデル名
    pub model: String,
}

/// 候補抽出の結果
///
/// 1回の解析試行の間だけパーサーが所有します。
#[derive(Debug, Clone)]
pub struct BackendResponse {
    /// プロバイダーの生出力
    pub raw: String,

    /// 正規化済みの抽出結果
    pub extraction: Extraction,

    /// 使用されたモデル名
    pub model: String,

    /// トークン使用量
    pub token_usage: TokenUsage,
}

/// トークン使用量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    /// 入力トークン数（プロンプト）
    pub input_tokens: u32,

    /// 出力トークン数（LLM 生成テキスト）
    pub output_tokens: u32,
}

impl TokenUsage {
    /// 総トークン数を計算
    pub fn total(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// LLM の生成停止理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// 自然な終了
    EndTurn,

    /// 最大トークン数到達
    MaxTokens,

    /// 停止シーケンス検出
    StopSequence,

    /// コンテンツフィルター発動
    ContentFilter,

    /// 不明な理由
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::extract::Candidate;

    struct FixedBackend(String);

    #[async_trait]
    impl Backend for FixedBackend {
        async fn complete(
            &self,
            _system_prompt: &str,
            _user_input: &str,
            _options: &BackendOptions,
        ) -> Result<Completion, BackendError> {
            Ok(Completion {
                content: self.0.clone(),
                token_usage: TokenUsage { input_tokens: 10, output_tokens: 5 },
                stop_reason: StopReason::EndTurn,
                model: "fixed".to_string(),
            })
        }
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage {
            input_tokens: 100,
            output_tokens: 250,
        };
        assert_eq!(usage.total(), 350);

        let huge = TokenUsage {
            input_tokens: u32::MAX,
            output_tokens: 1,
        };
        assert_eq!(huge.total(), u32::MAX);
    }

    #[tokio::test]
    async fn test_default_extract_candidates() {
        let backend = FixedBackend(
            r#"{"workflow":"twitter","intent":"postTweet","parameters":{"text":"hi"}}"#.to_string(),
        );
        let response = backend
            .extract_candidates("system", "input", &BackendOptions::default())
            .await
            .unwrap();

        assert_eq!(response.model, "fixed");
        assert_eq!(response.token_usage.total(), 15);
        match response.extraction {
            Extraction::Candidates(candidates) => {
                assert_eq!(candidates.len(), 1);
                let Candidate { workflow, intent, .. } = &candidates[0];
                assert_eq!(workflow, "twitter");
                assert_eq!(intent, "postTweet");
            }
            other => panic!("unexpected extraction: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_default_extract_candidates_malformed() {
        let backend = FixedBackend("Sure! I'd love to help with that.".to_string());
        let result = backend
            .extract_candidates("system", "input", &BackendOptions::default())
            .await;
        assert!(matches!(result, Err(BackendError::MalformedResponse(_))));
    }
}

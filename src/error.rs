//! エラー型の定義
//!
//! このモジュールは、Mentat 全体で使用されるエラー型を定義します。
//!
//! - [`ConfigError`] - 設定ファイル・ワークフロー定義の読み込みエラー
//! - [`BackendError`] - LLM バックエンド呼び出しのエラー
//! - [`RegistryError`] - ワークフローレジストリの登録・検索エラー
//!
//! コマンド解析の検証エラーは [`crate::engine::ParseError`]、
//! ワークフロー実行時のエラーは [`crate::workflow::WorkflowError`] を参照してください。

use thiserror::Error;

/// 設定関連のエラー
#[derive(Debug, Error)]
pub enum ConfigError {
    /// ファイルの読み込みに失敗
    #[error("設定ファイルの読み込みに失敗しました: {0}")]
    FileRead(#[from] std::io::Error),

    /// TOML のデシリアライズに失敗
    #[error("TOML のデシリアライズに失敗しました: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    /// TOML のシリアライズに失敗
    #[error("TOML のシリアライズに失敗しました: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// バリデーションエラー
    #[error("設定のバリデーションに失敗しました: {0}")]
    Validation(String),
}

/// LLM バックエンドのエラー
///
/// プロバイダー固有のエラー（HTTP ステータス、レスポンス形式の差異等）は
/// すべてこの型に正規化されます。パーサーはこの型だけを見ればよく、
/// プロバイダーごとの癖を意識する必要はありません。
///
/// [`crate::engine::ParseResult`] に載せて運ぶため `Clone + PartialEq` です。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    /// 認証失敗（APIキー未設定・無効）
    #[error("認証に失敗しました: {0}")]
    Unauthorized(String),

    /// レート制限超過
    #[error("レート制限を超過しました。しばらく待ってから再試行してください")]
    RateLimited,

    /// タイムアウト
    #[error("タイムアウトしました: {0}")]
    Timeout(String),

    /// 期待する構造として解釈できないレスポンス
    #[error("不正なレスポンスです: {0}")]
    MalformedResponse(String),

    /// 通信失敗・分類できないプロバイダーエラー
    #[error("バックエンドを利用できません: {0}")]
    Unavailable(String),
}

/// ワークフローレジストリのエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// 同名のワークフローが既に登録されている
    #[error("ワークフロー '{0}' は既に登録されています")]
    DuplicateWorkflow(String),

    /// ワークフローが見つからない
    #[error("ワークフロー '{0}' が見つかりません")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::Timeout("30000ms".to_string());
        assert!(err.to_string().contains("30000ms"));
        assert_eq!(BackendError::RateLimited, BackendError::RateLimited);
    }

    #[test]
    fn test_config_error_from_toml() {
        let err: ConfigError = toml::from_str::<toml::Value>("= broken")
            .unwrap_err()
            .into();
        assert!(matches!(err, ConfigError::TomlDeserialize(_)));
    }
}

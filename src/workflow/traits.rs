//! ワークフローの共通インターフェース定義
//!
//! # 責務
//!
//! - 実行可能なワークフローの共通トレイト [`Workflow`] を定義
//! - 成功時のペイロード [`Payload`] と失敗時の [`WorkflowError`] を定義
//!
//! ワークフローは自身の記述子を公開し、検証済みのパラメータだけを受け取ります。
//! パラメータの再検証は不要です。

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::config::descriptor::WorkflowDescriptor;
use crate::engine::ParamMap;

/// 実行可能なワークフロー
#[async_trait]
pub trait Workflow: Send + Sync {
    /// このワークフローの記述子（レジストリに登録されるもの）
    fn descriptor(&self) -> &WorkflowDescriptor;

    /// インテントを実行する
    ///
    /// `parameters` はインテントのスキーマで検証済みです。
    async fn invoke(&self, intent: &str, parameters: &ParamMap) -> Result<Payload, WorkflowError>;
}

/// ワークフローの成功結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payload {
    /// ユーザーに表示する要約
    pub summary: String,
    /// 構造化データ
    pub data: serde_json::Value,
}

impl Payload {
    pub fn new(summary: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            summary: summary.into(),
            data,
        }
    }
}

/// ワークフロー実行エラー
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct WorkflowError {
    pub kind: WorkflowErrorKind,
    pub message: String,
}

impl WorkflowError {
    pub fn new(kind: WorkflowErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// ワークフロー失敗の分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowErrorKind {
    /// 資格情報が未設定または無効
    MissingCredentials,
    /// 外部サービスがリクエストを拒否した
    UpstreamRejected,
    /// 外部サービスに到達できない
    UpstreamUnavailable,
    /// 権限不足
    PermissionDenied,
    /// インテントやワークフローが存在しない
    Unknown,
}

impl WorkflowErrorKind {
    /// 対話的なトラブルシューティングで解決できる可能性があるか
    pub fn is_troubleshootable(self) -> bool {
        matches!(
            self,
            WorkflowErrorKind::MissingCredentials | WorkflowErrorKind::PermissionDenied
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowErrorKind::MissingCredentials => "missing_credentials",
            WorkflowErrorKind::UpstreamRejected => "upstream_rejected",
            WorkflowErrorKind::UpstreamUnavailable => "upstream_unavailable",
            WorkflowErrorKind::PermissionDenied => "permission_denied",
            WorkflowErrorKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for WorkflowErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_troubleshootable_kinds() {
        assert!(WorkflowErrorKind::MissingCredentials.is_troubleshootable());
        assert!(WorkflowErrorKind::PermissionDenied.is_troubleshootable());
        assert!(!WorkflowErrorKind::UpstreamRejected.is_troubleshootable());
        assert!(!WorkflowErrorKind::UpstreamUnavailable.is_troubleshootable());
        assert!(!WorkflowErrorKind::Unknown.is_troubleshootable());
    }

    #[test]
    fn test_error_display() {
        let err = WorkflowError::new(WorkflowErrorKind::UpstreamRejected, "duplicate content");
        assert_eq!(err.to_string(), "upstream_rejected: duplicate content");
    }
}

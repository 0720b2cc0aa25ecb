//! トラブルシューティングのコンテキスト
//!
//! # 責務
//!
//! - 失敗したディスパッチの情報を [`TroubleshootContext`] として明示的に受け渡す
//! - 対話的なトラブルシューティングの外部フック [`TroubleshootHook`] を定義
//!
//! プロセス全体で共有される「現在のセッション」は持ちません。
//! 必要な情報はすべてコンテキストとしてフックに渡されます。

use async_trait::async_trait;
use serde::Serialize;

use crate::workflow::WorkflowErrorKind;
use super::result::Invocation;

/// トラブルシューティングに渡す情報
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TroubleshootContext {
    pub kind: WorkflowErrorKind,
    pub message: String,
    /// 失敗したワークフロー（手動で開始した場合は `None`）
    pub workflow: Option<String>,
    pub intent: Option<String>,
    /// 登録済みワークフローの一覧
    pub available_workflows: Vec<String>,
}

impl TroubleshootContext {
    /// 失敗した呼び出しからコンテキストを作る
    pub fn for_invocation(
        invocation: &Invocation,
        kind: WorkflowErrorKind,
        message: impl Into<String>,
        available_workflows: Vec<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            workflow: Some(invocation.workflow.clone()),
            intent: Some(invocation.intent.clone()),
            available_workflows,
        }
    }

    /// ユーザーが手動で開始した場合のコンテキスト
    pub fn manual(available_workflows: Vec<String>) -> Self {
        Self {
            kind: WorkflowErrorKind::Unknown,
            message: "ユーザーがトラブルシューティングを開始しました".to_string(),
            workflow: None,
            intent: None,
            available_workflows,
        }
    }

    /// LLM に渡す説明文
    pub fn describe(&self) -> String {
        let mut lines = vec![format!("Error kind: {}", self.kind), format!("Message: {}", self.message)];
        if let (Some(workflow), Some(intent)) = (&self.workflow, &self.intent) {
            lines.push(format!("Failed command: {workflow}.{intent}"));
        }
        if !self.available_workflows.is_empty() {
            lines.push(format!("Available workflows: {}", self.available_workflows.join(", ")));
        }
        lines.join("\n")
    }
}

/// 対話的トラブルシューティングの外部フック
#[async_trait]
pub trait TroubleshootHook: Send + Sync {
    async fn on_troubleshoot(&self, context: &TroubleshootContext);
}

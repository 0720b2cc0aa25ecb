//! ワークフローディスパッチャー
//!
//! # 責務
//!
//! - 検証済みの [`Invocation`] を具体的なワークフロー実装に渡す
//! - ワークフローの結果を [`DispatchOutcome`] に変換する
//! - トラブルシューティングで解決できそうな失敗を区別する
//!
//! パラメータの再検証やリトライは行いません。

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::workflow::{Workflow, WorkflowErrorKind};
use super::result::{DispatchOutcome, Invocation};

/// ワークフローディスパッチャー
#[derive(Default)]
pub struct Dispatcher {
    workflows: HashMap<String, Arc<dyn Workflow>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// ワークフロー実装を登録する（同名の実装は置き換える）
    pub fn install(&mut self, workflow: Arc<dyn Workflow>) {
        let name = workflow.descriptor().name().to_string();
        if self.workflows.insert(name.clone(), workflow).is_some() {
            warn!(workflow = %name, "replacing installed workflow");
        }
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.workflows.contains_key(name)
    }

    /// 呼び出しを実行する
    pub async fn dispatch(&self, invocation: &Invocation) -> DispatchOutcome {
        let Some(workflow) = self.workflows.get(&invocation.workflow) else {
            warn!(workflow = %invocation.workflow, "no implementation installed");
            return DispatchOutcome::WorkflowError {
                kind: WorkflowErrorKind::Unknown,
                message: format!("ワークフロー '{}' は利用できません", invocation.workflow),
            };
        };

        info!(
            workflow = %invocation.workflow,
            intent = %invocation.intent,
            "dispatching invocation"
        );

        match workflow.invoke(&invocation.intent, &invocation.parameters).await {
            Ok(payload) => {
                info!(workflow = %invocation.workflow, intent = %invocation.intent, "workflow succeeded");
                DispatchOutcome::Success(payload)
            }
            Err(e) if e.kind.is_troubleshootable() => {
                warn!(kind = %e.kind, error = %e.message, "workflow failed, troubleshooting available");
                DispatchOutcome::TroubleshootRequested {
                    kind: e.kind,
                    message: e.message,
                }
            }
            Err(e) => {
                warn!(kind = %e.kind, error = %e.message, "workflow failed");
                DispatchOutcome::WorkflowError {
                    kind: e.kind,
                    message: e.message,
                }
            }
        }
    }
}

//! 解析・ディスパッチ結果の型定義
//!
//! # 責務
//!
//! - 検証済みの呼び出し [`Invocation`] の型定義
//! - コマンド解析結果 [`ParseResult`] と検証エラー [`ParseError`] の型定義
//! - ディスパッチ結果 [`DispatchOutcome`] の型定義
//!
//! # 使用例
//!
//! ```rust,no_run
//! use mentat::engine::{DispatchOutcome, ParseResult};
//!
//! fn describe(result: &ParseResult) -> String {
//!     match result {
//!         ParseResult::Resolved(invocation) => format!("実行: {invocation}"),
//!         ParseResult::Ambiguous(candidates) => format!("{} 件の候補", candidates.len()),
//!         ParseResult::Unrecognized(text) => format!("理解できません: {text}"),
//!         ParseResult::ValidationFailed(errors) => format!("{} 件のエラー", errors.len()),
//!     }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::backend::Candidate;
use crate::config::intent::ParamValue;
use crate::error::BackendError;
use crate::workflow::{Payload, WorkflowErrorKind};

/// 検証済みパラメータ（名前順）
pub type ParamMap = BTreeMap<String, ParamValue>;

/// 検証済みの呼び出し
///
/// パーサーだけが生成します。パラメータはインテントのスキーマを満たしており、
/// ディスパッチャーは再検証しません。クレートの外からは組み立てられず、
/// 読み取り専用のアクセサだけを公開します。
///
/// ```rust,compile_fail
/// use mentat::engine::{Invocation, ParamMap};
///
/// let invocation = Invocation {
///     workflow: "twitter".to_string(),
///     intent: "postTweet".to_string(),
///     parameters: ParamMap::new(),
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invocation {
    pub(crate) workflow: String,
    pub(crate) intent: String,
    pub(crate) parameters: ParamMap,
}

impl Invocation {
    pub(crate) fn new(workflow: String, intent: String, parameters: ParamMap) -> Self {
        Self {
            workflow,
            intent,
            parameters,
        }
    }

    pub fn workflow(&self) -> &str {
        &self.workflow
    }

    pub fn intent(&self) -> &str {
        &self.intent
    }

    pub fn parameters(&self) -> &ParamMap {
        &self.parameters
    }

    /// 文字列パラメータを取得
    pub fn text(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).and_then(ParamValue::as_str)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}(", self.workflow, self.intent)?;
        for (i, (name, value)) in self.parameters.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        f.write_str(")")
    }
}

/// コマンド解析の結果
#[derive(Debug, Clone, PartialEq)]
pub enum ParseResult {
    /// 実行可能な呼び出しに解決できた
    Resolved(Invocation),
    /// 確信度が拮抗する候補が複数ある（呼び出し側が選ぶ）
    Ambiguous(Vec<Candidate>),
    /// 該当するワークフロー・インテントがない
    Unrecognized(String),
    /// 検証エラー（すべてのエラーを蓄積）
    ValidationFailed(Vec<ParseError>),
}

impl ParseResult {
    pub fn is_resolved(&self) -> bool {
        matches!(self, ParseResult::Resolved(_))
    }

    /// バックエンド障害による失敗かどうか
    ///
    /// 「言い方を変える」べきか「時間をおいて再試行する」べきかの判断に使います。
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            ParseResult::ValidationFailed(errors)
                if errors.iter().any(|e| matches!(e, ParseError::BackendUnavailable(_)))
        )
    }
}

/// 検証エラー
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// 必須パラメータの欠落
    #[error("必須パラメータ '{param}' がありません")]
    MissingRequired { param: String },

    /// 型変換できない値
    #[error("パラメータ '{param}' は {expected} 型である必要があります（受け取った値: {found}）")]
    TypeMismatch {
        param: String,
        expected: String,
        found: String,
    },

    /// 列挙値以外の値
    #[error("パラメータ '{param}' の値 '{value}' は許可されていません（{}）", allowed.join(" / "))]
    NotInEnum {
        param: String,
        value: String,
        allowed: Vec<String>,
    },

    /// バックエンドの障害（意味的な不一致とは区別される）
    #[error("バックエンドを利用できません: {0}")]
    BackendUnavailable(BackendError),
}

impl ParseError {
    /// エラーが参照するパラメータ名
    pub fn param(&self) -> Option<&str> {
        match self {
            ParseError::MissingRequired { param }
            | ParseError::TypeMismatch { param, .. }
            | ParseError::NotInEnum { param, .. } => Some(param),
            ParseError::BackendUnavailable(_) => None,
        }
    }
}

/// 解析状態機械の状態
///
/// `Start → PromptBuilt → BackendInvoked → Validating → 終端` の順に進み、
/// 1回の解析の中で `Start` に戻ることはありません。ログの `state` フィールドに出力されます。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    Start,
    PromptBuilt,
    BackendInvoked,
    Validating,
    Resolved,
    Ambiguous,
    Unrecognized,
    ValidationFailed,
}

impl ParseState {
    /// 結果に対応する終端状態
    pub fn terminal(result: &ParseResult) -> Self {
        match result {
            ParseResult::Resolved(_) => ParseState::Resolved,
            ParseResult::Ambiguous(_) => ParseState::Ambiguous,
            ParseResult::Unrecognized(_) => ParseState::Unrecognized,
            ParseResult::ValidationFailed(_) => ParseState::ValidationFailed,
        }
    }
}

/// ディスパッチの結果
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// ワークフローが成功した
    Success(Payload),

    /// ワークフローが失敗した（種別はトラブルシューティングまで保持される）
    WorkflowError {
        kind: WorkflowErrorKind,
        message: String,
    },

    /// 対話的なトラブルシューティングで解決できる可能性のある失敗
    TroubleshootRequested {
        kind: WorkflowErrorKind,
        message: String,
    },
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Success(_))
    }
}

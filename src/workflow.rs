//! ワークフロー抽象化レイヤー
//!
//! # 責務
//!
//! - 実行可能なワークフローの共通インターフェースを提供
//! - 具体的なワークフロー実装（Twitter）
//!
//! # モジュール構成
//!
//! - `traits` - 共通インターフェース（[`Workflow`] トレイト等）
//! - `twitter` - Twitter API v2 ワークフロー
//!
//! 新しいワークフローは [`Workflow`] を実装し、起動時に
//! [`CommandRouter`](crate::engine::CommandRouter) のビルダーへ渡すだけで登録されます。
//! コアは具体的な型を知りません。

pub mod traits;
pub mod twitter;

pub use traits::{Payload, Workflow, WorkflowError, WorkflowErrorKind};
pub use twitter::TwitterWorkflow;

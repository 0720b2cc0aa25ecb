//! 設定とワークフロー定義
//!
//! # 責務
//!
//! - アプリケーション設定（バックエンド・パーサー・ログ）の TOML 読み込み
//! - ワークフロー記述子（インテントとパラメータスキーマ）の TOML 読み込み
//! - 読み込んだ生データのバリデーション
//!
//! # モジュール構成
//!
//! - `dto` - TOML デシリアライズ用の DTO（モジュール内部専用）
//! - `settings` - アプリケーション設定 [`AppConfig`]
//! - `descriptor` - ワークフロー記述子 [`WorkflowDescriptor`]
//! - `intent` - インテント・パラメータ定義とプロバイダー列挙型
//!
//! どちらの設定も同じ流れで読み込まれます。
//!
//! ```text
//! TOML
//!   ↓ (デシリアライズ)
//! *Dto
//!   ↓ (TryFrom でバリデーション)
//! ドメインモデル
//! ```

mod dto;
pub mod descriptor;
pub mod intent;
pub mod settings;

pub use descriptor::WorkflowDescriptor;
pub use intent::{IntentSpec, ModelTier, ParamType, ParamValue, ParameterSpec, Provider};
pub use settings::{AppConfig, BackendOptions, LogFormat, LoggingConfig, ParserOptions};

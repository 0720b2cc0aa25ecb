//! Mentat: 自然言語コマンドルーター
//!
//! 自然言語のコマンドを LLM バックエンドで構造化し、登録済みワークフローの
//! インテント呼び出しとして検証・実行します。
//!
//! # モジュール構成
//!
//! - [`config`] - アプリケーション設定とワークフロー記述子
//! - [`backend`] - LLM バックエンド抽象化（Anthropic / OpenAI）
//! - [`registry`] - ワークフローレジストリ
//! - [`engine`] - コマンドパーサー・ディスパッチャー・ルーター
//! - [`workflow`] - ワークフローの共通インターフェースと Twitter ワークフロー
//! - [`cli`] - 対話型 CLI
//! - [`logging`] - ログ出力の初期化
//! - [`error`] - エラー型

pub mod backend;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod registry;
pub mod workflow;

//! コマンドルーティングエンジン
//!
//! # 責務
//!
//! - 自然言語コマンドを検証済みの呼び出しに変換（パーサー）
//! - 呼び出しを具体的なワークフロー実装へ振り分け（ディスパッチャー）
//! - 失敗時のトラブルシューティングフックへの受け渡し
//!
//! # モジュール構成
//!
//! - [`prompt`][]: 抽出プロンプトの組み立て
//! - [`coerce`][]: パラメータの型変換と検証
//! - [`parser`][]: コマンド解析の状態機械
//! - [`dispatcher`][]: ワークフローの呼び出しと結果の分類
//! - [`context`][]: トラブルシューティングのコンテキストとフック
//! - [`router`][]: 解析からディスパッチまでを束ねる窓口
//! - [`result`][]: 結果型
//!
//! # 処理の流れ
//!
//! 1. レジストリの全記述子からシステムプロンプトを組み立てる
//! 2. バックエンドに候補を抽出させる（タイムアウト付き）
//! 3. 候補をレジストリとスキーマで検証する
//! 4. `Resolved` の場合だけディスパッチする

pub mod coerce;
pub mod context;
pub mod dispatcher;
pub mod parser;
pub mod prompt;
pub mod result;
pub mod router;

// 公開APIの再エクスポート
pub use context::{TroubleshootContext, TroubleshootHook};
pub use dispatcher::Dispatcher;
pub use parser::CommandParser;
pub use result::{DispatchOutcome, Invocation, ParamMap, ParseError, ParseResult, ParseState};
pub use router::{CommandRouter, CommandRouterBuilder, RouteOutcome};

//! TOML デシリアライズ用の DTO (Data Transfer Object)
//!
//! # 責務
//!
//! このモジュールは、TOML ファイルからのデータ読み込み専用の構造体を提供します。
//! DTO はバリデーション前の「生データ」を表現し、ドメインモデルとは分離されています。
//!
//! - **TOML 構造への密結合**: TOML の構造変更に柔軟に対応
//! - **バリデーション前の状態**: 不正なデータも一旦受け入れる
//! - **カプセル化**: config モジュール内部のみで使用（外部非公開）

use serde::{Deserialize, Serialize};

use super::intent::{ModelTier, Provider};
use super::settings::LogFormat;

// ---------------------------------------------------------------------------
// ワークフロー記述子
// ---------------------------------------------------------------------------

/// ワークフロー記述子 DTO
///
/// TOML の `[workflow]` セクションと `[[intents]]` 配列をデシリアライズ/シリアライズします。
///
/// **注**: 外部からは [`WorkflowDescriptor`](super::descriptor::WorkflowDescriptor) を使用してください。
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct WorkflowDescriptorDto {
    /// ワークフローのメタデータ
    pub(super) workflow: WorkflowMetadataDto,
    /// インテントの配列
    #[serde(default)]
    pub(super) intents: Vec<IntentDto>,
}

/// ワークフローメタデータ DTO
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct WorkflowMetadataDto {
    pub(super) name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) description: Option<String>,
}

/// インテント DTO
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct IntentDto {
    pub(super) name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) description: Option<String>,
    #[serde(default)]
    pub(super) examples: Vec<String>,
    #[serde(default)]
    pub(super) parameters: Vec<ParameterDto>,
}

/// パラメータ DTO
///
/// `type` は文字列のまま受け取り、ドメインモデルへの変換時に解釈します。
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct ParameterDto {
    pub(super) name: String,
    #[serde(rename = "type")]
    pub(super) param_type: String,
    #[serde(default)]
    pub(super) required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) default: Option<toml::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) values: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// アプリケーション設定
// ---------------------------------------------------------------------------

/// アプリケーション設定 DTO
///
/// すべてのセクションは省略可能で、省略時はデフォルト値が使われます。
#[derive(Debug, Default, Deserialize)]
pub(super) struct AppConfigDto {
    #[serde(default)]
    pub(super) backend: BackendDto,
    #[serde(default)]
    pub(super) parser: ParserDto,
    #[serde(default)]
    pub(super) logging: LoggingDto,
}

/// `[backend]` セクション
#[derive(Debug, Default, Deserialize)]
pub(super) struct BackendDto {
    pub(super) provider: Option<Provider>,
    pub(super) model_tier: Option<ModelTier>,
    pub(super) model: Option<String>,
    pub(super) max_tokens: Option<u32>,
    pub(super) temperature: Option<f32>,
    pub(super) timeout_ms: Option<u64>,
    pub(super) base_url: Option<String>,
}

/// `[parser]` セクション
#[derive(Debug, Default, Deserialize)]
pub(super) struct ParserDto {
    pub(super) ambiguity_epsilon: Option<f64>,
}

/// `[logging]` セクション
#[derive(Debug, Default, Deserialize)]
pub(super) struct LoggingDto {
    pub(super) level: Option<String>,
    pub(super) format: Option<LogFormat>,
    pub(super) directory: Option<String>,
}

//! アプリケーション設定
//!
//! # 責務
//!
//! - `mentat.toml` の読み込みとバリデーション
//! - 環境変数（`LLM_PROVIDER` / `LLM_MODEL`）による上書き
//! - バックエンド・パーサー・ログの各設定値の提供
//!
//! バックエンドの選択はプロセス全体の設定として起動時に一度だけ決まり、
//! 以降は読み取り専用です。
//!
//! # 使用例
//!
//! ```toml
//! [backend]
//! provider = "openai"
//! model_tier = "light"
//! timeout_ms = 15000
//!
//! [parser]
//! ambiguity_epsilon = 0.05
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! directory = "logs"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::model_tier::resolve_model;
use crate::error::ConfigError;
use super::dto::{AppConfigDto, BackendDto, LoggingDto, ParserDto};
use super::intent::{ModelTier, Provider};

const DEFAULT_MAX_TOKENS: u32 = 512;
const DEFAULT_TEMPERATURE: f32 = 0.0;
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_AMBIGUITY_EPSILON: f64 = 0.1;
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// プロバイダーを上書きする環境変数
pub const ENV_PROVIDER: &str = "LLM_PROVIDER";
/// モデル名を上書きする環境変数
pub const ENV_MODEL: &str = "LLM_MODEL";

/// アプリケーション設定（ドメインモデル）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppConfig {
    pub backend: BackendOptions,
    pub parser: ParserOptions,
    pub logging: LoggingConfig,
}

/// バックエンド呼び出しのオプション
#[derive(Debug, Clone, PartialEq)]
pub struct BackendOptions {
    /// 使用するプロバイダー
    pub provider: Provider,
    /// モデルティア（`model` が未指定の場合に使用）
    pub model_tier: ModelTier,
    /// 明示的なモデル名（ティアより優先）
    pub model: Option<String>,
    /// 最大出力トークン数
    pub max_tokens: u32,
    /// サンプリング温度
    pub temperature: f32,
    /// 1回の呼び出しのタイムアウト（ミリ秒）
    pub timeout_ms: u64,
    /// エンドポイントの上書き（プロキシやテスト用）
    pub base_url: Option<String>,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            provider: Provider::Anthropic,
            model_tier: ModelTier::Medium,
            model: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            base_url: None,
        }
    }
}

impl BackendOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// 実際に使用するモデル名を解決する
    pub fn resolved_model(&self) -> String {
        match &self.model {
            Some(model) => model.clone(),
            None => resolve_model(&self.provider, &self.model_tier).to_string(),
        }
    }
}

/// コマンドパーサーのオプション
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParserOptions {
    /// 上位2候補の確信度差がこの値以下なら曖昧とみなす
    pub ambiguity_epsilon: f64,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            ambiguity_epsilon: DEFAULT_AMBIGUITY_EPSILON,
        }
    }
}

/// ログ出力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// ログ設定
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// ログレベル（trace / debug / info / warn / error）
    pub level: String,
    pub format: LogFormat,
    /// 指定時は日次ローテーションのファイルにも出力する
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            directory: None,
        }
    }
}

impl AppConfig {
    /// TOML ファイルから設定を読み込む
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// TOML 文字列から設定を読み込む
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let dto: AppConfigDto = toml::from_str(toml)?;
        Self::try_from(dto)
    }

    /// プロセスの環境変数で上書きする
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_env_lookup(|key| std::env::var(key).ok())
    }

    /// 任意の参照関数で環境変数の上書きを適用する
    ///
    /// 空文字列の値は未設定として扱います。
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(provider) = non_empty(ENV_PROVIDER) {
            self.backend.provider = provider.parse()?;
        }
        if let Some(model) = non_empty(ENV_MODEL) {
            self.backend.model = Some(model.trim().to_string());
        }
        Ok(self)
    }
}

impl TryFrom<AppConfigDto> for AppConfig {
    type Error = ConfigError;

    fn try_from(dto: AppConfigDto) -> Result<Self, Self::Error> {
        Ok(Self {
            backend: BackendOptions::try_from(dto.backend)?,
            parser: ParserOptions::try_from(dto.parser)?,
            logging: LoggingConfig::try_from(dto.logging)?,
        })
    }
}

impl TryFrom<BackendDto> for BackendOptions {
    type Error = ConfigError;

    fn try_from(dto: BackendDto) -> Result<Self, Self::Error> {
        let defaults = BackendOptions::default();

        let max_tokens = dto.max_tokens.unwrap_or(defaults.max_tokens);
        if max_tokens == 0 {
            return Err(ConfigError::Validation(
                "backend.max_tokens は 1 以上である必要があります".to_string(),
            ));
        }

        let temperature = dto.temperature.unwrap_or(defaults.temperature);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::Validation(format!(
                "backend.temperature は 0.0〜2.0 の範囲で指定してください: {temperature}"
            )));
        }

        let timeout_ms = dto.timeout_ms.unwrap_or(defaults.timeout_ms);
        if timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "backend.timeout_ms は 1 以上である必要があります".to_string(),
            ));
        }

        Ok(Self {
            provider: dto.provider.unwrap_or(defaults.provider),
            model_tier: dto.model_tier.unwrap_or(defaults.model_tier),
            model: dto.model.filter(|m| !m.trim().is_empty()),
            max_tokens,
            temperature,
            timeout_ms,
            base_url: dto.base_url.map(|u| u.trim_end_matches('/').to_string()),
        })
    }
}

impl TryFrom<ParserDto> for ParserOptions {
    type Error = ConfigError;

    fn try_from(dto: ParserDto) -> Result<Self, Self::Error> {
        let ambiguity_epsilon = dto.ambiguity_epsilon.unwrap_or(DEFAULT_AMBIGUITY_EPSILON);
        if !(0.0..=1.0).contains(&ambiguity_epsilon) {
            return Err(ConfigError::Validation(format!(
                "parser.ambiguity_epsilon は 0.0〜1.0 の範囲で指定してください: {ambiguity_epsilon}"
            )));
        }
        Ok(Self { ambiguity_epsilon })
    }
}

impl TryFrom<LoggingDto> for LoggingConfig {
    type Error = ConfigError;

    fn try_from(dto: LoggingDto) -> Result<Self, Self::Error> {
        let level = dto
            .level
            .map(|l| l.trim().to_lowercase())
            .unwrap_or_else(|| "info".to_string());
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level が不正です: {level}"
            )));
        }

        Ok(Self {
            level,
            format: dto.format.unwrap_or_default(),
            directory: dto.directory.map(PathBuf::from),
        })
    }
}

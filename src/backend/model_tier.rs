//! モデルティアマッピング
//!
//! # 責務
//!
//! - [`ModelTier`] と [`Provider`] の組み合わせから、実際のモデル名を解決
//! - プロバイダー別のモデル名定数を管理
//!
//! # マッピング表
//!
//! | Tier   | Anthropic         | OpenAI      |
//! |--------|-------------------|-------------|
//! | Heavy  | claude-opus-4-1   | gpt-4.1     |
//! | Medium | claude-sonnet-4-5 | gpt-4o      |
//! | Light  | claude-haiku-4-5  | gpt-4o-mini |
//!
//! 設定で `model` を明示した場合はこの表より優先されます
//! （[`BackendOptions::resolved_model`](crate::config::BackendOptions::resolved_model)）。
//!
//! # 使用例
//!
//! ```rust
//! use mentat::backend::model_tier::resolve_model;
//! use mentat::config::{Provider, ModelTier};
//!
//! let model = resolve_model(&Provider::Anthropic, &ModelTier::Medium);
//! assert_eq!(model, "claude-sonnet-4-5");
//! ```

use crate::config::intent::{ModelTier, Provider};

// Anthropic モデル名定数
const ANTHROPIC_HEAVY: &str = "claude-opus-4-1";
const ANTHROPIC_MEDIUM: &str = "claude-sonnet-4-5";
const ANTHROPIC_LIGHT: &str = "claude-haiku-4-5";

// OpenAI モデル名定数
const OPENAI_HEAVY: &str = "gpt-4.1";
const OPENAI_MEDIUM: &str = "gpt-4o";
const OPENAI_LIGHT: &str = "gpt-4o-mini";

/// モデルティアとプロバイダーから実際のモデル名を解決する
pub fn resolve_model(provider: &Provider, tier: &ModelTier) -> &'static str {
    match (provider, tier) {
        (Provider::Anthropic, ModelTier::Heavy) => ANTHROPIC_HEAVY,
        (Provider::Anthropic, ModelTier::Medium) => ANTHROPIC_MEDIUM,
        (Provider::Anthropic, ModelTier::Light) => ANTHROPIC_LIGHT,

        (Provider::OpenAI, ModelTier::Heavy) => OPENAI_HEAVY,
        (Provider::OpenAI, ModelTier::Medium) => OPENAI_MEDIUM,
        (Provider::OpenAI, ModelTier::Light) => OPENAI_LIGHT,
    }
}

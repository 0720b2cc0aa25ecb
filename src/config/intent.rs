//! インテントとパラメータスキーマの定義
//!
//! # 責務
//!
//! ワークフローを構成する [`IntentSpec`] と、その引数を表す [`ParameterSpec`] を提供する。
//! あわせて、バックエンド選択に使う [`Provider`] と [`ModelTier`] もここで定義する。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// インテント定義（ドメインモデル）
///
/// ワークフロー内の1つのアクションを表します。
/// `examples` は抽出プロンプトの文脈としてのみ使われ、解析ロジックには使われません。
#[derive(Debug, Clone, PartialEq)]
pub struct IntentSpec {
    pub(super) name: String,
    pub(super) description: Option<String>,
    pub(super) parameters: Vec<ParameterSpec>,
    pub(super) examples: Vec<String>,
}

impl IntentSpec {
    /// インテント名（ワークフロー内で一意）
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// 宣言順のパラメータ一覧
    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    /// 自然言語での呼び出し例
    pub fn examples(&self) -> &[String] {
        &self.examples
    }

    /// 名前でパラメータを検索
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// パラメータ定義
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub(super) name: String,
    pub(super) param_type: ParamType,
    pub(super) required: bool,
    pub(super) default: Option<ParamValue>,
}

impl ParameterSpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn param_type(&self) -> &ParamType {
        &self.param_type
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn default_value(&self) -> Option<&ParamValue> {
        self.default.as_ref()
    }
}

/// パラメータの意味的な型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    /// 文字列
    String,
    /// 整数（i64）
    Int,
    /// 真偽値
    Bool,
    /// 列挙値（許可された値のいずれか）
    Enum(Vec<String>),
}

impl ParamType {
    /// TOML 上の型名
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Int => "int",
            ParamType::Bool => "bool",
            ParamType::Enum(_) => "enum",
        }
    }

    /// TOML の型名（と列挙値）から型を組み立てる
    pub(super) fn parse(name: &str, values: Option<Vec<String>>) -> Result<Self, ConfigError> {
        match name {
            "string" => Ok(ParamType::String),
            "int" | "integer" => Ok(ParamType::Int),
            "bool" | "boolean" => Ok(ParamType::Bool),
            "enum" => match values {
                Some(values) if !values.is_empty() => Ok(ParamType::Enum(values)),
                _ => Err(ConfigError::Validation(
                    "enum 型のパラメータには values が必要です".to_string(),
                )),
            },
            other => Err(ConfigError::Validation(format!(
                "未知のパラメータ型です: {other}"
            ))),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Enum(values) => write!(f, "enum({})", values.join("|")),
            other => f.write_str(other.type_name()),
        }
    }
}

/// 検証・型変換済みのパラメータ値
///
/// 列挙型の値は、許可リスト上の正規表記の文字列として保持されます。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    Int(i64),
    Bool(bool),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// TOML 値への変換（記述子の書き出し用）
    pub(super) fn to_toml(&self) -> toml::Value {
        match self {
            ParamValue::Text(s) => toml::Value::String(s.clone()),
            ParamValue::Int(n) => toml::Value::Integer(*n),
            ParamValue::Bool(b) => toml::Value::Boolean(*b),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Text(s) => write!(f, "{s:?}"),
            ParamValue::Int(n) => write!(f, "{n}"),
            ParamValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// モデルのティア（Heavy/Medium/Light）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    /// 複雑な推論タスク用
    Heavy,
    /// 一般的なタスク用
    Medium,
    /// 簡単なタスク用（インテント抽出には通常これで十分）
    Light,
}

/// LLM プロバイダー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Anthropic (Messages API)
    Anthropic,
    /// OpenAI (Chat Completions API)
    OpenAI,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
            Provider::OpenAI => "openai",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" => Ok(Provider::Anthropic),
            "openai" => Ok(Provider::OpenAI),
            other => Err(ConfigError::Validation(format!(
                "未対応のプロバイダーです: {other}（anthropic / openai）"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_type_parse() {
        assert_eq!(ParamType::parse("string", None).unwrap(), ParamType::String);
        assert_eq!(ParamType::parse("integer", None).unwrap(), ParamType::Int);
        assert_eq!(
            ParamType::parse("enum", Some(vec!["a".into(), "b".into()])).unwrap(),
            ParamType::Enum(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn test_enum_without_values_is_rejected() {
        assert!(matches!(
            ParamType::parse("enum", None),
            Err(ConfigError::Validation(_))
        ));
        assert!(ParamType::parse("enum", Some(vec![])).is_err());
        assert!(ParamType::parse("float", None).is_err());
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("Anthropic".parse::<Provider>().unwrap(), Provider::Anthropic);
        assert_eq!(" openai ".parse::<Provider>().unwrap(), Provider::OpenAI);
        assert!("gemini".parse::<Provider>().is_err());
    }

    #[test]
    fn test_param_value_accessors() {
        assert_eq!(ParamValue::Text("x".into()).as_str(), Some("x"));
        assert_eq!(ParamValue::Int(3).as_int(), Some(3));
        assert_eq!(ParamValue::Bool(true).as_bool(), Some(true));
        assert_eq!(ParamValue::Int(3).as_str(), None);
    }
}

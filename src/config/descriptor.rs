//! ワークフロー記述子の読み込みと管理を行うモジュール
//!
//! # 責務
//!
//! このモジュールは、ワークフローが公開するインテントとパラメータスキーマを
//! TOML 形式で宣言し、それを Rust の型として扱うための機能を提供します。
//!
//! ## 主な機能
//!
//! - **TOML パース**: `workflows/` ディレクトリ内の TOML ファイルを読み込み、
//!   [`WorkflowDescriptor`] に変換
//! - **バリデーション**: インテント名・パラメータ名の一意性、デフォルト値の型などを検査
//! - **書き出し**: 記述子を TOML 文字列に戻す
//!
//! ## 使用例
//!
//! ```toml
//! [workflow]
//! name = "twitter"
//! description = "Post and manage tweets"
//!
//! [[intents]]
//! name = "postTweet"
//! description = "Post a new tweet"
//! examples = ["Post a tweet saying 'Hello, World!'"]
//!
//! [[intents.parameters]]
//! name = "text"
//! type = "string"
//! required = true
//! ```
//!
//! ## 関連モジュール
//!
//! - [`crate::config::intent`]: インテント・パラメータの定義
//! - [`crate::registry`]: 記述子を保持するレジストリ

use std::collections::HashSet;
use std::path::Path;

use crate::engine::coerce::coerce_value;
use crate::error::ConfigError;
use super::dto::{IntentDto, ParameterDto, WorkflowDescriptorDto, WorkflowMetadataDto};
use super::intent::{IntentSpec, ParamType, ParameterSpec};

/// ワークフロー記述子（ドメインモデル）
///
/// 登録後は不変です。名前はレジストリ内で一意である必要があります。
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowDescriptor {
    name: String,
    description: Option<String>,
    intents: Vec<IntentSpec>,
}

impl WorkflowDescriptor {
    /// TOML ファイルから記述子を読み込む
    ///
    /// # エラー
    ///
    /// * [`ConfigError::FileRead`] - ファイルの読み込みに失敗
    /// * [`ConfigError::TomlDeserialize`] - TOML として不正
    /// * [`ConfigError::Validation`] - 内容が不正
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// TOML 文字列から記述子を読み込む
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let dto: WorkflowDescriptorDto = toml::from_str(toml)?;
        Self::try_from(dto)
    }

    /// 記述子を TOML 文字列に変換
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        let dto = WorkflowDescriptorDto::from(self.clone());
        Ok(toml::to_string(&dto)?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// 宣言順のインテント一覧
    pub fn intents(&self) -> &[IntentSpec] {
        &self.intents
    }

    /// 名前でインテントを検索
    pub fn intent(&self, name: &str) -> Option<&IntentSpec> {
        self.intents.iter().find(|i| i.name == name)
    }

    /// インテントの宣言順インデックス（曖昧さ解消の並び順に使用）
    pub fn intent_index(&self, name: &str) -> Option<usize> {
        self.intents.iter().position(|i| i.name == name)
    }
}

/// DTO からドメインモデルへの変換（読み込み方向）
///
/// # 処理フロー
///
/// 1. ワークフロー名の検査
/// 2. 各インテントの変換（名前の重複を検出）
/// 3. `WorkflowDescriptor` の構築
impl TryFrom<WorkflowDescriptorDto> for WorkflowDescriptor {
    type Error = ConfigError;

    fn try_from(dto: WorkflowDescriptorDto) -> Result<Self, Self::Error> {
        let name = dto.workflow.name.trim().to_string();
        if name.is_empty() {
            return Err(ConfigError::Validation(
                "ワークフロー名が空です".to_string(),
            ));
        }
        if dto.intents.is_empty() {
            return Err(ConfigError::Validation(format!(
                "ワークフロー '{name}' にインテントがありません"
            )));
        }

        let mut seen = HashSet::new();
        let mut intents = Vec::with_capacity(dto.intents.len());
        for intent_dto in dto.intents {
            let intent = IntentSpec::try_from(intent_dto)?;
            if !seen.insert(intent.name.clone()) {
                return Err(ConfigError::Validation(format!(
                    "ワークフロー '{name}' のインテント '{}' が重複しています",
                    intent.name
                )));
            }
            intents.push(intent);
        }

        Ok(Self {
            name,
            description: dto.workflow.description,
            intents,
        })
    }
}

impl TryFrom<IntentDto> for IntentSpec {
    type Error = ConfigError;

    fn try_from(dto: IntentDto) -> Result<Self, Self::Error> {
        let name = dto.name.trim().to_string();
        if name.is_empty() {
            return Err(ConfigError::Validation("インテント名が空です".to_string()));
        }
        if dto.examples.is_empty() {
            return Err(ConfigError::Validation(format!(
                "インテント '{name}' には少なくとも1つの examples が必要です"
            )));
        }

        let mut seen = HashSet::new();
        let mut parameters = Vec::with_capacity(dto.parameters.len());
        for param_dto in dto.parameters {
            let param = ParameterSpec::try_from(param_dto)
                .map_err(|e| ConfigError::Validation(format!("インテント '{name}': {e}")))?;
            if !seen.insert(param.name.clone()) {
                return Err(ConfigError::Validation(format!(
                    "インテント '{name}' のパラメータ '{}' が重複しています",
                    param.name
                )));
            }
            parameters.push(param);
        }

        Ok(Self {
            name,
            description: dto.description,
            parameters,
            examples: dto.examples,
        })
    }
}

impl TryFrom<ParameterDto> for ParameterSpec {
    type Error = ConfigError;

    fn try_from(dto: ParameterDto) -> Result<Self, Self::Error> {
        let name = dto.name.trim().to_string();
        if name.is_empty() {
            return Err(ConfigError::Validation("パラメータ名が空です".to_string()));
        }
        let param_type = ParamType::parse(&dto.param_type, dto.values)?;

        let default = match dto.default {
            Some(_) if dto.required => {
                return Err(ConfigError::Validation(format!(
                    "必須パラメータ '{name}' にデフォルト値は指定できません"
                )));
            }
            Some(raw) => {
                let json = serde_json::to_value(&raw).map_err(|e| {
                    ConfigError::Validation(format!("パラメータ '{name}' のデフォルト値: {e}"))
                })?;
                let value = coerce_value(&param_type, &json).map_err(|failure| {
                    ConfigError::Validation(format!(
                        "パラメータ '{name}' のデフォルト値が型 {param_type} と一致しません: {failure}"
                    ))
                })?;
                Some(value)
            }
            None => None,
        };

        Ok(Self {
            name,
            param_type,
            required: dto.required,
            default,
        })
    }
}

/// ドメインモデルから DTO への変換（書き込み方向）
///
/// バリデーション済みのドメインモデルから DTO を生成するため、この変換は失敗しません。
impl From<WorkflowDescriptor> for WorkflowDescriptorDto {
    fn from(descriptor: WorkflowDescriptor) -> Self {
        Self {
            workflow: WorkflowMetadataDto {
                name: descriptor.name,
                description: descriptor.description,
            },
            intents: descriptor
                .intents
                .into_iter()
                .map(|intent| IntentDto {
                    name: intent.name,
                    description: intent.description,
                    examples: intent.examples,
                    parameters: intent
                        .parameters
                        .into_iter()
                        .map(|param| {
                            let values = match &param.param_type {
                                ParamType::Enum(values) => Some(values.clone()),
                                _ => None,
                            };
                            ParameterDto {
                                name: param.name,
                                param_type: param.param_type.type_name().to_string(),
                                required: param.required,
                                default: param.default.as_ref().map(|v| v.to_toml()),
                                values,
                            }
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

//! パラメータの型変換
//!
//! バックエンドが返した型なしの値を、インテントのスキーマに従って
//! [`ParamValue`] に変換します。
//!
//! | 型     | 受け付ける値                                                |
//! |--------|-------------------------------------------------------------|
//! | string | 文字列・数値・真偽値（文字列化）                            |
//! | int    | 整数、小数部が 0 の数値、整数として読める文字列             |
//! | bool   | 真偽値、`true/false/yes/no/on/off/1/0` の文字列、数値 0 / 1 |
//! | enum   | 許可リストと大文字小文字を無視して一致する文字列            |
//!
//! `null` は値なしとして扱います。

use std::fmt;

use serde_json::{Map, Value};
use tracing::debug;

use crate::config::intent::{IntentSpec, ParamType, ParamValue};
use super::result::{ParamMap, ParseError};

/// 単一値の変換失敗
#[derive(Debug, Clone, PartialEq)]
pub enum CoerceFailure {
    TypeMismatch { found: String },
    NotInEnum { value: String, allowed: Vec<String> },
}

impl fmt::Display for CoerceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoerceFailure::TypeMismatch { found } => write!(f, "受け取った値: {found}"),
            CoerceFailure::NotInEnum { value, allowed } => {
                write!(f, "'{value}' は {} のいずれでもありません", allowed.join(" / "))
            }
        }
    }
}

/// 整数値の浮動小数点数だけを変換する（範囲外・非有限値は `None`）
fn float_to_i64(f: f64) -> Option<i64> {
    // 2^63 は f64 で正確に表せるが i64 の範囲外
    const BOUND: f64 = 9_223_372_036_854_775_808.0;
    if !f.is_finite() || f.fract() != 0.0 || f < -BOUND || f >= BOUND {
        return None;
    }
    Some(f as i64)
}

/// 単一の値を型に合わせて変換する
pub fn coerce_value(param_type: &ParamType, value: &Value) -> Result<ParamValue, CoerceFailure> {
    let mismatch = || CoerceFailure::TypeMismatch {
        found: describe(value),
    };

    match param_type {
        ParamType::String => match value {
            Value::String(s) => Ok(ParamValue::Text(s.clone())),
            Value::Number(n) => Ok(ParamValue::Text(n.to_string())),
            Value::Bool(b) => Ok(ParamValue::Text(b.to_string())),
            _ => Err(mismatch()),
        },
        ParamType::Int => match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().and_then(float_to_i64))
                .map(ParamValue::Int)
                .ok_or_else(mismatch),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(ParamValue::Int)
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        ParamType::Bool => match value {
            Value::Bool(b) => Ok(ParamValue::Bool(*b)),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(ParamValue::Bool(true)),
                "false" | "no" | "off" | "0" => Ok(ParamValue::Bool(false)),
                _ => Err(mismatch()),
            },
            Value::Number(n) => match n.as_i64() {
                Some(1) => Ok(ParamValue::Bool(true)),
                Some(0) => Ok(ParamValue::Bool(false)),
                _ => Err(mismatch()),
            },
            _ => Err(mismatch()),
        },
        ParamType::Enum(allowed) => {
            let raw = match value {
                Value::String(s) => s.trim().to_string(),
                Value::Number(n) => n.to_string(),
                _ => return Err(mismatch()),
            };
            allowed
                .iter()
                .find(|choice| choice.eq_ignore_ascii_case(&raw))
                .map(|choice| ParamValue::Text(choice.clone()))
                .ok_or_else(|| CoerceFailure::NotInEnum {
                    value: raw,
                    allowed: allowed.clone(),
                })
        }
    }
}

/// 候補のパラメータをインテントのスキーマに合わせて変換する
///
/// エラーは最初の1件で止めずにすべて集めて返します。
/// スキーマにないパラメータは黙って捨てます。
pub fn coerce_parameters(
    intent: &IntentSpec,
    raw: &Map<String, Value>,
) -> Result<ParamMap, Vec<ParseError>> {
    let mut parameters = ParamMap::new();
    let mut errors = Vec::new();

    for spec in intent.parameters() {
        let name = spec.name();
        match raw.get(name).filter(|v| !v.is_null()) {
            Some(value) => match coerce_value(spec.param_type(), value) {
                Ok(coerced) => {
                    parameters.insert(name.to_string(), coerced);
                }
                Err(CoerceFailure::TypeMismatch { found }) => {
                    errors.push(ParseError::TypeMismatch {
                        param: name.to_string(),
                        expected: spec.param_type().to_string(),
                        found,
                    });
                }
                Err(CoerceFailure::NotInEnum { value, allowed }) => {
                    errors.push(ParseError::NotInEnum {
                        param: name.to_string(),
                        value,
                        allowed,
                    });
                }
            },
            None if spec.is_required() => {
                errors.push(ParseError::MissingRequired {
                    param: name.to_string(),
                });
            }
            None => {
                if let Some(default) = spec.default_value() {
                    parameters.insert(name.to_string(), default.clone());
                }
            }
        }
    }

    let extras: Vec<&str> = raw
        .keys()
        .filter(|key| intent.parameter(key).is_none())
        .map(String::as_str)
        .collect();
    if !extras.is_empty() {
        debug!(intent = intent.name(), dropped = ?extras, "dropping undeclared parameters");
    }

    if errors.is_empty() {
        Ok(parameters)
    } else {
        Err(errors)
    }
}

/// エラーメッセージ用の値の説明
fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("bool {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("string {s:?}"),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}

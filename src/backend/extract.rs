//! LLM 出力から候補を取り出す正規化処理
//!
//! LLM の出力は信頼できない外部関数の戻り値として扱います。
//! ここでは「構造」だけを検査し、ワークフロー・インテントの実在や
//! パラメータの型はパーサー側（[`crate::engine`]）で検証します。
//!
//! 受け付ける形式:
//!
//! ```json
//! {"match": false}
//! {"no_match": true}
//! {"candidates": [{"workflow": "...", "intent": "...", "parameters": {...}, "confidence": 0.9}]}
//! {"workflow": "...", "intent": "...", "parameters": {...}, "confidence": 0.9}
//! ```
//!
//! JSON はコードフェンスや前後の説明文に囲まれていても構いません。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BackendError;

/// エラーメッセージに含める生出力の最大文字数
const PREVIEW_CHARS: usize = 200;

/// 未検証の候補
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub workflow: String,
    pub intent: String,
    /// 型付け前のパラメータ
    pub parameters: Map<String, Value>,
    /// バックエンドが報告した確信度（0.0〜1.0）
    pub confidence: Option<f64>,
}

impl Candidate {
    /// 並び替えに使う確信度（未報告は 0.0）
    pub fn score(&self) -> f64 {
        self.confidence.unwrap_or(0.0)
    }
}

/// 正規化済みの抽出結果
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// バックエンドが明示的に「該当なし」と答えた
    NoMatch,
    /// 1件以上の候補（バックエンドの並び順のまま）
    Candidates(Vec<Candidate>),
}

#[derive(Debug, Deserialize)]
struct RawCandidate {
    workflow: Option<String>,
    intent: Option<String>,
    #[serde(default)]
    parameters: Value,
    confidence: Option<f64>,
}

/// LLM のテキスト出力を [`Extraction`] に変換する
///
/// # エラー
///
/// - [`BackendError::MalformedResponse`] - JSON が見つからない、または期待する構造でない
pub fn parse_extraction(text: &str) -> Result<Extraction, BackendError> {
    let json = locate_json_object(text)
        .ok_or_else(|| malformed("JSON オブジェクトが見つかりません", text))?;

    let value: Value = serde_json::from_str(json)
        .map_err(|e| malformed(&format!("JSON のパースに失敗しました: {e}"), text))?;

    let Value::Object(object) = value else {
        return Err(malformed("JSON オブジェクトではありません", text));
    };

    if object.get("no_match").and_then(Value::as_bool) == Some(true)
        || object.get("match").and_then(Value::as_bool) == Some(false)
    {
        return Ok(Extraction::NoMatch);
    }

    if let Some(list) = object.get("candidates") {
        let Value::Array(items) = list else {
            return Err(malformed("candidates が配列ではありません", text));
        };
        if items.is_empty() {
            return Ok(Extraction::NoMatch);
        }
        let candidates = items
            .iter()
            .map(|item| candidate_from_value(item.clone(), text))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Extraction::Candidates(candidates));
    }

    if object.contains_key("workflow") || object.contains_key("intent") {
        let candidate = candidate_from_value(Value::Object(object), text)?;
        return Ok(Extraction::Candidates(vec![candidate]));
    }

    Err(malformed("候補も no_match も含まれていません", text))
}

fn candidate_from_value(value: Value, text: &str) -> Result<Candidate, BackendError> {
    let raw: RawCandidate = serde_json::from_value(value)
        .map_err(|e| malformed(&format!("候補の形式が不正です: {e}"), text))?;

    let workflow = raw.workflow.map(|w| w.trim().to_string()).unwrap_or_default();
    let intent = raw.intent.map(|i| i.trim().to_string()).unwrap_or_default();
    if workflow.is_empty() || intent.is_empty() {
        return Err(malformed("候補に workflow または intent がありません", text));
    }

    let parameters = match raw.parameters {
        Value::Null => Map::new(),
        Value::Object(map) => map,
        _ => return Err(malformed("parameters がオブジェクトではありません", text)),
    };

    let confidence = raw
        .confidence
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0));

    Ok(Candidate {
        workflow,
        intent,
        parameters,
        confidence,
    })
}

/// テキスト中の最も外側の `{ ... }` を取り出す
fn locate_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn malformed(reason: &str, text: &str) -> BackendError {
    let preview: String = text.chars().take(PREVIEW_CHARS).collect();
    BackendError::MalformedResponse(format!("{reason}（出力: {preview}）"))
}

//! コマンドパーサー
//!
//! # 責務
//!
//! - 自然言語のコマンドを検証済みの [`Invocation`] に変換する
//! - バックエンド障害と意味的な不一致を区別して報告する
//! - 確信度が拮抗する候補を自動選択せず [`ParseResult::Ambiguous`] として返す
//!
//! # 状態遷移
//!
//! ```text
//! Start → PromptBuilt → BackendInvoked → Validating → {Resolved | Ambiguous | Unrecognized | ValidationFailed}
//! ```
//!
//! 1回の `parse` 呼び出しは自己完結しており、呼び出し間で状態を持ち越しません。
//! タイムアウトした呼び出しの後でも、次の呼び出しは通常どおり実行できます。
//!
//! # 使用例
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mentat::backend::create_backend;
//! use mentat::config::{BackendOptions, ParserOptions};
//! use mentat::engine::{CommandParser, ParseResult};
//! use mentat::registry::WorkflowRegistry;
//!
//! # async fn example(registry: WorkflowRegistry) -> Result<(), Box<dyn std::error::Error>> {
//! let options = BackendOptions::default();
//! let parser = CommandParser::new(
//!     create_backend(&options)?,
//!     Arc::new(registry),
//!     options,
//!     ParserOptions::default(),
//! );
//!
//! if let ParseResult::Resolved(invocation) = parser.parse("Post a tweet saying 'hi'").await {
//!     println!("{invocation}");
//! }
//! # Ok(())
//! # }
//! ```

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::{Backend, Candidate, Extraction, extract_with_timeout};
use crate::config::settings::{BackendOptions, ParserOptions};
use crate::registry::WorkflowRegistry;
use super::coerce::coerce_parameters;
use super::prompt::build_system_prompt;
use super::result::{Invocation, ParseError, ParseResult, ParseState};

/// コマンドパーサー
///
/// 保持するのは共有の読み取り専用データだけなので、
/// 複数のコマンドから同時に `parse` を呼び出しても干渉しません。
pub struct CommandParser {
    backend: Arc<dyn Backend>,
    registry: Arc<WorkflowRegistry>,
    backend_options: BackendOptions,
    parser_options: ParserOptions,
}

impl CommandParser {
    pub fn new(
        backend: Arc<dyn Backend>,
        registry: Arc<WorkflowRegistry>,
        backend_options: BackendOptions,
        parser_options: ParserOptions,
    ) -> Self {
        Self {
            backend,
            registry,
            backend_options,
            parser_options,
        }
    }

    pub fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    /// コマンドを解析する
    ///
    /// バックエンドの失敗は自動リトライせず、
    /// `ValidationFailed([BackendUnavailable])` として返します。
    pub async fn parse(&self, text: &str) -> ParseResult {
        debug!(state = ?ParseState::Start, "parsing command");

        let text = text.trim();
        if text.is_empty() {
            return self.finish(ParseResult::Unrecognized(String::new()));
        }

        let system_prompt = build_system_prompt(&self.registry);
        debug!(
            state = ?ParseState::PromptBuilt,
            workflows = self.registry.len(),
            prompt_chars = system_prompt.len(),
            "extraction prompt built"
        );

        let response = match extract_with_timeout(
            self.backend.as_ref(),
            &system_prompt,
            text,
            &self.backend_options,
        )
        .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(state = ?ParseState::BackendInvoked, error = %e, "backend call failed");
                return self.finish(ParseResult::ValidationFailed(vec![
                    ParseError::BackendUnavailable(e),
                ]));
            }
        };
        debug!(
            state = ?ParseState::BackendInvoked,
            model = %response.model,
            tokens = response.token_usage.total(),
            "backend responded"
        );

        debug!(state = ?ParseState::Validating, "validating extraction");
        let result = match response.extraction {
            Extraction::NoMatch => ParseResult::Unrecognized(text.to_string()),
            Extraction::Candidates(candidates) => self.select(text, candidates),
        };
        self.finish(result)
    }

    /// 曖昧な結果から呼び出し側が選んだ候補を検証する
    ///
    /// バックエンドは呼び出さず、`parse` と同じ検証を行います。
    pub fn resolve_candidate(&self, candidate: &Candidate) -> ParseResult {
        let label = format!("{}.{}", candidate.workflow, candidate.intent);
        let result = self.validate(&label, candidate);
        self.finish(result)
    }

    /// 候補を並べ、曖昧さの判定と検証を行う
    ///
    /// 未登録の候補も順位付けと拮抗判定に含めます。
    /// 最上位が未登録なら、下位の登録済み候補に繰り上げず `Unrecognized` を返します。
    fn select(&self, text: &str, candidates: Vec<Candidate>) -> ParseResult {
        let ranked = self.rank(candidates);

        let Some((top_key, top)) = ranked.first() else {
            return ParseResult::Unrecognized(text.to_string());
        };
        if top_key.is_none() {
            info!(
                workflow = %top.workflow,
                intent = %top.intent,
                "top candidate names an unknown workflow or intent"
            );
            return ParseResult::Unrecognized(text.to_string());
        }

        let epsilon = self.parser_options.ambiguity_epsilon;
        let top_score = top.score();
        let contenders: Vec<&(Option<(usize, usize)>, Candidate)> = ranked
            .iter()
            .take_while(|(_, c)| top_score - c.score() <= epsilon)
            .collect();

        if contenders.len() == 1 {
            return self.validate(text, top);
        }

        let known: Vec<Candidate> = contenders
            .iter()
            .filter(|(key, _)| key.is_some())
            .map(|(_, c)| c.clone())
            .collect();
        if known.len() < 2 {
            info!(epsilon, "only rival of the top candidate is unknown");
            return ParseResult::Unrecognized(text.to_string());
        }

        info!(candidates = known.len(), epsilon, "ambiguous command");
        ParseResult::Ambiguous(known)
    }

    /// 重複を除き、確信度と登録順で並べる
    ///
    /// 未登録の候補はキーが `None` になり、同じ確信度の登録済み候補の後ろに並びます。
    fn rank(&self, candidates: Vec<Candidate>) -> Vec<(Option<(usize, usize)>, Candidate)> {
        let mut ranked: Vec<(Option<(usize, usize)>, Candidate)> = Vec::new();

        for candidate in candidates {
            let key = self.registration_key(&candidate);
            if key.is_none() {
                debug!(
                    workflow = %candidate.workflow,
                    intent = %candidate.intent,
                    "candidate names an unknown workflow or intent"
                );
            }

            let duplicate = ranked.iter_mut().find(|(_, c)| {
                c.workflow == candidate.workflow && c.intent == candidate.intent
            });
            match duplicate {
                Some((_, existing)) => {
                    if candidate.score() > existing.score() {
                        *existing = candidate;
                    }
                }
                None => ranked.push((key, candidate)),
            }
        }

        ranked.sort_by(|(ka, a), (kb, b)| {
            b.score()
                .partial_cmp(&a.score())
                .unwrap_or(Ordering::Equal)
                .then_with(|| match (ka, kb) {
                    (Some(ka), Some(kb)) => ka.cmp(kb),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                })
        });
        ranked
    }

    /// (ワークフローの登録順, インテントの宣言順)
    fn registration_key(&self, candidate: &Candidate) -> Option<(usize, usize)> {
        let workflow = self.registry.registration_index(&candidate.workflow)?;
        let intent = self
            .registry
            .lookup(&candidate.workflow)
            .ok()?
            .intent_index(&candidate.intent)?;
        Some((workflow, intent))
    }

    /// 候補をスキーマで検証して呼び出しに変換する
    fn validate(&self, text: &str, candidate: &Candidate) -> ParseResult {
        let Ok(descriptor) = self.registry.lookup(&candidate.workflow) else {
            return ParseResult::Unrecognized(text.to_string());
        };
        let Some(intent) = descriptor.intent(&candidate.intent) else {
            return ParseResult::Unrecognized(text.to_string());
        };

        match coerce_parameters(intent, &candidate.parameters) {
            Ok(parameters) => ParseResult::Resolved(Invocation::new(
                descriptor.name().to_string(),
                intent.name().to_string(),
                parameters,
            )),
            Err(errors) => ParseResult::ValidationFailed(errors),
        }
    }

    fn finish(&self, result: ParseResult) -> ParseResult {
        info!(state = ?ParseState::terminal(&result), "parse finished");
        result
    }
}

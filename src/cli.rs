//! 対話型 CLI
//!
//! # 責務
//!
//! - ユーザー入力の読み取りと組み込みコマンド（`help` / `troubleshoot` / `exit`）の処理
//! - 解析・ディスパッチ結果の表示
//! - 曖昧な候補の選択と、トラブルシューティングの開始確認
//!
//! # モジュール構成
//!
//! - `console` - 行単位の入出力
//! - `troubleshoot` - LLM によるトラブルシューティング対話

pub mod console;
pub mod troubleshoot;

use std::io;
use std::sync::Arc;

use tracing::debug;

use crate::backend::Candidate;
use crate::engine::{
    CommandRouter, DispatchOutcome, ParseError, ParseResult, RouteOutcome, TroubleshootContext,
};
use crate::registry::WorkflowRegistry;

pub use console::Console;
pub use troubleshoot::LlmTroubleshooter;

const PROMPT: &str = "mentat> ";

/// 入力行の分類
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    Help,
    Troubleshoot,
    Exit,
    Empty,
    Route(&'a str),
}

impl<'a> Command<'a> {
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();
        match line.to_lowercase().as_str() {
            "" => Command::Empty,
            "help" => Command::Help,
            "troubleshoot" => Command::Troubleshoot,
            "exit" | "quit" => Command::Exit,
            _ => Command::Route(line),
        }
    }
}

/// 対話セッション
pub struct Session {
    router: Arc<CommandRouter>,
    console: Arc<Console>,
}

impl Session {
    pub fn new(router: Arc<CommandRouter>, console: Arc<Console>) -> Self {
        Self { router, console }
    }

    /// EOF か `exit` まで入力を処理する
    pub async fn run(&self) -> io::Result<()> {
        self.console.say(&format!(
            "Mentat: {} 個のワークフローが利用できます。'help' で使い方を表示します",
            self.router.registry().len()
        ))?;

        while let Some(line) = self.console.read_line(PROMPT)? {
            if !self.execute(&line).await? {
                break;
            }
        }
        Ok(())
    }

    /// 1行を処理する（終了すべきなら `false`）
    pub async fn execute(&self, line: &str) -> io::Result<bool> {
        match Command::parse(line) {
            Command::Empty => {}
            Command::Exit => return Ok(false),
            Command::Help => self.console.say(&help_text(self.router.registry()))?,
            Command::Troubleshoot => {
                let context = TroubleshootContext::manual(self.router.available_workflows());
                self.troubleshoot(&context).await?;
            }
            Command::Route(text) => {
                let outcome = self.router.handle(text).await;
                self.present(outcome).await?;
            }
        }
        Ok(true)
    }

    async fn present(&self, outcome: RouteOutcome) -> io::Result<()> {
        let mut outcome = outcome;
        loop {
            match outcome {
                RouteOutcome::Dispatched { invocation, outcome } => {
                    debug!(%invocation, success = outcome.is_success(), "presenting dispatch outcome");
                    match outcome {
                        DispatchOutcome::Success(payload) => self.console.say(&payload.summary)?,
                        DispatchOutcome::WorkflowError { kind, message } => {
                            self.console.say(&format!("エラー ({kind}): {message}"))?
                        }
                        DispatchOutcome::TroubleshootRequested { kind, message } => {
                            self.console.say(&format!("エラー ({kind}): {message}"))?;
                            if self.console.confirm("トラブルシューティングを開始しますか？")? {
                                let context = TroubleshootContext::for_invocation(
                                    &invocation,
                                    kind,
                                    message,
                                    self.router.available_workflows(),
                                );
                                self.troubleshoot(&context).await?;
                            } else {
                                self.console
                                    .say("必要になったら 'troubleshoot' と入力してください")?;
                            }
                        }
                    }
                }
                RouteOutcome::NotDispatched(ParseResult::Ambiguous(candidates)) => {
                    self.console.say(&render_candidates(&candidates))?;
                    let answer = self
                        .console
                        .read_line("番号を選んでください（空行で取り消し）: ")?;
                    match answer.and_then(|a| parse_choice(&a, candidates.len())) {
                        Some(index) => {
                            outcome = self.router.choose(&candidates[index]).await;
                            continue;
                        }
                        None => self.console.say("取り消しました")?,
                    }
                }
                RouteOutcome::NotDispatched(result) => {
                    self.console.say(&render_parse_result(&result))?
                }
            }
            return Ok(());
        }
    }

    async fn troubleshoot(&self, context: &TroubleshootContext) -> io::Result<()> {
        if !self.router.troubleshoot(context).await {
            self.console
                .say("トラブルシューティングは利用できません（バックエンドが未設定です）")?;
        }
        Ok(())
    }
}

/// `help` の表示内容
pub fn help_text(registry: &WorkflowRegistry) -> String {
    let mut text = String::from(
        "利用可能なコマンド:\n\
         - help: このヘルプを表示\n\
         - troubleshoot: トラブルシューティングを開始\n\
         - exit / quit: 終了\n",
    );

    if registry.is_empty() {
        text.push_str("\n利用可能なワークフローはありません\n");
        return text;
    }

    text.push_str("\n利用可能なワークフロー:\n");
    for descriptor in registry.all_descriptors() {
        text.push_str(&format!(
            "- {}: {}\n",
            descriptor.name(),
            descriptor.description().unwrap_or("")
        ));
        for intent in descriptor.intents() {
            text.push_str(&format!(
                "    - {}: {}\n",
                intent.name(),
                intent.description().unwrap_or("")
            ));
            for example in intent.examples() {
                text.push_str(&format!("        例: {example}\n"));
            }
        }
    }
    text
}

/// 曖昧な候補を番号付きで表示する
pub fn render_candidates(candidates: &[Candidate]) -> String {
    let mut text = String::from("どれを実行しますか？\n");
    for (i, candidate) in candidates.iter().enumerate() {
        let confidence = candidate
            .confidence
            .map(|c| format!("{c:.2}"))
            .unwrap_or_else(|| "-".to_string());
        text.push_str(&format!(
            "{}. {}.{} (確信度 {confidence}) {}\n",
            i + 1,
            candidate.workflow,
            candidate.intent,
            serde_json::Value::Object(candidate.parameters.clone())
        ));
    }
    text
}

/// 1 始まりの番号を候補のインデックスに変換する
pub fn parse_choice(input: &str, count: usize) -> Option<usize> {
    match input.trim().parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Some(n - 1),
        _ => None,
    }
}

/// ディスパッチされなかった解析結果の表示内容
pub fn render_parse_result(result: &ParseResult) -> String {
    match result {
        ParseResult::Resolved(invocation) => format!("解決済み: {invocation}"),
        ParseResult::Ambiguous(candidates) => render_candidates(candidates),
        ParseResult::Unrecognized(_) => {
            "コマンドを理解できませんでした。'help' で使えるコマンドの例を表示します".to_string()
        }
        ParseResult::ValidationFailed(errors) if result.is_backend_failure() => {
            let reasons: Vec<String> = errors
                .iter()
                .filter_map(|e| match e {
                    ParseError::BackendUnavailable(inner) => Some(inner.to_string()),
                    _ => None,
                })
                .collect();
            format!(
                "バックエンドを利用できません: {}\n時間をおいて再試行するか、'troubleshoot' と入力してください",
                reasons.join(", ")
            )
        }
        ParseResult::ValidationFailed(errors) => {
            let mut text = String::from("コマンドに不足または誤りがあります:\n");
            for error in errors {
                text.push_str(&format!("- {error}\n"));
            }
            text
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Backend, Completion, StopReason, TokenUsage};
    use crate::cli::console::testing::scripted;
    use crate::config::settings::BackendOptions;
    use crate::config::WorkflowDescriptor;
    use crate::engine::ParamMap;
    use crate::error::BackendError;
    use crate::workflow::{Payload, Workflow, WorkflowError, WorkflowErrorKind};
    use async_trait::async_trait;
    use serde_json::json;

    struct FixedBackend(String);

    #[async_trait]
    impl Backend for FixedBackend {
        async fn complete(
            &self,
            _system_prompt: &str,
            _user_input: &str,
            _options: &BackendOptions,
        ) -> Result<Completion, BackendError> {
            Ok(Completion {
                content: self.0.clone(),
                token_usage: TokenUsage::default(),
                stop_reason: StopReason::EndTurn,
                model: "fixed".to_string(),
            })
        }
    }

    struct EchoWorkflow(WorkflowDescriptor);

    #[async_trait]
    impl Workflow for EchoWorkflow {
        fn descriptor(&self) -> &WorkflowDescriptor {
            &self.0
        }

        async fn invoke(&self, intent: &str, parameters: &ParamMap) -> Result<Payload, WorkflowError> {
            match intent {
                "locked" => Err(WorkflowError::new(WorkflowErrorKind::MissingCredentials, "no token")),
                _ => Ok(Payload::new(
                    format!("{intent} ok: {}", parameters.len()),
                    serde_json::Value::Null,
                )),
            }
        }
    }

    fn router(reply: serde_json::Value) -> Arc<CommandRouter> {
        let descriptor = WorkflowDescriptor::from_toml(
            r#"
[workflow]
name = "echo"
description = "Echo things"

[[intents]]
name = "say"
description = "Say something"
examples = ["say hello"]

[[intents.parameters]]
name = "text"
type = "string"
required = true

[[intents]]
name = "shout"
examples = ["shout hello"]

[[intents]]
name = "locked"
examples = ["open the vault"]
"#,
        )
        .unwrap();

        Arc::new(
            CommandRouter::builder(Arc::new(FixedBackend(reply.to_string())))
                .workflow(Arc::new(EchoWorkflow(descriptor)))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("  HELP "), Command::Help);
        assert_eq!(Command::parse("troubleshoot"), Command::Troubleshoot);
        assert_eq!(Command::parse("quit"), Command::Exit);
        assert_eq!(Command::parse("   "), Command::Empty);
        assert_eq!(Command::parse(" post hi "), Command::Route("post hi"));
    }

    #[test]
    fn test_parse_choice() {
        assert_eq!(parse_choice("1", 2), Some(0));
        assert_eq!(parse_choice(" 2 ", 2), Some(1));
        assert_eq!(parse_choice("0", 2), None);
        assert_eq!(parse_choice("3", 2), None);
        assert_eq!(parse_choice("", 2), None);
    }

    #[test]
    fn test_help_text_lists_examples() {
        let router = router(json!({"match": false}));
        let text = help_text(router.registry());
        assert!(text.contains("- echo: Echo things"));
        assert!(text.contains("    - say: Say something"));
        assert!(text.contains("例: open the vault"));
        assert!(help_text(&WorkflowRegistry::new()).contains("利用可能なワークフローはありません"));
    }

    #[test]
    fn test_render_validation_errors_all_at_once() {
        let text = render_parse_result(&ParseResult::ValidationFailed(vec![
            ParseError::MissingRequired {
                param: "text".to_string(),
            },
            ParseError::TypeMismatch {
                param: "limit".to_string(),
                expected: "int".to_string(),
                found: "string \"many\"".to_string(),
            },
        ]));
        assert!(text.contains("'text'"));
        assert!(text.contains("'limit'"));

        let text = render_parse_result(&ParseResult::ValidationFailed(vec![
            ParseError::BackendUnavailable(BackendError::RateLimited),
        ]));
        assert!(text.contains("再試行"));
    }

    #[tokio::test]
    async fn test_session_dispatches_and_exits() {
        let router = router(json!({"workflow": "echo", "intent": "say", "parameters": {"text": "hi"}}));
        let (console, output) = scripted("say hi\n\nexit\nsay again\n");

        Session::new(router, console).run().await.unwrap();

        let text = output.text();
        assert!(text.contains("say ok: 1"));
        assert_eq!(text.matches("say ok").count(), 1);
    }

    #[tokio::test]
    async fn test_session_ambiguous_choice() {
        let router = router(json!({"candidates": [
            {"workflow": "echo", "intent": "say", "parameters": {"text": "hi"}, "confidence": 0.6},
            {"workflow": "echo", "intent": "shout", "parameters": {}, "confidence": 0.6}
        ]}));
        let (console, output) = scripted("2\n");

        let session = Session::new(router, console);
        assert!(session.execute("hi").await.unwrap());

        let text = output.text();
        assert!(text.contains("1. echo.say (確信度 0.60)"));
        assert!(text.contains("2. echo.shout"));
        assert!(text.contains("shout ok: 0"));
    }

    #[tokio::test]
    async fn test_session_troubleshoot_declined_without_hook() {
        let router = router(json!({"workflow": "echo", "intent": "locked", "parameters": {}}));
        let (console, output) = scripted("n\n");

        let session = Session::new(router, console);
        session.execute("open the vault").await.unwrap();
        session.execute("troubleshoot").await.unwrap();

        let text = output.text();
        assert!(text.contains("エラー (missing_credentials): no token"));
        assert!(text.contains("'troubleshoot' と入力してください"));
        assert!(text.contains("トラブルシューティングは利用できません"));
    }
}

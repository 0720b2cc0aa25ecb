//! LLM によるトラブルシューティング対話
//!
//! [`TroubleshootHook`] の実装です。失敗の情報をシステムプロンプトに含め、
//! ユーザーが `exit` / `done` と入力するか、上限の往復数に達するまで
//! バックエンドと会話します。LLM の資格情報が未設定の場合や認証に失敗した場合は、
//! 設定方法を一度だけ案内して対話を終えます。

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::backend::{Backend, complete_with_timeout};
use crate::config::settings::BackendOptions;
use crate::error::BackendError;
use crate::engine::{TroubleshootContext, TroubleshootHook};
use super::console::Console;

/// 1回の対話の最大往復数
const DEFAULT_MAX_TURNS: usize = 10;

const SYSTEM_PROMPT: &str = "You are a troubleshooting assistant for a command-line tool that routes natural-language commands to automation workflows.
Help the user fix the problem described below. Give short, concrete steps.
Credentials are read from environment variables; never ask the user to paste secrets into the chat.";

/// LLM トラブルシューター
pub struct LlmTroubleshooter {
    backend: Arc<dyn Backend>,
    options: BackendOptions,
    console: Arc<Console>,
    max_turns: usize,
}

impl LlmTroubleshooter {
    pub fn new(backend: Arc<dyn Backend>, options: BackendOptions, console: Arc<Console>) -> Self {
        Self {
            backend,
            options,
            console,
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    async fn converse(&self, context: &TroubleshootContext) -> io::Result<()> {
        if let Some(reason) = self.backend.missing_credentials() {
            warn!(reason = %reason, "troubleshooting skipped: backend is not configured");
            return self.console.say(&configuration_hint(&reason));
        }

        let system_prompt = format!("{SYSTEM_PROMPT}\n\n{}", context.describe());
        let mut transcript: Vec<String> = Vec::new();

        self.console
            .say("トラブルシューティングを始めます。どんな問題が起きていますか？（終了: exit / done）")?;

        for turn in 0..self.max_turns {
            let Some(line) = self.console.read_line("troubleshoot> ")? else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if matches!(line.to_lowercase().as_str(), "exit" | "quit" | "done") {
                break;
            }

            transcript.push(format!("User: {line}"));
            debug!(turn, "troubleshooting turn");

            match complete_with_timeout(
                self.backend.as_ref(),
                &system_prompt,
                &transcript.join("\n"),
                &self.options,
            )
            .await
            {
                Ok(completion) => {
                    let reply = completion.content.trim().to_string();
                    self.console.say(&reply)?;
                    transcript.push(format!("Assistant: {reply}"));
                }
                Err(BackendError::Unauthorized(reason)) => {
                    warn!(reason = %reason, "troubleshooting stopped: backend rejected credentials");
                    return self.console.say(&configuration_hint(&reason));
                }
                Err(e) => {
                    warn!(error = %e, "troubleshooting completion failed");
                    self.console.say(&format!(
                        "応答を取得できませんでした（{e}）。言い方を変えるか exit で終了してください"
                    ))?;
                }
            }
        }

        self.console.say("トラブルシューティングを終了します")
    }
}

fn configuration_hint(reason: &str) -> String {
    format!(
        "LLM バックエンドの資格情報を確認できないため、トラブルシューティングを続けられません（{reason}）。\n\
         ANTHROPIC_API_KEY または OPENAI_API_KEY を設定し、必要なら LLM_PROVIDER でプロバイダーを選んでください"
    )
}

#[async_trait]
impl TroubleshootHook for LlmTroubleshooter {
    async fn on_troubleshoot(&self, context: &TroubleshootContext) {
        if let Err(e) = self.converse(context).await {
            warn!(error = %e, "troubleshooting dialog aborted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Completion, StopReason, TokenUsage};
    use crate::cli::console::testing::scripted;
    use crate::error::BackendError;
    use crate::workflow::WorkflowErrorKind;
    use std::sync::Mutex;

    /// 受け取った入力を記録し、往復数を返すバックエンド
    #[derive(Default)]
    struct CountingBackend {
        prompts: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Backend for CountingBackend {
        async fn complete(
            &self,
            system_prompt: &str,
            user_input: &str,
            _options: &BackendOptions,
        ) -> Result<Completion, BackendError> {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push((system_prompt.to_string(), user_input.to_string()));
            Ok(Completion {
                content: format!("step {}", prompts.len()),
                token_usage: TokenUsage::default(),
                stop_reason: StopReason::EndTurn,
                model: "counting".to_string(),
            })
        }
    }

    fn context() -> TroubleshootContext {
        TroubleshootContext {
            kind: WorkflowErrorKind::MissingCredentials,
            message: "TWITTER_ACCESS_TOKEN が設定されていません".to_string(),
            workflow: Some("twitter".to_string()),
            intent: Some("postTweet".to_string()),
            available_workflows: vec!["twitter".to_string()],
        }
    }

    #[tokio::test]
    async fn test_dialog_until_done() {
        let backend = Arc::new(CountingBackend::default());
        let (console, output) = scripted("my token is missing\n\nwhere do I set it?\ndone\nignored\n");
        let troubleshooter =
            LlmTroubleshooter::new(backend.clone(), BackendOptions::default(), console);

        troubleshooter.on_troubleshoot(&context()).await;

        let prompts = backend.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].0.contains("missing_credentials"));
        assert!(prompts[0].0.contains("twitter.postTweet"));
        assert_eq!(prompts[0].1, "User: my token is missing");
        assert_eq!(
            prompts[1].1,
            "User: my token is missing\nAssistant: step 1\nUser: where do I set it?"
        );

        let text = output.text();
        assert!(text.contains("step 2"));
        assert!(text.ends_with("トラブルシューティングを終了します\n"));
    }

    /// 資格情報のないバックエンド
    #[derive(Default)]
    struct UnconfiguredBackend {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl Backend for UnconfiguredBackend {
        fn missing_credentials(&self) -> Option<String> {
            Some("ANTHROPIC_API_KEY が設定されていません".to_string())
        }

        async fn complete(
            &self,
            _system_prompt: &str,
            _user_input: &str,
            _options: &BackendOptions,
        ) -> Result<Completion, BackendError> {
            *self.calls.lock().unwrap() += 1;
            Err(BackendError::Unauthorized("unreachable".to_string()))
        }
    }

    /// 資格情報はあるが拒否されるバックエンド
    #[derive(Default)]
    struct RejectingBackend {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl Backend for RejectingBackend {
        async fn complete(
            &self,
            _system_prompt: &str,
            _user_input: &str,
            _options: &BackendOptions,
        ) -> Result<Completion, BackendError> {
            *self.calls.lock().unwrap() += 1;
            Err(BackendError::Unauthorized("HTTP 401: invalid x-api-key".to_string()))
        }
    }

    #[tokio::test]
    async fn test_unconfigured_backend_prints_hint_once() {
        let backend = Arc::new(UnconfiguredBackend::default());
        let (console, output) = scripted("help me
still broken
");
        let troubleshooter =
            LlmTroubleshooter::new(backend.clone(), BackendOptions::default(), console);

        troubleshooter.on_troubleshoot(&context()).await;

        assert_eq!(*backend.calls.lock().unwrap(), 0);
        let text = output.text();
        assert_eq!(text.matches("ANTHROPIC_API_KEY が設定されていません").count(), 1);
        assert!(!text.contains("troubleshoot> "));
    }

    #[tokio::test]
    async fn test_rejected_credentials_end_dialog() {
        let backend = Arc::new(RejectingBackend::default());
        let (console, output) = scripted("a
b
c
");
        let troubleshooter =
            LlmTroubleshooter::new(backend.clone(), BackendOptions::default(), console);

        troubleshooter.on_troubleshoot(&context()).await;

        assert_eq!(*backend.calls.lock().unwrap(), 1);
        assert_eq!(output.text().matches("invalid x-api-key").count(), 1);
    }

    #[tokio::test]
    async fn test_dialog_stops_at_max_turns() {
        let backend = Arc::new(CountingBackend::default());
        let (console, _) = scripted("a\nb\nc\nd\n");
        let troubleshooter =
            LlmTroubleshooter::new(backend.clone(), BackendOptions::default(), console)
                .with_max_turns(2);

        troubleshooter.on_troubleshoot(&context()).await;
        assert_eq!(backend.prompts.lock().unwrap().len(), 2);
    }
}

//! コマンドルーター
//!
//! パーサーとディスパッチャーを束ねる窓口です。起動時にワークフローを登録し、
//! 以後は `handle` で「解析 → ディスパッチ」を1コマンドずつ実行します。
//! `Resolved` 以外の解析結果がディスパッチャーに渡ることはありません。
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mentat::backend::create_backend;
//! use mentat::config::BackendOptions;
//! use mentat::engine::{CommandRouter, RouteOutcome};
//! use mentat::workflow::TwitterWorkflow;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = BackendOptions::default();
//! let backend = create_backend(&options)?;
//! let router = CommandRouter::builder(backend.clone())
//!     .backend_options(options.clone())
//!     .workflow(Arc::new(TwitterWorkflow::from_env(backend, options)?))
//!     .build()?;
//!
//! match router.handle("Show my latest mentions").await {
//!     RouteOutcome::Dispatched { outcome, .. } => println!("{outcome:?}"),
//!     RouteOutcome::NotDispatched(result) => println!("{result:?}"),
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tracing::debug;

use crate::backend::{Backend, Candidate};
use crate::config::settings::{BackendOptions, ParserOptions};
use crate::error::RegistryError;
use crate::registry::WorkflowRegistry;
use crate::workflow::Workflow;
use super::context::{TroubleshootContext, TroubleshootHook};
use super::dispatcher::Dispatcher;
use super::parser::CommandParser;
use super::result::{DispatchOutcome, Invocation, ParseResult};

/// 1コマンドの処理結果
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// 解決された呼び出しをディスパッチした
    Dispatched {
        invocation: Invocation,
        outcome: DispatchOutcome,
    },
    /// 解決できなかった（`Ambiguous` / `Unrecognized` / `ValidationFailed`）
    NotDispatched(ParseResult),
}

/// コマンドルーター
pub struct CommandRouter {
    parser: CommandParser,
    dispatcher: Dispatcher,
    troubleshooter: Option<Arc<dyn TroubleshootHook>>,
}

impl CommandRouter {
    pub fn builder(backend: Arc<dyn Backend>) -> CommandRouterBuilder {
        CommandRouterBuilder {
            backend,
            backend_options: BackendOptions::default(),
            parser_options: ParserOptions::default(),
            workflows: Vec::new(),
            troubleshooter: None,
        }
    }

    /// 1コマンドを解析し、解決できればディスパッチする
    pub async fn handle(&self, text: &str) -> RouteOutcome {
        let result = self.parser.parse(text).await;
        self.dispatch_resolved(result).await
    }

    /// 曖昧な結果から選ばれた候補を検証し、解決できればディスパッチする
    pub async fn choose(&self, candidate: &Candidate) -> RouteOutcome {
        let result = self.parser.resolve_candidate(candidate);
        self.dispatch_resolved(result).await
    }

    async fn dispatch_resolved(&self, result: ParseResult) -> RouteOutcome {
        match result {
            ParseResult::Resolved(invocation) => {
                let outcome = self.dispatcher.dispatch(&invocation).await;
                RouteOutcome::Dispatched { invocation, outcome }
            }
            other => RouteOutcome::NotDispatched(other),
        }
    }

    /// トラブルシューティングフックを呼び出す
    ///
    /// フックが設定されていなければ `false` を返します。
    pub async fn troubleshoot(&self, context: &TroubleshootContext) -> bool {
        match &self.troubleshooter {
            Some(hook) => {
                hook.on_troubleshoot(context).await;
                true
            }
            None => {
                debug!("no troubleshoot hook configured");
                false
            }
        }
    }

    pub fn registry(&self) -> &WorkflowRegistry {
        self.parser.registry()
    }

    /// 登録済みワークフロー名（登録順）
    pub fn available_workflows(&self) -> Vec<String> {
        self.registry()
            .all_descriptors()
            .map(|d| d.name().to_string())
            .collect()
    }
}

/// [`CommandRouter`] のビルダー
pub struct CommandRouterBuilder {
    backend: Arc<dyn Backend>,
    backend_options: BackendOptions,
    parser_options: ParserOptions,
    workflows: Vec<Arc<dyn Workflow>>,
    troubleshooter: Option<Arc<dyn TroubleshootHook>>,
}

impl CommandRouterBuilder {
    pub fn backend_options(mut self, options: BackendOptions) -> Self {
        self.backend_options = options;
        self
    }

    pub fn parser_options(mut self, options: ParserOptions) -> Self {
        self.parser_options = options;
        self
    }

    pub fn workflow(mut self, workflow: Arc<dyn Workflow>) -> Self {
        self.workflows.push(workflow);
        self
    }

    pub fn troubleshooter(mut self, hook: Arc<dyn TroubleshootHook>) -> Self {
        self.troubleshooter = Some(hook);
        self
    }

    /// 記述子をレジストリに、実装をディスパッチャーに登録する
    ///
    /// # エラー
    ///
    /// - [`RegistryError::DuplicateWorkflow`] - 同名のワークフローが複数ある
    pub fn build(self) -> Result<CommandRouter, RegistryError> {
        let mut registry = WorkflowRegistry::new();
        let mut dispatcher = Dispatcher::new();

        for workflow in self.workflows {
            registry.register(workflow.descriptor().clone())?;
            dispatcher.install(workflow);
        }

        let parser = CommandParser::new(
            self.backend,
            Arc::new(registry),
            self.backend_options,
            self.parser_options,
        );

        Ok(CommandRouter {
            parser,
            dispatcher,
            troubleshooter: self.troubleshooter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Completion, StopReason, TokenUsage};
    use crate::config::WorkflowDescriptor;
    use crate::engine::ParamMap;
    use crate::error::BackendError;
    use crate::workflow::{Payload, WorkflowError, WorkflowErrorKind};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct EchoBackend(String);

    #[async_trait]
    impl Backend for EchoBackend {
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
                model: "echo".to_string(),
            })
        }
    }

    struct NotesWorkflow {
        descriptor: WorkflowDescriptor,
        invoked: Mutex<u32>,
    }

    impl NotesWorkflow {
        fn new(name: &str) -> Self {
            Self {
                descriptor: WorkflowDescriptor::from_toml(&format!(
                    "[workflow]\nname = \"{name}\"\n\n[[intents]]\nname = \"add\"\nexamples = [\"note x\"]\n\n[[intents.parameters]]\nname = \"text\"\ntype = \"string\"\nrequired = true\n"
                ))
                .unwrap(),
                invoked: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl Workflow for NotesWorkflow {
        fn descriptor(&self) -> &WorkflowDescriptor {
            &self.descriptor
        }

        async fn invoke(&self, _intent: &str, parameters: &ParamMap) -> Result<Payload, WorkflowError> {
            *self.invoked.lock().unwrap() += 1;
            match parameters.get("text").and_then(|v| v.as_str()) {
                Some("secret") => Err(WorkflowError::new(
                    WorkflowErrorKind::PermissionDenied,
                    "read-only",
                )),
                Some(text) => Ok(Payload::new(format!("noted {text}"), serde_json::Value::Null)),
                None => Err(WorkflowError::new(WorkflowErrorKind::Unknown, "no text")),
            }
        }
    }

    struct CountingHook(Mutex<Vec<TroubleshootContext>>);

    #[async_trait]
    impl TroubleshootHook for CountingHook {
        async fn on_troubleshoot(&self, context: &TroubleshootContext) {
            self.0.lock().unwrap().push(context.clone());
        }
    }

    fn router(reply: &str, workflow: Arc<NotesWorkflow>) -> CommandRouter {
        CommandRouter::builder(Arc::new(EchoBackend(reply.to_string())))
            .workflow(workflow)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_handle_dispatches_resolved() {
        let workflow = Arc::new(NotesWorkflow::new("notes"));
        let router = router(
            r#"{"workflow": "notes", "intent": "add", "parameters": {"text": "milk"}}"#,
            workflow.clone(),
        );

        let outcome = router.handle("note milk").await;
        let RouteOutcome::Dispatched { invocation, outcome } = outcome else {
            panic!("expected dispatch");
        };
        assert_eq!(invocation.text("text"), Some("milk"));
        assert_eq!(
            outcome,
            DispatchOutcome::Success(Payload::new("noted milk", serde_json::Value::Null))
        );
        assert_eq!(*workflow.invoked.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unresolved_is_never_dispatched() {
        let workflow = Arc::new(NotesWorkflow::new("notes"));
        let router = router(
            r#"{"workflow": "notes", "intent": "add", "parameters": {}}"#,
            workflow.clone(),
        );

        assert!(matches!(
            router.handle("note").await,
            RouteOutcome::NotDispatched(ParseResult::ValidationFailed(_))
        ));
        assert_eq!(*workflow.invoked.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_choose_dispatches_candidate() {
        let workflow = Arc::new(NotesWorkflow::new("notes"));
        let router = router(r#"{"match": false}"#, workflow);
        let candidate = Candidate {
            workflow: "notes".to_string(),
            intent: "add".to_string(),
            parameters: serde_json::json!({"text": "secret"}).as_object().cloned().unwrap(),
            confidence: None,
        };

        assert!(matches!(
            router.choose(&candidate).await,
            RouteOutcome::Dispatched {
                outcome: DispatchOutcome::TroubleshootRequested {
                    kind: WorkflowErrorKind::PermissionDenied,
                    ..
                },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_troubleshoot_hook() {
        let workflow = Arc::new(NotesWorkflow::new("notes"));
        let without_hook = router(r#"{"match": false}"#, workflow.clone());
        let context = TroubleshootContext::manual(without_hook.available_workflows());
        assert!(!without_hook.troubleshoot(&context).await);

        let hook = Arc::new(CountingHook(Mutex::new(Vec::new())));
        let with_hook = CommandRouter::builder(Arc::new(EchoBackend(String::new())))
            .workflow(workflow)
            .troubleshooter(hook.clone())
            .build()
            .unwrap();
        assert!(with_hook.troubleshoot(&context).await);
        assert_eq!(hook.0.lock().unwrap().as_slice(), &[context]);
    }

    #[test]
    fn test_duplicate_workflow_fails_build() {
        let result = CommandRouter::builder(Arc::new(EchoBackend(String::new())))
            .workflow(Arc::new(NotesWorkflow::new("notes")))
            .workflow(Arc::new(NotesWorkflow::new("notes")))
            .build();
        assert!(matches!(result, Err(RegistryError::DuplicateWorkflow(name)) if name == "notes"));
        let router = CommandRouter::builder(Arc::new(EchoBackend(String::new())))
            .workflow(Arc::new(NotesWorkflow::new("a")))
            .workflow(Arc::new(NotesWorkflow::new("b")))
            .build()
            .unwrap();
        assert_eq!(router.available_workflows(), vec!["a", "b"]);
    }
}

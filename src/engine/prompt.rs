//! 抽出プロンプトの組み立て
//!
//! レジストリの全記述子から、バックエンドに渡すシステムプロンプトを生成します。
//! 出力形式は [`crate::backend::extract`] が受け付ける JSON に合わせています。

use std::fmt::Write as _;

use crate::config::descriptor::WorkflowDescriptor;
use crate::config::intent::IntentSpec;
use crate::registry::WorkflowRegistry;

const INSTRUCTIONS: &str = r#"You route natural-language commands to registered workflows.
Pick the workflow and intent that best match the user's command and extract its parameters.

Reply with JSON only, no prose:
{"candidates": [{"workflow": "<name>", "intent": "<name>", "parameters": {"<param>": <value>}, "confidence": <0.0-1.0>}]}

Rules:
- Use only the workflow, intent and parameter names listed below.
- Omit parameters the user did not state. Never invent values.
- If several intents are plausible, list each as a candidate with its own confidence.
- If nothing matches, reply {"match": false}."#;

/// レジストリの内容からシステムプロンプトを生成する
pub fn build_system_prompt(registry: &WorkflowRegistry) -> String {
    let mut prompt = String::from(INSTRUCTIONS);
    prompt.push_str("\n\nAvailable workflows:\n");
    for descriptor in registry.all_descriptors() {
        describe_workflow(&mut prompt, descriptor);
    }
    prompt
}

fn describe_workflow(out: &mut String, descriptor: &WorkflowDescriptor) {
    let _ = write!(out, "\n## {}", descriptor.name());
    if let Some(description) = descriptor.description() {
        let _ = write!(out, ": {description}");
    }
    out.push('\n');
    for intent in descriptor.intents() {
        describe_intent(out, intent);
    }
}

fn describe_intent(out: &mut String, intent: &IntentSpec) {
    let _ = write!(out, "- intent `{}`", intent.name());
    if let Some(description) = intent.description() {
        let _ = write!(out, ": {description}");
    }
    out.push('\n');

    for param in intent.parameters() {
        let _ = write!(
            out,
            "    - {} ({}, {})",
            param.name(),
            param.param_type(),
            if param.is_required() { "required" } else { "optional" }
        );
        if let Some(default) = param.default_value() {
            let _ = write!(out, " default {default}");
        }
        out.push('\n');
    }

    for example in intent.examples() {
        let _ = writeln!(out, "    e.g. \"{example}\"");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_lists_every_intent_and_parameter() {
        let mut registry = WorkflowRegistry::new();
        registry
            .register(
                WorkflowDescriptor::from_toml(
                    r#"
[workflow]
name = "calendar"
description = "Manage events"

[[intents]]
name = "createEvent"
examples = ["Add lunch with Sam tomorrow"]

[[intents.parameters]]
name = "title"
type = "string"
required = true

[[intents.parameters]]
name = "minutes"
type = "int"
default = 30
"#,
                )
                .unwrap(),
            )
            .unwrap();

        let prompt = build_system_prompt(&registry);
        assert!(prompt.contains("## calendar: Manage events"));
        assert!(prompt.contains("intent `createEvent`"));
        assert!(prompt.contains("title (string, required)"));
        assert!(prompt.contains("minutes (int, optional) default 30"));
        assert!(prompt.contains("e.g. \"Add lunch with Sam tomorrow\""));
        assert!(prompt.contains(r#"{"match": false}"#));
    }

    #[test]
    fn test_prompt_for_empty_registry() {
        let prompt = build_system_prompt(&WorkflowRegistry::new());
        assert!(prompt.ends_with("Available workflows:\n"));
    }
}

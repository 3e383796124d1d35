// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Reflection regeneration
//!
//! After a conversation ends the model is shown the article, the current
//! reflections and the transcript, and is forced to call a single tool with
//! the complete new lists. The result replaces the old reflections wholesale;
//! nothing is merged and nothing is persisted here.

use serde::Deserialize;
use serde_json::json;

use crate::article::Article;
use crate::assistant::{format_reflections, AssistantConfig, Reflections};
use crate::error::{ApiError, QuillError, Result};
use crate::llm::message::Message;
use crate::llm::provider::{CompletionRequest, LlmProvider, ToolChoice, ToolDefinition, ToolInputSchema};

/// Name of the tool the model must call
pub const REFLECTION_TOOL: &str = "generate_reflections";

const REFLECTION_SYSTEM_PROMPT: &str = r#"You are helping an AI writing assistant learn about the user it works with.
You maintain two lists:
- style guidelines: rules about how the user wants their writing to look and sound
- general facts: durable facts about the user that help when assisting them

Read the conversation and the article below. Update the lists so they reflect everything learned so far.
Keep entries that are still true, drop entries the user contradicted, and add new ones. Keep each entry short.
Always answer by calling the generate_reflections tool with the complete new lists, not just the changes.
"#;

/// Arguments of the reflection tool call
#[derive(Debug, Deserialize)]
struct GeneratedReflections {
    style_guidelines: Vec<String>,
    general_facts: Vec<String>,
}

impl From<GeneratedReflections> for Reflections {
    fn from(generated: GeneratedReflections) -> Self {
        Reflections {
            style_guidelines: generated.style_guidelines,
            general_facts: generated.general_facts,
        }
    }
}

/// Definition of the forced reflection tool
pub fn reflection_tool() -> ToolDefinition {
    ToolDefinition {
        name: REFLECTION_TOOL.to_string(),
        description: "Record the complete new lists of style guidelines and general facts about the user."
            .to_string(),
        input_schema: ToolInputSchema {
            schema_type: "object".to_string(),
            properties: json!({
                "style_guidelines": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "The complete new list of style rules and guidelines"
                },
                "general_facts": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "The complete new list of memories and facts about the user"
                }
            }),
            required: vec!["style_guidelines".to_string(), "general_facts".to_string()],
        },
    }
}

fn system_prompt(assistant: &AssistantConfig, article: Option<&Article>) -> String {
    let article_text = match article {
        Some(article) if !article.is_empty() => article.to_text(),
        _ => "No article found.".to_string(),
    };
    format!(
        "{}\n<article>\n{}\n</article>\n\n<current_reflections>\n{}\n</current_reflections>\n",
        REFLECTION_SYSTEM_PROMPT,
        article_text,
        format_reflections(&assistant.reflections)
    )
}

fn transcript(history: &[Message]) -> String {
    history
        .iter()
        .map(|message| {
            format!(
                "<{role}>\n{content}\n</{role}>",
                role = message.role.as_str(),
                content = message.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Produce brand-new reflections for an assistant from a finished
/// conversation
pub async fn regenerate(
    provider: &dyn LlmProvider,
    model: &str,
    assistant: &AssistantConfig,
    article: Option<&Article>,
    history: &[Message],
) -> Result<Reflections> {
    let user_prompt = format!(
        "Here is the conversation to reflect on:\n<conversation>\n{}\n</conversation>",
        transcript(history)
    );
    let request = CompletionRequest::new(model, vec![Message::user(user_prompt)])
        .with_system(system_prompt(assistant, article))
        .with_temperature(0.0)
        .with_tools(vec![reflection_tool()])
        .with_tool_choice(ToolChoice::Specific(REFLECTION_TOOL.to_string()));

    let response = provider.complete(request).await?;
    let input = response.tool_input(REFLECTION_TOOL).ok_or_else(|| {
        QuillError::Api(ApiError::InvalidResponse(format!(
            "model did not call {}",
            REFLECTION_TOOL
        )))
    })?;

    let generated: GeneratedReflections = serde_json::from_value(input.clone()).map_err(|e| {
        QuillError::Api(ApiError::InvalidResponse(format!(
            "bad {} arguments: {}",
            REFLECTION_TOOL, e
        )))
    })?;

    let reflections = Reflections::from(generated);
    tracing::info!(
        target: "quill.reflection",
        "regenerated reflections for '{}': {} style guidelines, {} facts",
        assistant.assistant_id,
        reflections.style_guidelines.len(),
        reflections.general_facts.len()
    );
    Ok(reflections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock_provider::MockProvider;

    fn assistant() -> AssistantConfig {
        AssistantConfig::new("a-1", "Writer").with_reflections(Reflections {
            style_guidelines: vec!["Use American spelling".to_string()],
            general_facts: vec!["Likes cats".to_string()],
        })
    }

    #[tokio::test]
    async fn test_regenerate_replaces_wholesale() {
        let provider = MockProvider::new().with_tool_call(
            REFLECTION_TOOL,
            json!({
                "style_guidelines": ["Use British spelling"],
                "general_facts": []
            }),
        );
        let history = vec![
            Message::user("Please use British spelling from now on."),
            Message::assistant("Will do."),
        ];

        let reflections = regenerate(&provider, "qwen-turbo", &assistant(), None, &history)
            .await
            .unwrap();

        assert_eq!(reflections.style_guidelines, vec!["Use British spelling"]);
        assert!(reflections.general_facts.is_empty());
    }

    #[tokio::test]
    async fn test_regenerate_forces_tool_and_sends_context() {
        let provider = MockProvider::new().with_tool_call(
            REFLECTION_TOOL,
            json!({"style_guidelines": [], "general_facts": ["Writes essays"]}),
        );
        let recorder = provider.clone();
        let article = Article::editable("essay.md", "An essay about rivers.");

        regenerate(
            &provider,
            "qwen-turbo",
            &assistant(),
            Some(&article),
            &[Message::user("hello")],
        )
        .await
        .unwrap();

        let sent = recorder.last_request().unwrap();
        assert_eq!(sent.tool_choice, ToolChoice::Specific(REFLECTION_TOOL.to_string()));
        assert_eq!(sent.tools.len(), 1);
        assert!(sent.temperature.abs() < f32::EPSILON);
        let system = sent.system.unwrap();
        assert!(system.contains("An essay about rivers."));
        assert!(system.contains("- Use American spelling"));
        assert!(sent.messages[0].content.contains("<user>\nhello\n</user>"));
    }

    #[tokio::test]
    async fn test_regenerate_without_tool_call_fails() {
        let provider = MockProvider::new().with_response("I think the user likes cats.");
        let result = regenerate(&provider, "qwen-turbo", &assistant(), None, &[]).await;
        assert!(matches!(
            result,
            Err(QuillError::Api(ApiError::InvalidResponse(_)))
        ));
    }

    #[tokio::test]
    async fn test_regenerate_with_malformed_arguments_fails() {
        let provider =
            MockProvider::new().with_tool_call(REFLECTION_TOOL, json!({"style_guidelines": "x"}));
        let result = regenerate(&provider, "qwen-turbo", &assistant(), None, &[]).await;
        assert!(matches!(
            result,
            Err(QuillError::Api(ApiError::InvalidResponse(_)))
        ));
    }

    #[test]
    fn test_system_prompt_without_article() {
        let prompt = system_prompt(&assistant(), None);
        assert!(prompt.contains("No article found."));
    }
}

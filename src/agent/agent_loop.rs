//! Core agent loop implementation.

use std::sync::Arc;

use crate::api::types::{LogEntryType, TaskLogEntry};
use crate::config::Config;
use crate::llm::{ChatMessage, LlmClient, OpenAiClient, Role, ToolCall};
use crate::tools::{ToolContext, ToolRegistry};

use super::prompt::build_system_prompt;

/// Final answer and execution log of one agent run.
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub response: String,
    pub log: Vec<TaskLogEntry>,
}

/// The payment agent.
pub struct Agent {
    model: String,
    max_iterations: usize,
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
}

impl Agent {
    /// Create an agent talking to the configured chat-completion endpoint.
    pub fn new(config: &Config) -> Self {
        let llm = Arc::new(OpenAiClient::new(
            config.llm.api_key.clone(),
            config.llm.base_url.clone(),
        ));
        Self::with_llm(config, llm, ToolRegistry::new())
    }

    pub fn with_llm(config: &Config, llm: Arc<dyn LlmClient>, tools: ToolRegistry) -> Self {
        Self {
            model: config.llm.model.clone(),
            max_iterations: config.max_iterations,
            llm,
            tools,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run a task and return the final response and execution log.
    pub async fn run_task(&self, task: &str, ctx: &ToolContext) -> anyhow::Result<AgentRun> {
        let mut log = Vec::new();

        let mut messages = vec![
            ChatMessage::system(build_system_prompt(&self.tools)),
            ChatMessage::user(task),
        ];
        let tool_schemas = self.tools.get_tool_schemas();

        for iteration in 0..self.max_iterations {
            tracing::debug!("Agent iteration {}", iteration + 1);

            let response = self
                .llm
                .chat_completion(&self.model, &messages, Some(&tool_schemas))
                .await?;

            if let Some(tool_calls) = response.tool_calls.as_ref().filter(|c| !c.is_empty()) {
                if let Some(thinking) = response.content.as_deref().filter(|c| !c.trim().is_empty()) {
                    log.push(entry(LogEntryType::Thinking, truncate_for_log(thinking, 1000)));
                }

                messages.push(ChatMessage {
                    role: Role::Assistant,
                    content: response.content.clone(),
                    tool_calls: Some(tool_calls.clone()),
                    tool_call_id: None,
                });

                for tool_call in tool_calls {
                    log.push(entry(
                        LogEntryType::ToolCall,
                        format!(
                            "Calling tool: {} with args: {}",
                            tool_call.function.name, tool_call.function.arguments
                        ),
                    ));

                    let (kind, result_str) = match self.execute_tool_call(tool_call, ctx).await {
                        Ok(output) => (LogEntryType::ToolResult, output),
                        Err(e) => {
                            tracing::warn!(tool = %tool_call.function.name, error = %e, "Tool call failed");
                            (LogEntryType::Error, format!("Error: {}", e))
                        }
                    };

                    log.push(entry(kind, truncate_for_log(&result_str, 1000)));
                    messages.push(ChatMessage::tool_result(tool_call.id.clone(), result_str));
                }

                continue;
            }

            if let Some(content) = response.content.filter(|c| !c.trim().is_empty()) {
                log.push(entry(LogEntryType::Response, truncate_for_log(&content, 2000)));
                return Ok(AgentRun {
                    response: content,
                    log,
                });
            }

            return Err(anyhow::anyhow!("LLM returned empty response"));
        }

        Err(anyhow::anyhow!(
            "Max iterations ({}) reached without completion",
            self.max_iterations
        ))
    }

    async fn execute_tool_call(
        &self,
        tool_call: &ToolCall,
        ctx: &ToolContext,
    ) -> anyhow::Result<String> {
        let args: serde_json::Value = serde_json::from_str(&tool_call.function.arguments)
            .unwrap_or(serde_json::Value::Null);

        self.tools
            .execute(&tool_call.function.name, args, ctx)
            .await
    }
}

fn entry(entry_type: LogEntryType, content: String) -> TaskLogEntry {
    TaskLogEntry {
        timestamp: chrono::Utc::now().to_rfc3339(),
        entry_type,
        content,
    }
}

/// Truncate a string for logging, on a char boundary.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatResponse, FunctionCall, LlmError, ToolSchema};
    use crate::tools::test_support::context;
    use async_trait::async_trait;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use tokio::sync::Mutex;

    /// Replays canned responses and records what it was sent.
    struct ScriptedLlm {
        responses: Mutex<VecDeque<ChatResponse>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<ChatResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat_completion(
            &self,
            _model: &str,
            messages: &[ChatMessage],
            _tools: Option<&[ToolSchema]>,
        ) -> Result<ChatResponse, LlmError> {
            self.seen.lock().await.push(messages.to_vec());
            Ok(self
                .responses
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| ChatResponse {
                    tool_calls: Some(vec![call("loop", "check_balance", "{}")]),
                    ..Default::default()
                }))
        }
    }

    fn call(id: &str, name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }
    }

    fn answer(text: &str) -> ChatResponse {
        ChatResponse {
            content: Some(text.to_string()),
            ..Default::default()
        }
    }

    fn config(max_iterations: usize) -> Config {
        let mut config = Config::new(
            "http://127.0.0.1:9".into(),
            "http://127.0.0.1:9".into(),
            "http://127.0.0.1:9".into(),
        );
        config.max_iterations = max_iterations;
        config
    }

    #[tokio::test]
    async fn executes_tool_calls_then_returns_answer() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/balances/currencies/USD");
                then.status(200).json_body(json!({"spendableBalance": 75.0}));
            })
            .await;

        let llm = ScriptedLlm::new(vec![
            ChatResponse {
                tool_calls: Some(vec![call("c1", "check_balance", r#"{"currency":"USD"}"#)]),
                ..Default::default()
            },
            answer("Balance is $75.00"),
        ]);
        let agent = Agent::with_llm(&config(5), llm.clone(), ToolRegistry::new());
        let ctx = context(server.url(""), server.url(""));

        let run = agent.run_task("How much money do we have?", &ctx).await.unwrap();

        assert_eq!(run.response, "Balance is $75.00");
        let kinds: Vec<&LogEntryType> = run.log.iter().map(|e| &e.entry_type).collect();
        assert!(matches!(
            kinds.as_slice(),
            [LogEntryType::ToolCall, LogEntryType::ToolResult, LogEntryType::Response]
        ));
        assert_eq!(run.log[1].content, "Current balance: $75.00");

        let seen = llm.seen.lock().await;
        let second = &seen[1];
        let tool_msg = second.last().unwrap();
        assert_eq!(tool_msg.role, Role::Tool);
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn tool_errors_are_fed_back_to_the_model() {
        let llm = ScriptedLlm::new(vec![
            ChatResponse {
                tool_calls: Some(vec![call("c1", "teleport_funds", "not json")]),
                ..Default::default()
            },
            answer("Could not do that"),
        ]);
        let agent = Agent::with_llm(&config(5), llm.clone(), ToolRegistry::new());
        let ctx = context("http://127.0.0.1:9".into(), "http://127.0.0.1:9".into());

        let run = agent.run_task("do it", &ctx).await.unwrap();

        assert_eq!(run.response, "Could not do that");
        assert_eq!(run.log[1].entry_type, LogEntryType::Error);
        assert!(run.log[1].content.starts_with("Error: Unknown tool"));
    }

    #[tokio::test]
    async fn stops_at_iteration_cap() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/balances/currencies/USD");
                then.status(200).json_body(json!(10.0));
            })
            .await;

        let llm = ScriptedLlm::new(Vec::new());
        let agent = Agent::with_llm(&config(3), llm.clone(), ToolRegistry::new());
        let ctx = context(server.url(""), server.url(""));

        let err = agent.run_task("loop forever", &ctx).await.expect_err("cap");
        assert!(err.to_string().contains("Max iterations (3)"));
        assert_eq!(llm.seen.lock().await.len(), 3);
    }

    #[tokio::test]
    async fn empty_answer_is_an_error() {
        let llm = ScriptedLlm::new(vec![ChatResponse::default()]);
        let agent = Agent::with_llm(&config(3), llm, ToolRegistry::new());
        let ctx = context("http://127.0.0.1:9".into(), "http://127.0.0.1:9".into());

        let err = agent.run_task("hello", &ctx).await.expect_err("empty");
        assert!(err.to_string().contains("empty response"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let s = "é".repeat(10);
        let out = truncate_for_log(&s, 5);
        assert!(out.starts_with("éé"));
        assert!(out.ends_with("... [truncated]"));
    }
}

use answerpipe_core::{Error, FunctionCallRequest, FunctionModel, Result};
use serde::{Deserialize, Serialize};

/// Model the original service pinned; override with ANSWERPIPE_OPENAI_MODEL.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo-1106";

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn openai_api_key_from_env() -> Option<String> {
    env("ANSWERPIPE_OPENAI_API_KEY").or_else(|| env("OPENAI_API_KEY"))
}

fn openai_base_url_from_env() -> Option<String> {
    env("ANSWERPIPE_OPENAI_BASE_URL")
}

fn openai_model_from_env() -> Option<String> {
    env("ANSWERPIPE_OPENAI_MODEL")
}

/// Chat-completions client speaking the OpenAI tools (function-calling) wire
/// format. The declared function is forced via `tool_choice`, so a usable
/// response always carries exactly the requested call.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(client: reqwest::Client, base_url: String, api_key: String, model: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
            model,
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = openai_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured("missing ANSWERPIPE_OPENAI_API_KEY (or OPENAI_API_KEY)".to_string())
        })?;
        let base_url =
            openai_base_url_from_env().unwrap_or_else(|| "https://api.openai.com".to_string());
        let model = openai_model_from_env().unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
        Ok(Self {
            client,
            base_url,
            api_key,
            model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint_chat_completions(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<Message>,
    tools: Vec<ToolDef>,
    tool_choice: ToolChoice,
    stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ToolDef {
    #[serde(rename = "type")]
    kind: &'static str,
    function: FunctionDef,
}

#[derive(Debug, Clone, Serialize)]
struct FunctionDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
struct ToolChoice {
    #[serde(rename = "type")]
    kind: &'static str,
    function: ToolChoiceFunction,
}

#[derive(Debug, Clone, Serialize)]
struct ToolChoiceFunction {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Clone, Deserialize)]
struct ToolCall {
    function: ToolCallFunction,
}

#[derive(Debug, Clone, Deserialize)]
struct ToolCallFunction {
    name: String,
    /// JSON-encoded arguments object.
    arguments: String,
}

#[async_trait::async_trait]
impl FunctionModel for OpenAiClient {
    async fn call_function(&self, req: &FunctionCallRequest) -> Result<serde_json::Value> {
        let timeout_ms = req.timeout_ms.unwrap_or(30_000).clamp(1_000, 120_000);

        let body = ChatCompletionsRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: req.system.clone(),
                },
                Message {
                    role: "user".to_string(),
                    content: req.prompt.clone(),
                },
            ],
            tools: vec![ToolDef {
                kind: "function",
                function: FunctionDef {
                    name: req.function.name.clone(),
                    description: req.function.description.clone(),
                    parameters: req.function.parameters.clone(),
                },
            }],
            tool_choice: ToolChoice {
                kind: "function",
                function: ToolChoiceFunction {
                    name: req.function.name.clone(),
                },
            },
            stream: false,
        };

        let resp = self
            .client
            .post(self.endpoint_chat_completions())
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.api_key),
            )
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Llm(format!("openai chat.completions HTTP {status}")));
        }

        let parsed: ChatCompletionsResponse =
            resp.json().await.map_err(|e| Error::Llm(e.to_string()))?;

        let call = parsed
            .choices
            .first()
            .and_then(|c| c.message.tool_calls.first())
            .ok_or_else(|| {
                Error::Llm(format!(
                    "model did not call function {}",
                    req.function.name
                ))
            })?;
        if call.function.name != req.function.name {
            return Err(Error::Llm(format!(
                "model called {} instead of {}",
                call.function.name, req.function.name
            )));
        }

        serde_json::from_str(&call.function.arguments)
            .map_err(|e| Error::Llm(format!("unparseable function arguments: {e}")))
    }
}

//! OpenAI-compatible chat-completions provider.
//!
//! One [`OpenAiCompatibleProvider`] serves api.openai.com, any server that
//! speaks the same Chat Completions protocol (via `base_url`), and Azure
//! OpenAI deployments (`api_type = "azure"`).
//!
//! The API key is wrapped in [`secrecy::SecretString`] and is never logged
//! or included in `Debug` output.

pub mod types;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use parley_core::llm::provider::LlmProvider;
use parley_types::config::ModelConfig;
use parley_types::error::ConfigError;
use parley_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, Message, MessageRole, StopReason, ToolCall,
    Usage,
};

use self::types::{
    ChatCompletionRequest, ChatCompletionResponse, ErrorEnvelope, WireFunction, WireFunctionCall,
    WireMessage, WireTool, WireToolCall, function_kind,
};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Request timeout for long generations.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Where and how requests are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Endpoint {
    OpenAi {
        base_url: String,
    },
    Azure {
        base_url: String,
        deployment: String,
        api_version: String,
    },
}

/// Provider for any OpenAI-compatible Chat Completions API.
///
/// Does NOT derive Debug; the key only leaves the `SecretString` when the
/// auth header is built.
pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    api_key: SecretString,
    endpoint: Endpoint,
    provider_name: String,
}

impl OpenAiCompatibleProvider {
    /// Build a provider for one catalog entry.
    ///
    /// `api_type` is `openai` (default) or `azure`. Azure needs `base_url`
    /// and `api_version`; the deployment defaults to the model name.
    pub fn new(config: &ModelConfig, api_key: SecretString) -> Result<Self, ConfigError> {
        let endpoint = match config.api_type.to_lowercase().as_str() {
            "openai" | "open_ai" => Endpoint::OpenAi {
                base_url: config
                    .base_url
                    .clone()
                    .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            },
            "azure" => {
                let base_url = config.base_url.clone().ok_or_else(|| {
                    ConfigError::Invalid(format!("azure model '{}' needs base_url", config.model))
                })?;
                let api_version = config.api_version.clone().ok_or_else(|| {
                    ConfigError::Invalid(format!("azure model '{}' needs api_version", config.model))
                })?;
                Endpoint::Azure {
                    base_url,
                    deployment: config
                        .deployment
                        .clone()
                        .unwrap_or_else(|| config.model.clone()),
                    api_version,
                }
            }
            other => {
                return Err(ConfigError::Invalid(format!(
                    "model '{}' has unsupported api_type '{other}'",
                    config.model
                )));
            }
        };

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to create HTTP client: {e}")))?;

        let provider_name = match endpoint {
            Endpoint::OpenAi { .. } => "openai",
            Endpoint::Azure { .. } => "azure.openai",
        }
        .to_string();

        Ok(Self {
            client,
            api_key,
            endpoint,
            provider_name,
        })
    }

    /// Full chat-completions URL.
    fn url(&self) -> String {
        match &self.endpoint {
            Endpoint::OpenAi { base_url } => {
                format!("{}/chat/completions", base_url.trim_end_matches('/'))
            }
            Endpoint::Azure {
                base_url,
                deployment,
                api_version,
            } => format!(
                "{}/openai/deployments/{deployment}/chat/completions?api-version={api_version}",
                base_url.trim_end_matches('/')
            ),
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.endpoint {
            Endpoint::OpenAi { .. } => builder.bearer_auth(self.api_key.expose_secret()),
            Endpoint::Azure { .. } => builder.header("api-key", self.api_key.expose_secret()),
        }
    }
}

impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = to_wire_request(request);

        let response = self
            .authorize(self.client.post(self.url()))
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Provider {
                message: format!("HTTP request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let error_body = response.text().await.unwrap_or_default();
            return Err(map_status(status.as_u16(), &error_body, retry_after_ms));
        }

        let wire: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(format!("failed to parse response: {e}")))?;
        from_wire_response(wire)
    }
}

/// Convert a generic [`CompletionRequest`] into the wire format.
fn to_wire_request(request: &CompletionRequest) -> ChatCompletionRequest {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(system) = &request.system {
        messages.push(to_wire_message(&Message::system(system.clone())));
    }
    messages.extend(request.messages.iter().map(to_wire_message));

    ChatCompletionRequest {
        model: request.model.clone(),
        messages,
        tools: request
            .tools
            .iter()
            .map(|spec| WireTool {
                kind: function_kind(),
                function: WireFunction {
                    name: spec.name.clone(),
                    description: spec.description.clone(),
                    parameters: spec.parameters.clone(),
                },
            })
            .collect(),
        max_tokens: request.max_tokens,
        temperature: request.temperature,
    }
}

fn to_wire_message(message: &Message) -> WireMessage {
    let tool_calls: Vec<WireToolCall> = message
        .tool_calls
        .iter()
        .map(|call| WireToolCall {
            id: call.id.clone(),
            kind: function_kind(),
            function: WireFunctionCall {
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            },
        })
        .collect();
    let content = if message.role == MessageRole::Assistant
        && message.content.is_empty()
        && !tool_calls.is_empty()
    {
        None
    } else {
        Some(message.content.clone())
    };

    WireMessage {
        role: message.role.to_string(),
        content,
        name: message.name.clone(),
        tool_calls,
        tool_call_id: message.tool_call_id.clone(),
    }
}

/// Convert the wire response into a generic [`CompletionResponse`].
fn from_wire_response(wire: ChatCompletionResponse) -> Result<CompletionResponse, LlmError> {
    let choice = wire
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::Deserialization("response has no choices".to_string()))?;

    let tool_calls: Vec<ToolCall> = choice
        .message
        .tool_calls
        .into_iter()
        .map(|call| ToolCall {
            id: call.id,
            name: call.function.name,
            arguments: call.function.arguments,
        })
        .collect();

    let stop_reason = choice
        .finish_reason
        .as_deref()
        .and_then(|reason| reason.parse::<StopReason>().ok())
        .unwrap_or(if tool_calls.is_empty() {
            StopReason::EndTurn
        } else {
            StopReason::ToolUse
        });

    let usage = wire
        .usage
        .map(|u| Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    Ok(CompletionResponse {
        id: wire.id,
        content: choice.message.content.unwrap_or_default(),
        tool_calls,
        model: wire.model,
        stop_reason,
        usage,
    })
}

/// Map a non-2xx status and body to an [`LlmError`].
/// `Retry-After` in delay-seconds form, as milliseconds.
fn parse_retry_after(header: &str) -> Option<u64> {
    header
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| secs.saturating_mul(1000))
}

fn map_status(status: u16, body: &str, retry_after_ms: Option<u64>) -> LlmError {
    let (message, code) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.message, envelope.error.code),
        Err(_) => (body.to_string(), None),
    };

    match status {
        401 | 403 => LlmError::AuthenticationFailed,
        429 => LlmError::RateLimited { retry_after_ms },
        400 if code.as_deref() == Some("context_length_exceeded") => {
            LlmError::InvalidRequest(format!("context length exceeded: {message}"))
        }
        400 | 404 | 422 => LlmError::InvalidRequest(message),
        500 | 502 | 503 | 529 => LlmError::Overloaded(message),
        _ => LlmError::Provider {
            message: format!("HTTP {status}: {message}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::llm::ToolSpec;

    #[test]
    fn retry_after_saturates_instead_of_overflowing() {
        assert_eq!(parse_retry_after(" 30 "), Some(30_000));
        assert_eq!(parse_retry_after(&u64::MAX.to_string()), Some(u64::MAX));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2026 07:28:00 GMT"), None);
    }

    fn provider(config: &ModelConfig) -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::new(config, SecretString::from("test-key-not-real")).unwrap()
    }

    #[test]
    fn openai_url_uses_default_base() {
        let p = provider(&ModelConfig::named("gpt-4o"));
        assert_eq!(p.name(), "openai");
        assert_eq!(p.url(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn azure_url_includes_deployment_and_version() {
        let mut config = ModelConfig::named("gpt-4o");
        config.api_type = "azure".to_string();
        config.base_url = Some("https://example.openai.azure.com/".to_string());
        config.api_version = Some("2024-06-01".to_string());
        config.deployment = Some("prod-4o".to_string());

        let p = provider(&config);
        assert_eq!(p.name(), "azure.openai");
        assert_eq!(
            p.url(),
            "https://example.openai.azure.com/openai/deployments/prod-4o/chat/completions?api-version=2024-06-01"
        );
    }

    #[test]
    fn azure_without_version_rejected() {
        let mut config = ModelConfig::named("gpt-4o");
        config.api_type = "azure".to_string();
        config.base_url = Some("https://example.openai.azure.com".to_string());
        let result = OpenAiCompatibleProvider::new(&config, SecretString::from("k"));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn unknown_api_type_rejected() {
        let mut config = ModelConfig::named("m");
        config.api_type = "carrier-pigeon".to_string();
        let result = OpenAiCompatibleProvider::new(&config, SecretString::from("k"));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn wire_request_carries_names_tools_and_tool_results() {
        let request = CompletionRequest {
            model: "gpt-4o".to_string(),
            messages: vec![
                Message::user("hi").with_name("user_proxy"),
                Message::assistant_tool_calls(
                    "",
                    vec![ToolCall {
                        id: "c1".to_string(),
                        name: "lookup".to_string(),
                        arguments: "{}".to_string(),
                    }],
                ),
                Message::tool_result("c1", "42"),
            ],
            system: Some("Be brief.".to_string()),
            tools: vec![ToolSpec {
                name: "lookup".to_string(),
                description: "Looks things up.".to_string(),
                parameters: serde_json::json!({"type": "object"}),
            }],
            max_tokens: 256,
            temperature: Some(0.2),
        };

        let json = serde_json::to_value(to_wire_request(&request)).unwrap();
        let messages = json["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["name"], "user_proxy");
        assert!(messages[2]["content"].is_null());
        assert_eq!(messages[2]["tool_calls"][0]["function"]["name"], "lookup");
        assert_eq!(messages[3]["role"], "tool");
        assert_eq!(messages[3]["tool_call_id"], "c1");
        assert_eq!(json["tools"][0]["type"], "function");
        assert_eq!(json["max_tokens"], 256);
    }

    #[test]
    fn response_with_tool_calls_parsed() {
        let body = r#"{
            "id": "chatcmpl-1",
            "model": "gpt-4o",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "lookup", "arguments": "{\"q\":\"x\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17}
        }"#;
        let wire: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        let response = from_wire_response(wire).unwrap();

        assert_eq!(response.content, "");
        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert_eq!(response.tool_calls[0].arguments, "{\"q\":\"x\"}");
        assert_eq!(response.usage.input_tokens, 12);
        assert_eq!(response.usage.output_tokens, 5);
    }

    #[test]
    fn empty_choices_is_deserialization_error() {
        let wire: ChatCompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            from_wire_response(wire),
            Err(LlmError::Deserialization(_))
        ));
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(map_status(401, "", None), LlmError::AuthenticationFailed));
        assert!(matches!(
            map_status(429, "", Some(2000)),
            LlmError::RateLimited {
                retry_after_ms: Some(2000)
            }
        ));
        let body = r#"{"error": {"message": "too long", "code": "context_length_exceeded"}}"#;
        match map_status(400, body, None) {
            LlmError::InvalidRequest(message) => assert!(message.contains("too long")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(map_status(503, "busy", None), LlmError::Overloaded(ref m) if m == "busy"));
        assert!(matches!(map_status(418, "teapot", None), LlmError::Provider { .. }));
    }
}

//! Google Gemini Provider
//!
//! Talks to the Generative Language `generateContent` endpoint with
//! function calling.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;
use url::Url;

use crate::core::{Config, Message, PilotError, Result, ToolCall, ToolDefinition};
use crate::llm::traits::{GenerateOptions, LLMProvider, LLMResponse, TokenUsage};

/// Schema keywords the function declaration API rejects
const UNSUPPORTED_SCHEMA_KEYS: &[&str] = &["$schema", "additionalProperties", "default"];

pub struct GeminiProvider {
    client: Client,
    base_url: Url,
    api_key: String,
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    prompt_feedback: Option<PromptFeedback>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GeminiProvider {
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .llm
            .api_key
            .clone()
            .ok_or(PilotError::MissingApiKey)?;

        let base_url = Url::parse(config.llm.base_url.trim_end_matches('/')).map_err(|e| {
            PilotError::config(format!("invalid llm.base_url '{}': {}", config.llm.base_url, e))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.llm.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key,
            temperature: config.llm.temperature,
        })
    }

    fn endpoint(&self, model: &str) -> Result<Url> {
        let model = model.trim_start_matches("models/");
        Url::parse(&format!(
            "{}/models/{}:generateContent",
            self.base_url.as_str().trim_end_matches('/'),
            model
        ))
        .map_err(|e| PilotError::llm(format!("invalid model '{}': {}", model, e)))
    }
}

/// Strip schema keywords the API does not accept, recursively
fn sanitize_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !UNSUPPORTED_SCHEMA_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), sanitize_schema(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_schema).collect()),
        other => other.clone(),
    }
}

fn function_declaration(tool: &ToolDefinition) -> Value {
    let mut declaration = Map::new();
    declaration.insert("name".into(), json!(tool.function.name));
    declaration.insert("description".into(), json!(tool.function.description));

    // Object schemas without properties are rejected; omit them entirely
    let params = &tool.function.parameters;
    let has_properties = params
        .get("properties")
        .and_then(|p| p.as_object())
        .map(|p| !p.is_empty())
        .unwrap_or(false);
    if has_properties {
        declaration.insert("parameters".into(), sanitize_schema(params));
    }

    Value::Object(declaration)
}

/// Map conversation messages onto Gemini `contents`.
///
/// Consecutive tool results are merged into one content so every model
/// turn with function calls is answered by a single turn of responses.
fn build_contents(messages: &[Message]) -> (Option<Value>, Vec<Value>) {
    let mut system_parts: Vec<Value> = Vec::new();
    let mut contents: Vec<Value> = Vec::new();
    let mut pending_responses: Vec<Value> = Vec::new();

    let flush = |pending: &mut Vec<Value>, contents: &mut Vec<Value>| {
        if !pending.is_empty() {
            contents.push(json!({ "role": "user", "parts": std::mem::take(pending) }));
        }
    };

    for msg in messages {
        match msg.role.as_str() {
            "system" => system_parts.push(json!({ "text": msg.content })),
            "tool" => pending_responses.push(json!({
                "functionResponse": {
                    "name": msg.tool_name.clone().unwrap_or_default(),
                    "response": { "content": msg.content }
                }
            })),
            "assistant" => {
                flush(&mut pending_responses, &mut contents);
                let mut parts = Vec::new();
                if !msg.content.is_empty() {
                    parts.push(json!({ "text": msg.content }));
                }
                for call in msg.tool_calls.iter().flatten() {
                    parts.push(json!({
                        "functionCall": { "name": call.name, "args": call.arguments }
                    }));
                }
                if !parts.is_empty() {
                    contents.push(json!({ "role": "model", "parts": parts }));
                }
            }
            _ => {
                flush(&mut pending_responses, &mut contents);
                contents.push(json!({ "role": "user", "parts": [{ "text": msg.content }] }));
            }
        }
    }
    flush(&mut pending_responses, &mut contents);

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(json!({ "parts": system_parts }))
    };

    (system, contents)
}

fn build_request(
    messages: &[Message],
    tools: &[ToolDefinition],
    options: &GenerateOptions,
) -> Value {
    let (system, contents) = build_contents(messages);

    let mut body = Map::new();
    body.insert("contents".into(), Value::Array(contents));

    if let Some(system) = system {
        body.insert("systemInstruction".into(), system);
    }

    if !tools.is_empty() {
        let declarations: Vec<Value> = tools.iter().map(function_declaration).collect();
        body.insert(
            "tools".into(),
            json!([{ "functionDeclarations": declarations }]),
        );
    }

    let mut generation = Map::new();
    if let Some(max_tokens) = options.max_tokens {
        generation.insert("maxOutputTokens".into(), json!(max_tokens));
    }
    if let Some(temperature) = options.temperature {
        generation.insert("temperature".into(), json!(temperature));
    }
    if !generation.is_empty() {
        body.insert("generationConfig".into(), Value::Object(generation));
    }

    Value::Object(body)
}

fn parse_response(model: &str, response: GenerateContentResponse) -> Result<LLMResponse> {
    let candidate = match response.candidates.into_iter().next() {
        Some(c) => c,
        None => {
            let reason = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates returned".to_string());
            return Err(PilotError::llm(format!("Gemini returned nothing: {}", reason)));
        }
    };

    let mut content = String::new();
    let mut tool_calls = Vec::new();

    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if let Some(text) = part.text {
            content.push_str(&text);
        }
        if let Some(call) = part.function_call {
            tool_calls.push(ToolCall::new(call.name, call.args));
        }
    }

    if content.is_empty() && tool_calls.is_empty() {
        if let Some(reason) = candidate.finish_reason.filter(|r| r != "STOP") {
            return Err(PilotError::llm(format!(
                "Gemini stopped without output: {}",
                reason
            )));
        }
    }

    let usage = response.usage_metadata.map(|u| TokenUsage {
        prompt_tokens: u.prompt_token_count,
        completion_tokens: u.candidates_token_count,
        total_tokens: u.total_token_count,
    });

    Ok(LLMResponse {
        content,
        tool_calls,
        usage,
        model: response.model_version.unwrap_or_else(|| model.to_string()),
    })
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    async fn chat_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        let mut options = options.unwrap_or_default();
        if options.temperature.is_none() {
            options.temperature = self.temperature;
        }

        let body = build_request(messages, tools, &options);
        debug!(
            model,
            messages = messages.len(),
            tools = tools.len(),
            "Gemini request"
        );

        let resp = self
            .client
            .post(self.endpoint(model)?)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    PilotError::llm(format!("Cannot reach {}: {}", self.base_url, e))
                } else if e.is_timeout() {
                    PilotError::llm("Gemini request timed out")
                } else {
                    PilotError::Http(e)
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            return Err(PilotError::llm(format!(
                "Gemini API error ({}): {}",
                status, error_text
            )));
        }

        let response: GenerateContentResponse = resp.json().await?;
        let parsed = parse_response(model, response)?;

        if let Some(ref usage) = parsed.usage {
            debug!(
                prompt = usage.prompt_tokens,
                completion = usage.completion_tokens,
                "Gemini usage"
            );
        }

        Ok(parsed)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

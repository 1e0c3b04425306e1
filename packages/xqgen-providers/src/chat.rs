//! OpenAI-compatible chat completions, in plain-text and JSON-schema structured modes.

use serde::Serialize;
use serde_json::Value;

use crate::{Error, Result};

/// A response schema the model is bound to in structured mode.
#[derive(Clone, Debug, Serialize)]
pub struct ResponseSchema {
	pub name: String,
	pub schema: Value,
}
impl ResponseSchema {
	pub fn new(name: impl Into<String>, schema: Value) -> Self {
		Self { name: name.into(), schema }
	}
}

/// Builds a `{ role, content }` message.
pub fn message(role: &str, content: impl Into<String>) -> Value {
	serde_json::json!({ "role": role, "content": content.into() })
}

/// Returns the assistant's text content.
pub async fn complete(cfg: &xqgen_config::LlmProviderConfig, messages: &[Value]) -> Result<String> {
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages,
	});
	let json = post(cfg, &body).await?;

	parse_chat_content(&json).map(str::to_string)
}

/// Returns the assistant's content parsed as JSON. The caller owns schema conformance checks.
pub async fn complete_structured(
	cfg: &xqgen_config::LlmProviderConfig,
	messages: &[Value],
	schema: &ResponseSchema,
) -> Result<Value> {
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages,
		"response_format": {
			"type": "json_schema",
			"json_schema": {
				"name": schema.name,
				"strict": true,
				"schema": schema.schema,
			},
		},
	});
	let json = post(cfg, &body).await?;

	parse_structured_content(&json)
}

async fn post(cfg: &xqgen_config::LlmProviderConfig, body: &Value) -> Result<Value> {
	let client = crate::http_client(cfg.timeout_ms)?;
	let url = crate::endpoint(&cfg.api_base, &cfg.path);

	tracing::debug!(provider_id = %cfg.provider_id, model = %cfg.model, "Calling chat provider.");

	let res = client
		.post(&url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(body)
		.send()
		.await?;

	Ok(res.error_for_status()?.json().await?)
}

fn parse_chat_content(json: &Value) -> Result<&str> {
	let message = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.ok_or_else(|| Error::InvalidResponse {
			message: "Chat response is missing choices[0].message.".to_string(),
		})?;

	if let Some(refusal) = message.get("refusal").and_then(|r| r.as_str())
		&& !refusal.trim().is_empty()
	{
		return Err(Error::InvalidResponse { message: format!("Model refused: {refusal}") });
	}

	message.get("content").and_then(|c| c.as_str()).ok_or_else(|| Error::InvalidResponse {
		message: "Chat response message has no text content.".to_string(),
	})
}

fn parse_structured_content(json: &Value) -> Result<Value> {
	let content = parse_chat_content(json)?;

	serde_json::from_str(strip_code_fence(content)).map_err(|_| Error::InvalidResponse {
		message: "Structured chat content is not valid JSON.".to_string(),
	})
}

fn strip_code_fence(content: &str) -> &str {
	let trimmed = content.trim();
	let Some(inner) = trimmed.strip_prefix("```") else {
		return trimmed;
	};
	let inner = inner.strip_prefix("json").unwrap_or(inner);

	inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn chat_json(content: &str) -> Value {
		serde_json::json!({
			"choices": [
				{ "message": { "role": "assistant", "content": content } }
			]
		})
	}

	#[test]
	fn parses_choice_content_text() {
		let json = chat_json("xmldb child collection listing");

		assert_eq!(parse_chat_content(&json).expect("parse failed"), "xmldb child collection listing");
	}

	#[test]
	fn parses_structured_content_json() {
		let json = chat_json("{\"description\": \"d\", \"xquery\": \"q\"}");
		let parsed = parse_structured_content(&json).expect("parse failed");

		assert_eq!(parsed["xquery"], "q");
	}

	#[test]
	fn accepts_fenced_structured_content() {
		let json = chat_json("```json\n{\"isAcceptable\": true}\n```");
		let parsed = parse_structured_content(&json).expect("parse failed");

		assert_eq!(parsed["isAcceptable"], true);
	}

	#[test]
	fn non_json_structured_content_is_malformed() {
		let err = parse_structured_content(&chat_json("I think it is fine.")).expect_err("expected error");

		assert!(err.is_malformed_response());
	}

	#[test]
	fn refusal_is_reported() {
		let json = serde_json::json!({
			"choices": [{ "message": { "content": null, "refusal": "No." } }]
		});

		assert!(parse_chat_content(&json).is_err());
	}
}

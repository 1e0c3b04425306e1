//! Per-candidate relevance judgement with a pessimistic fallback.
//!
//! Every candidate yields exactly one verdict: malformed judge output, transport errors and
//! timeouts are absorbed here and never reach the caller.

use std::time::Duration;

use serde_json::Value;

use xqgen_domain::{Attempt, FunctionDoc, ValidationVerdict};
use xqgen_providers::chat::{self, ResponseSchema};

use crate::{Error, Result, XqService};

pub const FUNCTION_VERDICT_SCHEMA: &str = "function_verdict";
pub const VALIDATION_TIMEOUT_REASONING: &str = "validation timeout";
pub const VALIDATION_ERROR_REASONING: &str = "validation error";

/// A retrieved function the judge accepted.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
	pub doc: FunctionDoc,
	pub verdict: ValidationVerdict,
}

impl XqService {
	/// Judges every doc concurrently. The output is index-aligned with `docs`.
	pub async fn validate_all(
		&self,
		request: &str,
		docs: &[FunctionDoc],
		failed: &[&Attempt],
	) -> Vec<ValidationVerdict> {
		let timeout = Duration::from_millis(self.cfg.retrieval.validation_timeout_ms);
		let failed_json = failed_attempts_json(failed);
		let judgements = docs.iter().map(|doc| {
			let failed_json = failed_json.as_str();

			async move {
				match tokio::time::timeout(timeout, self.judge(request, doc, failed_json)).await {
					Ok(Ok(verdict)) => verdict,
					Ok(Err(Error::MalformedResponse { message })) => {
						tracing::warn!(function = %doc.name, error = %message, "Validator output is malformed.");

						ValidationVerdict::parse_failure()
					},
					Ok(Err(err)) => {
						tracing::warn!(function = %doc.name, error = %err, "Validator call failed.");

						ValidationVerdict::pessimistic(VALIDATION_ERROR_REASONING)
					},
					Err(_) => {
						tracing::warn!(
							function = %doc.name,
							timeout_ms = self.cfg.retrieval.validation_timeout_ms,
							"Validator call timed out."
						);

						ValidationVerdict::pessimistic(VALIDATION_TIMEOUT_REASONING)
					},
				}
			}
		});

		futures::future::join_all(judgements).await
	}

	async fn judge(&self, request: &str, doc: &FunctionDoc, failed_json: &str) -> Result<ValidationVerdict> {
		let messages = build_validator_messages(request, doc, failed_json);
		let schema = verdict_schema();
		let value = self
			.providers
			.validator
			.complete_structured(&self.cfg.providers.validator, &messages, &schema)
			.await?;

		parse_verdict(&value).ok_or_else(|| Error::MalformedResponse {
			message: format!("Verdict does not match the {FUNCTION_VERDICT_SCHEMA} schema."),
		})
	}
}

/// Keeps accepted candidates, ordered by confidence descending. Ties keep similarity order.
pub fn select_accepted(docs: &[FunctionDoc], verdicts: &[ValidationVerdict]) -> Vec<Candidate> {
	let mut accepted: Vec<Candidate> = docs
		.iter()
		.zip(verdicts)
		.filter(|(_, verdict)| verdict.is_acceptable)
		.map(|(doc, verdict)| Candidate { doc: doc.clone(), verdict: verdict.clone() })
		.collect();

	accepted.sort_by(|a, b| b.verdict.confidence.cmp(&a.verdict.confidence));

	accepted
}

pub fn verdict_schema() -> ResponseSchema {
	ResponseSchema::new(
		FUNCTION_VERDICT_SCHEMA,
		serde_json::json!({
			"type": "object",
			"properties": {
				"isAcceptable": { "type": "boolean" },
				"confidence": { "type": "number", "minimum": 0, "maximum": 100 },
				"reasoning": { "type": "string" },
				"suggestedAlternativeSearch": { "type": ["string", "null"] }
			},
			"required": ["isAcceptable", "confidence", "reasoning", "suggestedAlternativeSearch"],
			"additionalProperties": false
		}),
	)
}

/// Returns `None` for any shape the schema does not allow.
pub fn parse_verdict(value: &Value) -> Option<ValidationVerdict> {
	let object = value.as_object()?;
	let is_acceptable = object.get("isAcceptable")?.as_bool()?;
	let confidence = object.get("confidence")?.as_f64()?;
	let reasoning = object.get("reasoning")?.as_str()?;
	let suggested_alternative_search = match object.get("suggestedAlternativeSearch") {
		None | Some(Value::Null) => None,
		Some(Value::String(text)) => Some(text.clone()),
		Some(_) => return None,
	};

	if !confidence.is_finite() || !(0.0..=100.0).contains(&confidence) {
		return None;
	}

	Some(ValidationVerdict {
		is_acceptable,
		confidence: confidence.round() as u8,
		reasoning: reasoning.to_string(),
		suggested_alternative_search,
	})
}

fn failed_attempts_json(failed: &[&Attempt]) -> String {
	serde_json::to_string(failed).unwrap_or_else(|_| "[]".to_string())
}

fn build_validator_messages(request: &str, doc: &FunctionDoc, failed_json: &str) -> Vec<Value> {
	let system_prompt = "You are an expert XQuery function validator for eXist-db. \
Judge whether the provided function is suitable for the user's request and return a structured assessment. \
Treat a similarity above 90% as a strong signal and 70-90% as a moderate one. \
Consider the signature, the return type, and whether the function was involved in previous failed attempts. \
When the function is not acceptable, suggest an alternative search string.";
	let user_prompt = format!(
		"User request:\n{request}\n\nFunction documentation:\n{doc}\n\nSimilarity score: {score}\n\nPrevious failed attempts:\n{failed_json}",
		doc = doc.render(),
		score = doc.similarity_percent(),
	);

	vec![chat::message("system", system_prompt), chat::message("user", user_prompt)]
}

#[cfg(test)]
mod tests {
	use super::*;

	fn doc(name: &str, score: f32) -> FunctionDoc {
		FunctionDoc {
			name: name.to_string(),
			signature: format!("{name}()"),
			description: "d".to_string(),
			return_type: String::new(),
			module_name: String::new(),
			module_uri: String::new(),
			similarity_score: score,
		}
	}

	fn verdict(is_acceptable: bool, confidence: u8) -> ValidationVerdict {
		ValidationVerdict {
			is_acceptable,
			confidence,
			reasoning: "r".to_string(),
			suggested_alternative_search: None,
		}
	}

	#[test]
	fn parses_conformant_verdict() {
		let parsed = parse_verdict(&serde_json::json!({
			"isAcceptable": true,
			"confidence": 92.4,
			"reasoning": "Lists child collections.",
			"suggestedAlternativeSearch": null
		}))
		.expect("verdict expected");

		assert_eq!(parsed.confidence, 92);
		assert!(parsed.is_acceptable);
		assert_eq!(parsed.suggested_alternative_search, None);
	}

	#[test]
	fn rejects_non_conformant_verdicts() {
		for value in [
			serde_json::json!({ "isAcceptable": "yes", "confidence": 50, "reasoning": "r" }),
			serde_json::json!({ "isAcceptable": true, "reasoning": "r" }),
			serde_json::json!({ "isAcceptable": true, "confidence": 101, "reasoning": "r" }),
			serde_json::json!({ "isAcceptable": true, "confidence": -1, "reasoning": "r" }),
			serde_json::json!({
				"isAcceptable": false,
				"confidence": 10,
				"reasoning": "r",
				"suggestedAlternativeSearch": 3
			}),
			serde_json::json!(["not", "an", "object"]),
		] {
			assert_eq!(parse_verdict(&value), None, "accepted {value}");
		}
	}

	#[test]
	fn accepted_candidates_sort_stably_by_confidence() {
		let docs = vec![doc("a", 0.95), doc("b", 0.90), doc("c", 0.85), doc("d", 0.80)];
		let verdicts = vec![verdict(true, 80), verdict(false, 99), verdict(true, 95), verdict(true, 80)];
		let names: Vec<String> = select_accepted(&docs, &verdicts)
			.into_iter()
			.map(|candidate| candidate.doc.name)
			.collect();

		assert_eq!(names, vec!["c", "a", "d"]);
	}
}

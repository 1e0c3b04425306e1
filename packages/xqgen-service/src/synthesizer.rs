use serde_json::Value;

use xqgen_domain::{Attempt, QueryFingerprint, SynthesisResult, VERSION_DECLARATION, xquery};
use xqgen_providers::chat::{self, ResponseSchema};

use crate::{Error, Result, XqService, tools, validator::Candidate};

pub const XQUERY_RESPONSE_SCHEMA: &str = "xquery_response";
pub const FAILED_FUNCTION_LABEL: &str = "[used in a failed attempt]";

/// Everything the synthesizer sees for one attempt.
#[derive(Clone, Copy, Debug)]
pub struct SynthesisContext<'a> {
	pub request: &'a str,
	pub candidates: &'a [Candidate],
	/// Failed attempts of the whole session, oldest first.
	pub failed: &'a [&'a Attempt],
	pub successful: &'a [&'a Attempt],
}

impl XqService {
	/// Produces a query that passes every structural rule, or a [`Error::SynthesisSchema`]
	/// carrying the rejected text.
	pub async fn synthesize(&self, ctx: SynthesisContext<'_>) -> Result<SynthesisResult> {
		let return_limit = self.cfg.synthesis.return_limit;
		let messages = build_synthesis_messages(ctx, return_limit);
		let schema = response_schema();
		let value = self
			.providers
			.synthesizer
			.complete_structured(&self.cfg.providers.synthesizer, &messages, &schema)
			.await
			.map_err(|err| match err {
				Error::MalformedResponse { message } =>
					Error::SynthesisSchema { message, query_text: String::new() },
				err => err,
			})?;
		let mut result: SynthesisResult =
			serde_json::from_value(value).map_err(|err| Error::SynthesisSchema {
				message: format!("Response does not match the {XQUERY_RESPONSE_SCHEMA} schema: {err}"),
				query_text: String::new(),
			})?;

		result.query_text = result.query_text.trim().to_string();

		xquery::check_synthesis(&result, ctx.request, return_limit).map_err(|violation| {
			Error::SynthesisSchema { message: violation.to_string(), query_text: result.query_text.clone() }
		})?;

		let fingerprint = QueryFingerprint::of(&result.query_text);
		let repeated = ctx.failed.iter().any(|attempt| {
			attempt.user_input() == ctx.request
				&& !attempt.query_text().is_empty()
				&& QueryFingerprint::of(attempt.query_text()) == fingerprint
		});

		if repeated {
			return Err(Error::SynthesisSchema {
				message: format!(
					"Query {} repeats a failed attempt for this request.",
					fingerprint.short_hex()
				),
				query_text: result.query_text,
			});
		}

		Ok(result)
	}
}

pub fn response_schema() -> ResponseSchema {
	ResponseSchema::new(
		XQUERY_RESPONSE_SCHEMA,
		serde_json::json!({
			"type": "object",
			"properties": {
				"description": {
					"type": "string",
					"description": "What the query does and why the chosen functions fit, citing their similarity."
				},
				"xquery": {
					"type": "string",
					"description": "The complete XQuery expression."
				}
			},
			"required": ["description", "xquery"],
			"additionalProperties": false
		}),
	)
}

/// True when a failed query calls `name`.
pub fn implicated_in_failure(name: &str, failed: &[&Attempt]) -> bool {
	let call = format!("{name}(");

	failed.iter().any(|attempt| attempt.query_text().contains(&call))
}

pub(crate) fn build_synthesis_messages(ctx: SynthesisContext<'_>, return_limit: u32) -> Vec<Value> {
	let system_prompt = format!(
		"You are an expert on eXist-db and XQuery. \
The context lists documented functions from eXist-db, sorted by relevance, each with a similarity score. \
Scores above 90% indicate highly relevant functions and scores between 70% and 90% moderately relevant ones.\n\n\
Generate an XQuery expression that:\n\
- starts with '{VERSION_DECLARATION}';\n\
- returns at most {return_limit} items by wrapping its whole returned expression in subsequence(..., 1, {return_limit}) unless the user asks for unbounded output;\n\
- declares or imports every namespace prefix it uses that eXist-db does not bind by default;\n\
- prefers functions with higher similarity and xmldb module functions where possible;\n\
- never reuses a function marked {FAILED_FUNCTION_LABEL} when another listed function can do the job.\n\n\
In the description, explain why the chosen functions fit and reference their similarity scores.\n\n\
Context:\n{context}",
		context = build_context(ctx),
	);

	vec![chat::message("system", system_prompt), chat::message("user", ctx.request)]
}

fn build_context(ctx: SynthesisContext<'_>) -> String {
	let mut out = String::new();

	if !ctx.successful.is_empty() {
		out.push_str("## PREVIOUS SUCCESSFUL ATTEMPTS\n\n");

		for attempt in ctx.successful {
			out.push_str(&format!(
				"User input:\n{}\nXQuery:\n{}\nResult:\n{}\n\n",
				attempt.user_input(),
				attempt.query_text(),
				attempt.result().unwrap_or_default()
			));
		}
	}
	if !ctx.failed.is_empty() {
		out.push_str("## PREVIOUS FAILED ATTEMPTS\n\n");

		for attempt in ctx.failed {
			out.push_str(&tools::critique(attempt.query_text(), attempt.error().unwrap_or_default()));
			out.push_str("\n\n");
		}
	}

	out.push_str("## XQUERY DOCUMENTATION (sorted by relevance)\n\n");

	let docs: Vec<String> = ctx
		.candidates
		.iter()
		.map(|candidate| {
			let label = if implicated_in_failure(&candidate.doc.name, ctx.failed) {
				format!(" {FAILED_FUNCTION_LABEL}")
			} else {
				String::new()
			};

			format!(
				"[Similarity: {}] [Confidence: {}]{label}\n{}\n-------------------",
				candidate.doc.similarity_percent(),
				candidate.verdict.confidence,
				candidate.doc.render()
			)
		})
		.collect();

	out.push_str(&docs.join("\n\n"));

	out
}

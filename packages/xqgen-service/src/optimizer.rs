use serde::Serialize;
use serde_json::Value;

use xqgen_domain::Attempt;
use xqgen_providers::chat;

use crate::{Error, Result, XqService};

#[derive(Debug, Serialize)]
struct History<'a> {
	successful: Vec<&'a Attempt>,
	failed: Vec<&'a Attempt>,
}

impl XqService {
	/// Rewrites a raw request into a technical search string for the function index.
	pub async fn optimize_search(&self, request: &str, attempts: &[Attempt]) -> Result<String> {
		let messages = build_optimizer_messages(request, attempts);
		let text = self
			.providers
			.optimizer
			.complete(&self.cfg.providers.optimizer, &messages)
			.await?;
		let search = clean_search(&text);

		if search.is_empty() {
			return Err(Error::Provider {
				message: "Search optimizer returned an empty search string.".to_string(),
			});
		}

		tracing::debug!(search = %search, "Optimized search string.");

		Ok(search)
	}
}

pub(crate) fn build_optimizer_messages(request: &str, attempts: &[Attempt]) -> Vec<Value> {
	let (successful, failed): (Vec<&Attempt>, Vec<&Attempt>) =
		attempts.iter().partition(|attempt| attempt.is_success());
	let history_json = serde_json::to_string_pretty(&History { successful, failed })
		.unwrap_or_else(|_| "{\"successful\": [], \"failed\": []}".to_string());
	let system_prompt = "You optimize search queries for XQuery function discovery in eXist-db. \
Analyze the user's request and the previous attempts, then produce the most effective search terms. \
Focus on the core functionality requested and on technical XQuery terms that match function documentation. \
Avoid paths that failed before and reuse patterns from queries that worked. \
Return only the search string, with no explanation.";
	let user_prompt = format!(
		"User request:\n{request}\n\nPrevious attempts:\n{history_json}\n\nGenerate an optimized search query to find the most relevant XQuery function."
	);

	vec![chat::message("system", system_prompt), chat::message("user", user_prompt)]
}

/// Trims the completion and strips one pair of surrounding quotes.
pub(crate) fn clean_search(text: &str) -> String {
	let trimmed = text.trim();

	for quote in ['"', '\'', '`'] {
		if let Some(inner) = trimmed.strip_prefix(quote).and_then(|s| s.strip_suffix(quote)) {
			return inner.trim().to_string();
		}
	}

	trimmed.to_string()
}

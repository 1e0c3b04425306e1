use serde::{Deserialize, Serialize};

pub const PARSE_FAILURE_REASONING: &str = "parse failure";
pub const DEFAULT_ALTERNATIVE_SEARCH: &str = "broaden search term";

/// A documented database function as stored in the corpus index, plus the similarity it scored
/// against the current search string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDoc {
	pub name: String,
	pub signature: String,
	pub description: String,
	pub return_type: String,
	pub module_name: String,
	pub module_uri: String,
	pub similarity_score: f32,
}
impl FunctionDoc {
	/// The text the judge and the synthesizer see for this function.
	pub fn render(&self) -> String {
		let mut out = format!("FUNCTION: {}\n", self.name);

		if !self.signature.is_empty() {
			out.push_str(&format!("SIGNATURE: {}\n", self.signature));
		}
		if !self.return_type.is_empty() {
			out.push_str(&format!("RETURNS: {}\n", self.return_type));
		}
		if !self.module_name.is_empty() || !self.module_uri.is_empty() {
			out.push_str(&format!("MODULE: {} ({})\n", self.module_name, self.module_uri));
		}

		out.push_str(&format!("DESCRIPTION: {}", self.description));

		out
	}

	pub fn similarity_percent(&self) -> String {
		format!("{:.2}%", self.similarity_score * 100.0)
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationVerdict {
	pub is_acceptable: bool,
	/// 0..=100.
	pub confidence: u8,
	pub reasoning: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub suggested_alternative_search: Option<String>,
}
impl ValidationVerdict {
	/// Verdict used whenever the judge's answer cannot be trusted.
	pub fn pessimistic(reasoning: impl Into<String>) -> Self {
		Self {
			is_acceptable: false,
			confidence: 0,
			reasoning: reasoning.into(),
			suggested_alternative_search: Some(DEFAULT_ALTERNATIVE_SEARCH.to_string()),
		}
	}

	pub fn parse_failure() -> Self {
		Self::pessimistic(PARSE_FAILURE_REASONING)
	}

	pub fn alternative_search(&self) -> Option<&str> {
		self.suggested_alternative_search.as_deref().map(str::trim).filter(|s| !s.is_empty())
	}
}

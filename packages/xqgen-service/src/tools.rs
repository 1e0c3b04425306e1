use xqgen_domain::FunctionDoc;

use crate::{Result, XqService};

/// The closed set of capabilities the session exposes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolCall {
	FunctionSearch { query: String },
	ExecuteQuery { query_text: String },
	CritiqueQuery { query_text: String, feedback: String },
}

#[derive(Clone, Debug, PartialEq)]
pub enum ToolOutput {
	Functions(Vec<FunctionDoc>),
	QueryResult(String),
	Critique(String),
}
impl ToolOutput {
	pub fn render(&self) -> String {
		match self {
			Self::Functions(docs) => docs
				.iter()
				.map(|doc| {
					format!(
						"Function: {}\nSignature: {}\nDescription: {}",
						doc.name, doc.signature, doc.description
					)
				})
				.collect::<Vec<_>>()
				.join("\n\n---\n\n"),
			Self::QueryResult(result) => format!("Output:\n{result}"),
			Self::Critique(text) => text.clone(),
		}
	}
}

impl XqService {
	pub async fn invoke(&self, call: ToolCall) -> Result<ToolOutput> {
		match call {
			ToolCall::FunctionSearch { query } => Ok(ToolOutput::Functions(self.retrieve(&query).await?)),
			ToolCall::ExecuteQuery { query_text } =>
				Ok(ToolOutput::QueryResult(self.execute(&query_text).await?)),
			ToolCall::CritiqueQuery { query_text, feedback } =>
				Ok(ToolOutput::Critique(critique(&query_text, &feedback))),
		}
	}
}

/// Frames a failed query and its feedback as a refinement instruction.
pub fn critique(query_text: &str, feedback: &str) -> String {
	format!("Refine this query based on the feedback:\n\n{query_text}\n\nFeedback:\n{feedback}")
}

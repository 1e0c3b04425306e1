use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One synthesize-execute cycle. Fields are private so a recorded attempt cannot be edited.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
	user_input: String,
	query_text: String,
	outcome: AttemptOutcome,
	#[serde(with = "crate::time_serde")]
	timestamp: OffsetDateTime,
}
impl Attempt {
	pub fn success(
		user_input: impl Into<String>,
		query_text: impl Into<String>,
		result: impl Into<String>,
	) -> Self {
		Self {
			user_input: user_input.into(),
			query_text: query_text.into(),
			outcome: AttemptOutcome::Success { result: result.into() },
			timestamp: OffsetDateTime::now_utc(),
		}
	}

	pub fn failure(
		user_input: impl Into<String>,
		query_text: impl Into<String>,
		error: impl Into<String>,
	) -> Self {
		Self {
			user_input: user_input.into(),
			query_text: query_text.into(),
			outcome: AttemptOutcome::Failure { error: error.into() },
			timestamp: OffsetDateTime::now_utc(),
		}
	}

	pub fn user_input(&self) -> &str {
		&self.user_input
	}

	/// Empty when synthesis failed before producing any query text.
	pub fn query_text(&self) -> &str {
		&self.query_text
	}

	pub fn outcome(&self) -> &AttemptOutcome {
		&self.outcome
	}

	pub fn timestamp(&self) -> OffsetDateTime {
		self.timestamp
	}

	pub fn is_success(&self) -> bool {
		matches!(self.outcome, AttemptOutcome::Success { .. })
	}

	pub fn result(&self) -> Option<&str> {
		match &self.outcome {
			AttemptOutcome::Success { result } => Some(result),
			AttemptOutcome::Failure { .. } => None,
		}
	}

	pub fn error(&self) -> Option<&str> {
		match &self.outcome {
			AttemptOutcome::Success { .. } => None,
			AttemptOutcome::Failure { error } => Some(error),
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum AttemptOutcome {
	Success { result: String },
	Failure { error: String },
}

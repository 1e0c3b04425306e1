pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Malformed provider response: {message}")]
	MalformedResponse { message: String },
	#[error("Retrieval error: {message}")]
	Retrieval { message: String },
	#[error("Synthesis schema violation: {message}")]
	SynthesisSchema { message: String, query_text: String },
	#[error("Execution error: {message}")]
	Execution { message: String },
}
impl Error {
	/// The query text a failure is attributed to, empty when none was produced.
	pub fn query_text(&self) -> &str {
		match self {
			Self::SynthesisSchema { query_text, .. } => query_text,
			_ => "",
		}
	}
}

impl From<xqgen_providers::Error> for Error {
	fn from(err: xqgen_providers::Error) -> Self {
		if err.is_malformed_response() {
			Self::MalformedResponse { message: err.to_string() }
		} else {
			Self::Provider { message: err.to_string() }
		}
	}
}

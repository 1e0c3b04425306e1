//! Session state and the bounded synthesize/execute repair loop.

use uuid::Uuid;

use xqgen_domain::{Attempt, xquery};

use crate::{Error, Result, XqService, retrieval::Gathered, synthesizer::SynthesisContext};

pub const EXIT_SENTINEL: &str = "exit";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
	AwaitingInput,
	Synthesizing,
	Executing,
	Succeeded,
	FailedRetry,
	Aborted,
}

/// One line read at the session boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
	Exit,
	Empty,
	Request(String),
}

pub fn parse_input(line: &str) -> Input {
	let trimmed = line.trim();

	if trimmed.is_empty() {
		Input::Empty
	} else if trimmed.eq_ignore_ascii_case(EXIT_SENTINEL) {
		Input::Exit
	} else {
		Input::Request(trimmed.to_string())
	}
}

/// Per-session attempt history and counters. Only the loop mutates it.
#[derive(Clone, Debug)]
pub struct SessionState {
	session_id: Uuid,
	failed_count: u32,
	successful_count: u32,
	attempts: Vec<Attempt>,
	current_user_input: Option<String>,
	request_start: usize,
}
impl SessionState {
	pub fn new() -> Self {
		Self {
			session_id: Uuid::new_v4(),
			failed_count: 0,
			successful_count: 0,
			attempts: Vec::new(),
			current_user_input: None,
			request_start: 0,
		}
	}

	pub fn session_id(&self) -> Uuid {
		self.session_id
	}

	/// Failures recorded for the current request.
	pub fn failed_count(&self) -> u32 {
		self.failed_count
	}

	pub fn successful_count(&self) -> u32 {
		self.successful_count
	}

	/// Every attempt of the session, oldest first.
	pub fn attempts(&self) -> &[Attempt] {
		&self.attempts
	}

	pub fn current_user_input(&self) -> Option<&str> {
		self.current_user_input.as_deref()
	}

	/// Attempts recorded since the current request began.
	pub fn request_attempts(&self) -> &[Attempt] {
		&self.attempts[self.request_start..]
	}

	pub(crate) fn begin_request(&mut self, request: &str) {
		self.current_user_input = Some(request.to_string());
		self.failed_count = 0;
		self.request_start = self.attempts.len();
	}

	pub(crate) fn record_success(&mut self, attempt: Attempt) {
		self.successful_count += 1;
		self.attempts.push(attempt);
	}

	pub(crate) fn record_failure(&mut self, attempt: Attempt) {
		self.failed_count += 1;
		self.attempts.push(attempt);
	}
}
impl Default for SessionState {
	fn default() -> Self {
		Self::new()
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestStatus {
	Succeeded { description: String, query_text: String, result: String },
	/// The failure budget ran out. The report carries every attempt of the request.
	Aborted,
	NoCandidates { search: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct RequestReport {
	pub status: RequestStatus,
	/// States walked, from `AwaitingInput` back to `AwaitingInput`.
	pub transitions: Vec<LoopState>,
	pub attempts: Vec<Attempt>,
}

impl XqService {
	/// Opens a session after checking that the function index is reachable.
	pub async fn start_session(&self) -> Result<SessionState> {
		self.index.check().await?;

		let session = SessionState::new();

		tracing::info!(session_id = %session.session_id(), "Session started.");

		Ok(session)
	}

	/// Runs one request to a terminal state. Synthesis and execution failures are recorded as
	/// attempts; only gathering errors are returned.
	#[tracing::instrument(name = "request", skip_all, fields(session_id = %session.session_id()))]
	pub async fn run_request(
		&self,
		session: &mut SessionState,
		request: &str,
	) -> Result<RequestReport> {
		let request = request.trim();

		if request.is_empty() {
			return Err(Error::InvalidRequest { message: "Request must be non-empty.".to_string() });
		}

		let max_attempts = self.cfg.synthesis.max_attempts;
		let mut transitions = vec![LoopState::AwaitingInput, LoopState::Synthesizing];

		session.begin_request(request);

		tracing::info!("Gathering function candidates.");

		let candidates = match self.gather_candidates(request, session.attempts()).await? {
			Gathered::Candidates(candidates) => candidates,
			Gathered::NoCandidates { search } => {
				tracing::info!(search = %search, "No function candidates.");

				transitions.push(LoopState::AwaitingInput);

				return Ok(RequestReport {
					status: RequestStatus::NoCandidates { search },
					transitions,
					attempts: Vec::new(),
				});
			},
		};

		loop {
			let attempt_no = session.failed_count() + 1;
			let failed: Vec<&Attempt> =
				session.attempts().iter().filter(|attempt| !attempt.is_success()).collect();
			let successful: Vec<&Attempt> =
				session.attempts().iter().filter(|attempt| attempt.is_success()).collect();
			let ctx = SynthesisContext {
				request,
				candidates: &candidates,
				failed: &failed,
				successful: &successful,
			};
			let synthesized = self.synthesize(ctx).await;
			let failure = match synthesized {
				Ok(synthesis) => {
					transitions.push(LoopState::Executing);

					let query_text = xquery::ensure_version_declaration(&synthesis.query_text);

					tracing::info!(attempt = attempt_no, "Executing query.");

					match self.execute(&query_text).await {
						Ok(result) => {
							session.record_success(Attempt::success(request, &query_text, &result));
							transitions.push(LoopState::Succeeded);
							transitions.push(LoopState::AwaitingInput);

							tracing::info!(attempt = attempt_no, "Query succeeded.");

							return Ok(RequestReport {
								status: RequestStatus::Succeeded {
									description: synthesis.description,
									query_text,
									result,
								},
								transitions,
								attempts: session.request_attempts().to_vec(),
							});
						},
						Err(err) => Attempt::failure(request, query_text, err.to_string()),
					}
				},
				Err(err) => Attempt::failure(request, err.query_text(), err.to_string()),
			};

			tracing::warn!(
				attempt = attempt_no,
				error = failure.error().unwrap_or_default(),
				"Attempt failed."
			);

			session.record_failure(failure);
			transitions.push(LoopState::FailedRetry);

			if session.failed_count() > max_attempts {
				transitions.push(LoopState::Aborted);
				transitions.push(LoopState::AwaitingInput);

				tracing::warn!(failed = session.failed_count(), "Attempt budget exhausted.");

				return Ok(RequestReport {
					status: RequestStatus::Aborted,
					transitions,
					attempts: session.request_attempts().to_vec(),
				});
			}

			transitions.push(LoopState::Synthesizing);
		}
	}
}

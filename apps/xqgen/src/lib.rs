use std::fmt::Write as _;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use xqgen_cli::ConfigArgs;
use xqgen_domain::time_serde;
use xqgen_service::{Input, RequestReport, RequestStatus, XqService, parse_input};

const PROMPT: &str = "Enter your request (or \"exit\" to quit): ";

#[derive(Debug, Parser)]
#[command(
	version = xqgen_cli::VERSION,
	rename_all = "kebab",
	styles = xqgen_cli::styles(),
)]
pub struct Args {
	#[command(flatten)]
	pub config: ConfigArgs,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = xqgen_config::load(&args.config.config)?;

	xqgen_cli::init_tracing(&config.service.log_level);

	let service = XqService::new(config)?;
	let mut session = service.start_session().await?;
	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	let mut stdout = tokio::io::stdout();

	loop {
		stdout.write_all(PROMPT.as_bytes()).await?;
		stdout.flush().await?;

		let Some(line) = lines.next_line().await? else {
			break;
		};

		match parse_input(&line) {
			Input::Exit => break,
			Input::Empty => {
				stdout.write_all(b"Request cannot be empty. Please try again.\n").await?;
			},
			Input::Request(request) => match service.run_request(&mut session, &request).await {
				Ok(report) => stdout.write_all(render_report(&report).as_bytes()).await?,
				Err(err) => tracing::error!(error = %err, "Request failed."),
			},
		}
	}

	tracing::info!(
		session_id = %session.session_id(),
		successful = session.successful_count(),
		"Shutting down."
	);

	Ok(())
}

/// Terminal rendering of a request outcome.
pub fn render_report(report: &RequestReport) -> String {
	let mut out = String::new();

	match &report.status {
		RequestStatus::Succeeded { description, query_text, result } => {
			let _ = writeln!(out, "{description}\n\nXQuery:\n{query_text}\n\nResult:\n{result}");
		},
		RequestStatus::NoCandidates { search } => {
			let _ = writeln!(out, "No suitable functions found for search \"{search}\".");
		},
		RequestStatus::Aborted => {
			let _ = writeln!(out, "Giving up after {} failed attempts.", report.attempts.len());

			for (idx, attempt) in report.attempts.iter().enumerate() {
				let query_text =
					if attempt.query_text().is_empty() { "<none>" } else { attempt.query_text() };

				let _ = writeln!(
					out,
					"\nAttempt {} ({}):\n{query_text}\nError: {}",
					idx + 1,
					time_serde::format_rfc3339(&attempt.timestamp()),
					attempt.error().unwrap_or_default()
				);
			}
		},
	}

	out
}

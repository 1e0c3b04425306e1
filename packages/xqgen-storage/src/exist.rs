//! eXist-db REST client for read queries.
//!
//! Queries are posted as an `exist:query` document to the `/db` collection. The wrapped response
//! is an `exist:result` element whose children are the result items in order.

use std::time::Duration;

use quick_xml::{Reader, events::Event};

use crate::{Error, Result};

pub const EXIST_NAMESPACE: &str = "http://exist.sourceforge.net/NS/exist";

const MAX_ERROR_BODY_CHARS: usize = 2_000;

pub struct ExistClient {
	client: reqwest::Client,
	endpoint: String,
	username: String,
	password: Option<String>,
	max_items: u32,
}
impl ExistClient {
	pub fn new(cfg: &xqgen_config::Exist) -> Result<Self> {
		let client =
			reqwest::Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

		Ok(Self {
			client,
			endpoint: format!("{}/db", cfg.url.trim_end_matches('/')),
			username: cfg.username.clone(),
			password: cfg.password.clone(),
			max_items: cfg.max_items,
		})
	}

	/// Runs `query_text` and returns one string per result item.
	pub async fn execute_read_query(&self, query_text: &str) -> Result<Vec<String>> {
		tracing::debug!(endpoint = %self.endpoint, "Posting query to eXist-db.");

		let res = self
			.client
			.post(&self.endpoint)
			.basic_auth(&self.username, self.password.as_deref())
			.header(reqwest::header::CONTENT_TYPE, "application/xml")
			.body(build_query_body(query_text, self.max_items))
			.send()
			.await?;
		let status = res.status();
		let body = res.text().await?;

		if !status.is_success() {
			return Err(Error::Engine {
				status: status.as_u16(),
				message: parse_exception_message(&body),
			});
		}

		parse_result_items(&body)
	}
}

pub fn build_query_body(query_text: &str, max_items: u32) -> String {
	let text = query_text.replace("]]>", "]]]]><![CDATA[>");

	format!(
		"<query xmlns=\"{EXIST_NAMESPACE}\" start=\"1\" max=\"{max_items}\" wrap=\"yes\">\
<text><![CDATA[{text}]]></text></query>"
	)
}

/// Splits a wrapped result document into items. Atomic values yield their text; element items
/// yield their markup verbatim.
pub fn parse_result_items(body: &str) -> Result<Vec<String>> {
	let mut reader = Reader::from_str(body);
	let mut items = Vec::new();
	let mut depth = 0_usize;
	let mut item_start = 0_usize;
	let mut value: Option<String> = None;

	loop {
		let before = reader.buffer_position();

		match reader.read_event()? {
			Event::Start(start) => {
				depth += 1;

				if depth == 2 {
					item_start = before;
					value = is_atomic_value(start.local_name().as_ref()).then(String::new);
				}
			},
			Event::Empty(start) if depth == 1 => {
				if is_atomic_value(start.local_name().as_ref()) {
					items.push(String::new());
				} else {
					items.push(body[before..reader.buffer_position()].to_string());
				}
			},
			Event::Text(text) if depth == 2 =>
				if let Some(value) = value.as_mut() {
					value.push_str(&text.unescape()?);
				},
			Event::CData(data) if depth == 2 =>
				if let Some(value) = value.as_mut() {
					value.push_str(&String::from_utf8_lossy(&data));
				},
			Event::End(_) => {
				if depth == 2 {
					let item = match value.take() {
						Some(text) => text,
						None => body[item_start..reader.buffer_position()].to_string(),
					};

					items.push(item);
				}

				depth = depth.saturating_sub(1);
			},
			Event::Eof => break,
			_ => {},
		}
	}

	Ok(items)
}

/// Extracts the `<message>` of an exception document, falling back to the trimmed body.
pub fn parse_exception_message(body: &str) -> String {
	if let Some(message) = exception_message(body) {
		return message;
	}

	let trimmed = body.trim();

	if trimmed.chars().count() > MAX_ERROR_BODY_CHARS {
		trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()
	} else {
		trimmed.to_string()
	}
}

fn exception_message(body: &str) -> Option<String> {
	let mut reader = Reader::from_str(body);
	let mut in_message = false;
	let mut message = String::new();

	loop {
		match reader.read_event().ok()? {
			Event::Start(start) if start.local_name().as_ref() == b"message" => in_message = true,
			Event::Text(text) if in_message => message.push_str(&text.unescape().ok()?),
			Event::CData(data) if in_message => message.push_str(&String::from_utf8_lossy(&data)),
			Event::End(end) if in_message && end.local_name().as_ref() == b"message" => {
				let message = message.trim();

				return (!message.is_empty()).then(|| message.to_string());
			},
			Event::Eof => return None,
			_ => {},
		}
	}
}

fn is_atomic_value(local_name: &[u8]) -> bool {
	local_name == b"value"
}

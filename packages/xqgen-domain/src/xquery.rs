use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub const VERSION_DECLARATION: &str = "xquery version \"3.1\";";

/// Prefixes eXist-db binds without an explicit declaration or import.
pub const PREDECLARED_PREFIXES: &[&str] = &[
	"array",
	"compression",
	"err",
	"exist",
	"file",
	"fn",
	"ft",
	"inspect",
	"local",
	"map",
	"math",
	"repo",
	"request",
	"response",
	"session",
	"sm",
	"system",
	"text",
	"transform",
	"util",
	"validation",
	"xml",
	"xmldb",
	"xs",
	"xsi",
];

const FUNCTION_CALL_PATTERN: &str = r"\b([A-Za-z_][\w.-]*):([A-Za-z_][\w.-]*)\s*\(";
const DECLARED_PREFIX_PATTERN: &str = r"\b(?:declare|import\s+module|import\s+schema|module)\s+namespace\s+([A-Za-z_][\w.-]*)\s*=";
const COMMENT_PATTERN: &str = r"(?s)\(:.*?:\)";
const STRING_LITERAL_PATTERN: &str = r#""[^"]*"|'[^']*'"#;
const WRAPPING_CALL_PATTERN: &str = r"^(?:fn:)?(head|subsequence)\s*\(";
const POSITION_BOUND_PATTERN: &str = r"^position\s*\(\s*\)\s*(<=|<|=|le|lt|eq)\s*(\d+)$";
const UNBOUNDED_REQUEST_PATTERN: &str = r"(?i)\b(?:all (?:of the )?(?:results|items|records|documents|entries|matches|rows)|no limit|unlimited|unbounded|without (?:a |any )?limit|every (?:result|item|record|document|entry|match))\b";

/// Structured synthesizer output. The wire name of `query_text` is `xquery`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisResult {
	pub description: String,
	#[serde(rename = "xquery")]
	pub query_text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleViolation {
	EmptyDescription,
	MissingVersionDeclaration,
	UnboundedResult { limit: u32 },
	UndeclaredNamespaces(Vec<String>),
}
impl fmt::Display for RuleViolation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::EmptyDescription => write!(f, "Description must be non-empty."),
			Self::MissingVersionDeclaration => {
				write!(f, "Query must start with '{VERSION_DECLARATION}'.")
			},
			Self::UnboundedResult { limit } => write!(
				f,
				"Query must return at most {limit} items: wrap the returned expression in \
				 subsequence(..., 1, {limit}) or head(), or filter it with (...)[position() <= {limit}]."
			),
			Self::UndeclaredNamespaces(prefixes) => write!(
				f,
				"Query uses undeclared namespace prefixes: {}. Declare or import them.",
				prefixes.join(", ")
			),
		}
	}
}

/// Hash of a query text with whitespace runs collapsed, so reformatting does not change it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QueryFingerprint([u8; 32]);
impl QueryFingerprint {
	pub fn of(query_text: &str) -> Self {
		let normalized = query_text.split_whitespace().collect::<Vec<_>>().join(" ");

		Self(*blake3::hash(normalized.as_bytes()).as_bytes())
	}

	pub fn short_hex(&self) -> String {
		self.0[..6].iter().map(|byte| format!("{byte:02x}")).collect()
	}
}

pub fn has_version_declaration(query_text: &str) -> bool {
	query_text.trim_start().starts_with(VERSION_DECLARATION)
}

/// Returns the query starting with the version declaration, prepending it when it is missing.
pub fn ensure_version_declaration(query_text: &str) -> String {
	let query_text = query_text.trim();

	if has_version_declaration(query_text) {
		return query_text.to_string();
	}

	format!("{VERSION_DECLARATION}\n\n{query_text}")
}

pub fn requests_unbounded(request: &str) -> bool {
	Regex::new(UNBOUNDED_REQUEST_PATTERN).map(|re| re.is_match(request)).unwrap_or(false)
}

/// True when the returned expression yields at most `limit` items. It must be wrapped whole in
/// `head()` or in `subsequence()` with a literal length, or be a parenthesized expression under a
/// single positional predicate.
pub fn bounds_cardinality(query_text: &str, limit: u32) -> bool {
	let code = strip_comments_and_strings(query_text);
	let body = main_expression(&code).trim();

	bounded_call(body, limit) || bounded_predicate(body, limit)
}

/// Prefixes used in function calls that are neither predeclared nor declared in the prolog,
/// in first-use order.
pub fn undeclared_prefixes(query_text: &str) -> Vec<String> {
	let code = strip_comments_and_strings(query_text);
	let (Ok(calls), Ok(declarations)) =
		(Regex::new(FUNCTION_CALL_PATTERN), Regex::new(DECLARED_PREFIX_PATTERN))
	else {
		return Vec::new();
	};
	// Declarations are matched on the raw text since their URIs are string literals.
	let declared: Vec<&str> = declarations
		.captures_iter(query_text)
		.filter_map(|caps| caps.get(1).map(|m| m.as_str()))
		.collect();
	let mut out: Vec<String> = Vec::new();

	for caps in calls.captures_iter(&code) {
		let Some(prefix) = caps.get(1).map(|m| m.as_str()) else {
			continue;
		};

		if PREDECLARED_PREFIXES.contains(&prefix)
			|| declared.contains(&prefix)
			|| out.iter().any(|seen| seen == prefix)
		{
			continue;
		}

		out.push(prefix.to_string());
	}

	out
}

/// Structural checks every synthesized query must pass before it is executed.
pub fn check_synthesis(
	result: &SynthesisResult,
	request: &str,
	return_limit: u32,
) -> Result<(), RuleViolation> {
	if result.description.trim().is_empty() {
		return Err(RuleViolation::EmptyDescription);
	}
	if !has_version_declaration(&result.query_text) {
		return Err(RuleViolation::MissingVersionDeclaration);
	}
	if !requests_unbounded(request) && !bounds_cardinality(&result.query_text, return_limit) {
		return Err(RuleViolation::UnboundedResult { limit: return_limit });
	}

	let undeclared = undeclared_prefixes(&result.query_text);

	if !undeclared.is_empty() {
		return Err(RuleViolation::UndeclaredNamespaces(undeclared));
	}

	Ok(())
}

fn strip_comments_and_strings(query_text: &str) -> String {
	let without_comments = match Regex::new(COMMENT_PATTERN) {
		Ok(re) => re.replace_all(query_text, " ").into_owned(),
		Err(_) => query_text.to_string(),
	};

	match Regex::new(STRING_LITERAL_PATTERN) {
		Ok(re) => re.replace_all(&without_comments, "\"\"").into_owned(),
		Err(_) => without_comments,
	}
}

/// The query body after the last top-level `;`, which ends the prolog.
fn main_expression(code: &str) -> &str {
	let mut depth = 0_i32;
	let mut start = 0;

	for (idx, ch) in code.char_indices() {
		match ch {
			'(' | '[' | '{' => depth += 1,
			')' | ']' | '}' => depth -= 1,
			';' if depth == 0 => start = idx + 1,
			_ => {},
		}
	}

	&code[start..]
}

/// Byte index of the `)` closing the `(` at `open`.
fn closing_paren(text: &str, open: usize) -> Option<usize> {
	let mut depth = 0_i32;

	for (idx, ch) in text[open..].char_indices() {
		match ch {
			'(' => depth += 1,
			')' => {
				depth -= 1;

				if depth == 0 {
					return Some(open + idx);
				}
			},
			_ => {},
		}
	}

	None
}

fn top_level_args(args: &str) -> Vec<&str> {
	let mut depth = 0_i32;
	let mut start = 0;
	let mut out = Vec::new();

	for (idx, ch) in args.char_indices() {
		match ch {
			'(' | '[' | '{' => depth += 1,
			')' | ']' | '}' => depth -= 1,
			',' if depth == 0 => {
				out.push(&args[start..idx]);
				start = idx + 1;
			},
			_ => {},
		}
	}

	out.push(&args[start..]);

	out
}

fn literal_within(arg: &str, limit: u32) -> bool {
	arg.trim().parse::<u64>().is_ok_and(|n| n <= u64::from(limit))
}

fn bounded_call(body: &str, limit: u32) -> bool {
	let Ok(re) = Regex::new(WRAPPING_CALL_PATTERN) else {
		return false;
	};
	let Some(caps) = re.captures(body) else {
		return false;
	};
	let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
		return false;
	};
	let open = whole.end() - 1;
	let Some(close) = closing_paren(body, open) else {
		return false;
	};

	if !body[close + 1..].trim().is_empty() {
		return false;
	}

	match name.as_str() {
		"head" => true,
		_ => {
			let args = top_level_args(&body[open + 1..close]);

			args.len() == 3 && literal_within(args[2], limit)
		},
	}
}

fn bounded_predicate(body: &str, limit: u32) -> bool {
	if !body.starts_with('(') {
		return false;
	}

	let Some(close) = closing_paren(body, 0) else {
		return false;
	};
	let Some(predicate) =
		body[close + 1..].trim().strip_prefix('[').and_then(|rest| rest.strip_suffix(']'))
	else {
		return false;
	};
	let predicate = predicate.trim();

	if predicate.contains(['[', ']']) {
		return false;
	}
	if predicate.parse::<u64>().is_ok() {
		return true;
	}

	let Ok(re) = Regex::new(POSITION_BOUND_PATTERN) else {
		return false;
	};
	let Some(caps) = re.captures(predicate) else {
		return false;
	};
	let Some(bound) = caps.get(2).and_then(|m| m.as_str().parse::<u64>().ok()) else {
		return false;
	};

	match caps.get(1).map(|m| m.as_str()) {
		Some("=" | "eq") => true,
		Some("<" | "lt") => bound <= u64::from(limit) + 1,
		_ => bound <= u64::from(limit),
	}
}

use xqgen_domain::xquery;

use crate::{Result, XqService};

impl XqService {
	/// Runs a read query, injecting the version declaration when it is missing. Result items are
	/// joined with newlines.
	pub async fn execute(&self, query_text: &str) -> Result<String> {
		let query_text = xquery::ensure_version_declaration(query_text);
		let items = self.engine.execute_read_query(&query_text).await?;

		tracing::debug!(items = items.len(), "Query executed.");

		Ok(items.join("\n"))
	}
}

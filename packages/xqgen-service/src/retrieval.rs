use std::cmp::Ordering;

use xqgen_domain::{Attempt, FunctionDoc};

use crate::{Result, XqService, validator::Candidate};

/// Outcome of candidate gathering for one request.
#[derive(Clone, Debug, PartialEq)]
pub enum Gathered {
	Candidates(Vec<Candidate>),
	/// Nothing was accepted and no alternative search remained. `search` is the last search tried.
	NoCandidates { search: String },
}

impl XqService {
	/// Similarity search with the configured `top_k` and `min_score`, best first.
	pub async fn retrieve(&self, search: &str) -> Result<Vec<FunctionDoc>> {
		let cfg = &self.cfg.retrieval;
		let mut docs =
			self.index.similarity_search_with_score(search, cfg.top_k, cfg.min_score).await?;

		docs.retain(|doc| doc.similarity_score >= cfg.min_score);
		docs.sort_by(|a, b| {
			b.similarity_score.partial_cmp(&a.similarity_score).unwrap_or(Ordering::Equal)
		});
		docs.truncate(cfg.top_k as usize);

		Ok(docs)
	}

	/// Optimizes, retrieves and validates, following the top discarded candidate's alternative
	/// search when nothing is accepted.
	pub async fn gather_candidates(&self, request: &str, attempts: &[Attempt]) -> Result<Gathered> {
		let failed: Vec<&Attempt> = attempts.iter().filter(|attempt| !attempt.is_success()).collect();
		let mut search = self.optimize_search(request, attempts).await?;
		let mut alternatives_left = self.cfg.retrieval.max_alternative_searches;

		loop {
			let docs = self.retrieve(&search).await?;
			let verdicts = self.validate_all(request, &docs, &failed).await;
			let accepted = crate::validator::select_accepted(&docs, &verdicts);

			tracing::info!(
				search = %search,
				retrieved = docs.len(),
				accepted = accepted.len(),
				"Validated function candidates."
			);

			if !accepted.is_empty() {
				return Ok(Gathered::Candidates(accepted));
			}

			let alternative = verdicts
				.first()
				.and_then(|verdict| verdict.alternative_search())
				.filter(|alternative| *alternative != search)
				.map(str::to_string);

			match alternative {
				Some(alternative) if alternatives_left > 0 => {
					alternatives_left -= 1;

					tracing::info!(alternative = %alternative, "Retrying retrieval with alternative search.");

					search = alternative;
				},
				_ => return Ok(Gathered::NoCandidates { search }),
			}
		}
	}
}

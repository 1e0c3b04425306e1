use std::{cmp::Ordering, collections::HashMap};

use qdrant_client::qdrant::{Query, QueryPointsBuilder, ScoredPoint, Value, value::Kind};

use crate::{Result, models::FunctionRecord};

pub const NAME_KEY: &str = "name";
pub const SIGNATURE_KEY: &str = "signature";
pub const DESCRIPTION_KEY: &str = "description";
pub const RETURN_TYPE_KEY: &str = "return_type";
pub const MODULE_NAME_KEY: &str = "module_name";
pub const MODULE_URI_KEY: &str = "module_uri";

/// Read-only view of the function documentation collection.
pub struct FunctionStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
	pub vector_name: Option<String>,
}
impl FunctionStore {
	pub fn new(cfg: &xqgen_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self {
			client,
			collection: cfg.collection.clone(),
			vector_dim: cfg.vector_dim,
			vector_name: cfg.vector_name.clone(),
		})
	}

	pub async fn collection_exists(&self) -> Result<bool> {
		Ok(self.client.collection_exists(self.collection.as_str()).await?)
	}

	/// Nearest functions with score at or above `min_score`, best first.
	pub async fn search(
		&self,
		vector: Vec<f32>,
		k: u32,
		min_score: f32,
	) -> Result<Vec<FunctionRecord>> {
		let mut search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector))
			.score_threshold(min_score)
			.limit(k as u64)
			.with_payload(true);

		if let Some(name) = self.vector_name.as_deref() {
			search = search.using(name);
		}

		let response = self.client.query(search).await?;

		Ok(records_from_points(response.result, min_score))
	}
}

/// Converts scored points into records, dropping points below the threshold or without a name
/// and description.
pub fn records_from_points(points: Vec<ScoredPoint>, min_score: f32) -> Vec<FunctionRecord> {
	let mut out: Vec<FunctionRecord> = points
		.into_iter()
		.filter(|point| point.score >= min_score)
		.filter_map(|point| {
			let record = record_from_payload(&point.payload, point.score);

			if record.is_none() {
				tracing::warn!(score = point.score, "Function point is missing name or description.");
			}

			record
		})
		.collect();

	out.sort_by(compare_records);

	out
}

fn record_from_payload(payload: &HashMap<String, Value>, score: f32) -> Option<FunctionRecord> {
	let name = payload_string(payload, NAME_KEY).filter(|name| !name.trim().is_empty())?;
	let description =
		payload_string(payload, DESCRIPTION_KEY).filter(|text| !text.trim().is_empty())?;

	Some(FunctionRecord {
		name,
		signature: payload_string(payload, SIGNATURE_KEY).unwrap_or_default(),
		description,
		return_type: payload_string(payload, RETURN_TYPE_KEY).unwrap_or_default(),
		module_name: payload_string(payload, MODULE_NAME_KEY).unwrap_or_default(),
		module_uri: payload_string(payload, MODULE_URI_KEY).unwrap_or_default(),
		score,
	})
}

fn compare_records(a: &FunctionRecord, b: &FunctionRecord) -> Ordering {
	b.score
		.partial_cmp(&a.score)
		.unwrap_or(Ordering::Equal)
		.then_with(|| a.name.cmp(&b.name))
		.then_with(|| a.signature.cmp(&b.signature))
}

fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::StringValue(text)) => Some(text.to_string()),
		_ => None,
	}
}

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub retrieval: Retrieval,
	#[serde(default)]
	pub synthesis: Synthesis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub qdrant: Qdrant,
	pub exist: Exist,
}

/// The function corpus collection. It is written by the index build, never by xqgen.
#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
	/// Optional. Named dense vector to query; the default unnamed vector is used when absent.
	pub vector_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Exist {
	/// REST root, e.g. "http://localhost:8080/exist/rest".
	pub url: String,
	pub username: String,
	pub password: Option<String>,
	pub timeout_ms: u64,
	#[serde(default = "default_max_items")]
	pub max_items: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub optimizer: LlmProviderConfig,
	pub validator: LlmProviderConfig,
	pub synthesizer: LlmProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	pub top_k: u32,
	pub min_score: f32,
	pub validation_timeout_ms: u64,
	pub max_alternative_searches: u32,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self {
			top_k: 5,
			min_score: 0.70,
			validation_timeout_ms: 30_000,
			max_alternative_searches: 1,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Synthesis {
	/// Failed attempts tolerated per request before the loop aborts.
	pub max_attempts: u32,
	/// Cardinality cap the synthesized query must apply unless unbounded output is requested.
	pub return_limit: u32,
}
impl Default for Synthesis {
	fn default() -> Self {
		Self { max_attempts: 5, return_limit: 50 }
	}
}

fn default_max_items() -> u32 {
	10_000
}

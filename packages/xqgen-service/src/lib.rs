pub mod backends;
pub mod executor;
pub mod optimizer;
pub mod retrieval;
pub mod session;
pub mod synthesizer;
pub mod tools;
pub mod validator;

mod error;

pub use error::{Error, Result};
pub use retrieval::Gathered;
pub use session::{Input, LoopState, RequestReport, RequestStatus, SessionState, parse_input};
pub use tools::{ToolCall, ToolOutput};
pub use validator::Candidate;

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;

use xqgen_config::{Config, EmbeddingProviderConfig, LlmProviderConfig};
use xqgen_domain::FunctionDoc;
use xqgen_providers::{
	chat::{self, ResponseSchema},
	embedding,
};
use xqgen_storage::{exist::ExistClient, qdrant::FunctionStore};

use crate::backends::{ExistQueryEngine, QdrantFunctionIndex};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

pub trait LlmProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, Result<String>>;

	fn complete_structured<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
		schema: &'a ResponseSchema,
	) -> BoxFuture<'a, Result<Value>>;
}

/// Semantic index over the function documentation corpus.
pub trait FunctionIndex
where
	Self: Send + Sync,
{
	/// Fails with [`Error::Retrieval`] when the index cannot serve queries.
	fn check<'a>(&'a self) -> BoxFuture<'a, Result<()>>;

	/// Functions scoring at least `min_score` against `query`, best first.
	fn similarity_search_with_score<'a>(
		&'a self,
		query: &'a str,
		k: u32,
		min_score: f32,
	) -> BoxFuture<'a, Result<Vec<FunctionDoc>>>;
}

pub trait QueryEngine
where
	Self: Send + Sync,
{
	/// Result items in engine order, or [`Error::Execution`] carrying the engine's message.
	fn execute_read_query<'a>(&'a self, query_text: &'a str) -> BoxFuture<'a, Result<Vec<String>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub optimizer: Arc<dyn LlmProvider>,
	pub validator: Arc<dyn LlmProvider>,
	pub synthesizer: Arc<dyn LlmProvider>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		optimizer: Arc<dyn LlmProvider>,
		validator: Arc<dyn LlmProvider>,
		synthesizer: Arc<dyn LlmProvider>,
	) -> Self {
		Self { embedding, optimizer, validator, synthesizer }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self {
			embedding: provider.clone(),
			optimizer: provider.clone(),
			validator: provider.clone(),
			synthesizer: provider,
		}
	}
}

pub struct XqService {
	pub cfg: Config,
	pub providers: Providers,
	pub index: Arc<dyn FunctionIndex>,
	pub engine: Arc<dyn QueryEngine>,
}
impl XqService {
	/// Wires the Qdrant index and the eXist-db engine from `cfg`.
	pub fn new(cfg: Config) -> Result<Self> {
		let providers = Providers::default();
		let store = FunctionStore::new(&cfg.storage.qdrant)
			.map_err(|err| Error::Retrieval { message: err.to_string() })?;
		let client = ExistClient::new(&cfg.storage.exist)
			.map_err(|err| Error::Execution { message: err.to_string() })?;
		let index = Arc::new(QdrantFunctionIndex::new(
			store,
			providers.embedding.clone(),
			cfg.providers.embedding.clone(),
		));
		let engine = Arc::new(ExistQueryEngine::new(client));

		Ok(Self { cfg, providers, index, engine })
	}

	pub fn with_backends(
		cfg: Config,
		providers: Providers,
		index: Arc<dyn FunctionIndex>,
		engine: Arc<dyn QueryEngine>,
	) -> Self {
		Self { cfg, providers, index, engine }
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(embedding::embed(cfg, texts).await?) })
	}
}
impl LlmProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move { Ok(chat::complete(cfg, messages).await?) })
	}

	fn complete_structured<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
		schema: &'a ResponseSchema,
	) -> BoxFuture<'a, Result<Value>> {
		Box::pin(async move { Ok(chat::complete_structured(cfg, messages, schema).await?) })
	}
}

//! Production implementations of the index and engine seams.

use std::sync::Arc;

use xqgen_config::EmbeddingProviderConfig;
use xqgen_domain::FunctionDoc;
use xqgen_storage::{exist::ExistClient, models::FunctionRecord, qdrant::FunctionStore};

use crate::{BoxFuture, EmbeddingProvider, Error, FunctionIndex, QueryEngine, Result};

pub struct QdrantFunctionIndex {
	store: FunctionStore,
	embedding: Arc<dyn EmbeddingProvider>,
	embedding_cfg: EmbeddingProviderConfig,
}
impl QdrantFunctionIndex {
	pub fn new(
		store: FunctionStore,
		embedding: Arc<dyn EmbeddingProvider>,
		embedding_cfg: EmbeddingProviderConfig,
	) -> Self {
		Self { store, embedding, embedding_cfg }
	}

	async fn search(&self, query: &str, k: u32, min_score: f32) -> Result<Vec<FunctionDoc>> {
		let texts = vec![query.to_string()];
		let vector = self
			.embedding
			.embed(&self.embedding_cfg, &texts)
			.await?
			.into_iter()
			.next()
			.ok_or_else(|| Error::Provider {
				message: "Embedding provider returned no vectors.".to_string(),
			})?;

		if vector.len() != self.store.vector_dim as usize {
			return Err(Error::Provider {
				message: "Embedding vector dimension mismatch.".to_string(),
			});
		}

		let records = self
			.store
			.search(vector, k, min_score)
			.await
			.map_err(|err| Error::Retrieval { message: err.to_string() })?;

		Ok(records.into_iter().map(function_doc).collect())
	}
}
impl FunctionIndex for QdrantFunctionIndex {
	fn check<'a>(&'a self) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let exists = self
				.store
				.collection_exists()
				.await
				.map_err(|err| Error::Retrieval { message: err.to_string() })?;

			if !exists {
				return Err(Error::Retrieval {
					message: format!("Collection {} does not exist.", self.store.collection),
				});
			}

			Ok(())
		})
	}

	fn similarity_search_with_score<'a>(
		&'a self,
		query: &'a str,
		k: u32,
		min_score: f32,
	) -> BoxFuture<'a, Result<Vec<FunctionDoc>>> {
		Box::pin(self.search(query, k, min_score))
	}
}

pub struct ExistQueryEngine {
	client: ExistClient,
}
impl ExistQueryEngine {
	pub fn new(client: ExistClient) -> Self {
		Self { client }
	}
}
impl QueryEngine for ExistQueryEngine {
	fn execute_read_query<'a>(&'a self, query_text: &'a str) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(async move {
			self.client
				.execute_read_query(query_text)
				.await
				.map_err(|err| Error::Execution { message: err.to_string() })
		})
	}
}

fn function_doc(record: FunctionRecord) -> FunctionDoc {
	FunctionDoc {
		name: record.name,
		signature: record.signature,
		description: record.description,
		return_type: record.return_type,
		module_name: record.module_name,
		module_uri: record.module_uri,
		similarity_score: record.score,
	}
}

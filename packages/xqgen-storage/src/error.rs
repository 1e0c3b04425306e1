#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Qdrant(#[from] Box<qdrant_client::QdrantError>),
	#[error(transparent)]
	Http(#[from] reqwest::Error),
	#[error(transparent)]
	Xml(#[from] quick_xml::Error),
	#[error("Query engine returned HTTP {status}: {message}")]
	Engine { status: u16, message: String },
	#[error("Invalid payload: {0}")]
	InvalidPayload(String),
}
impl From<qdrant_client::QdrantError> for Error {
	fn from(err: qdrant_client::QdrantError) -> Self {
		Self::Qdrant(Box::new(err))
	}
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error(transparent)]
	Qdrant(Box<qdrant_client::QdrantError>),
	#[error("{0}")]
	InvalidArgument(String),
	#[error("{0}")]
	NotFound(String),
	#[error("{0}")]
	Conflict(String),
}

impl From<qdrant_client::QdrantError> for Error {
	fn from(err: qdrant_client::QdrantError) -> Self {
		Self::Qdrant(Box::new(err))
	}
}

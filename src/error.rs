use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("a non-empty path must be specified")]
	EmptyPath,

	#[error("a non-empty key set must be specified")]
	EmptyKeySet,

	#[error("limiting #{{{existing}}} to #{{{requested}}} results in an empty set")]
	EmptyIntersection { existing: String, requested: String },

	#[error("write cycle while setting {property} to {value}")]
	WriteCycle { property: String, value: String },
}

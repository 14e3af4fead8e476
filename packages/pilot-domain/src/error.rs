pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to read term tables at {path:?}.")]
	ReadTerms { path: std::path::PathBuf, source: std::io::Error },
	#[error("Failed to parse term tables.")]
	ParseTerms { source: toml::de::Error },
	#[error("Invalid term tables: {message}")]
	InvalidTerms { message: String },
}

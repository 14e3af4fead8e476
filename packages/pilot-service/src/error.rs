pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid query: {message}")]
	InvalidQuery { message: String },
	#[error("Knowledge backend unavailable: {message}")]
	BackendUnavailable { message: String },
	#[error("Configuration error: {message}")]
	Configuration { message: String },
}
impl From<pilot_config::Error> for Error {
	fn from(err: pilot_config::Error) -> Self {
		Self::Configuration { message: err.to_string() }
	}
}

impl From<pilot_domain::Error> for Error {
	fn from(err: pilot_domain::Error) -> Self {
		Self::Configuration { message: err.to_string() }
	}
}

impl From<pilot_providers::Error> for Error {
	fn from(err: pilot_providers::Error) -> Self {
		match err {
			pilot_providers::Error::InvalidConfig { message } => Self::Configuration { message },
			other => Self::BackendUnavailable { message: other.to_string() },
		}
	}
}

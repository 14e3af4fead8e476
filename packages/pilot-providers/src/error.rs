pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
	#[error("Knowledge source returned HTTP {status}.")]
	Status { status: u16 },
	#[error("Knowledge source returned RPC error {code}: {message}")]
	Rpc { code: i64, message: String },
	#[error("All knowledge sources failed: {message}")]
	AllSourcesFailed { message: String },
}
impl Error {
	/// Whether repeating the same request may succeed.
	pub fn is_transient(&self) -> bool {
		match self {
			Self::Reqwest(err) => err.is_timeout() || err.is_connect() || err.is_request(),
			Self::Status { status } => *status >= 500 || *status == 429,
			_ => false,
		}
	}
}

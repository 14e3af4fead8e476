use serde::{Deserialize, Serialize};

use crate::term::tokenize;

/// Where a fragment lives in the knowledge backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
	/// Name of the backend source that returned the fragment.
	pub source: Option<String>,
	pub section: Option<String>,
	pub topic: Option<String>,
}

/// One fragment returned by the knowledge backend, before ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
	pub id: String,
	pub text: String,
	pub location: SourceLocation,
	/// Backend-provided relevance, when the backend scores its hits.
	pub prior: Option<f32>,
}
impl Candidate {
	pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			text: text.into(),
			location: SourceLocation::default(),
			prior: None,
		}
	}

	pub fn with_prior(mut self, prior: f32) -> Self {
		self.prior = Some(prior);

		self
	}

	pub fn with_section(mut self, section: impl Into<String>) -> Self {
		self.location.section = Some(section.into());

		self
	}

	pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
		self.location.topic = Some(topic.into());

		self
	}

	pub fn with_source(mut self, source: impl Into<String>) -> Self {
		self.location.source = Some(source.into());

		self
	}

	/// A fragment without an id or without a single word cannot be ranked.
	pub fn is_well_formed(&self) -> bool {
		!self.id.trim().is_empty() && !tokenize(&self.text).is_empty()
	}
}

/// Optional restrictions forwarded to the knowledge backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub sections: Vec<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub topics: Vec<String>,
}
impl SearchFilters {
	pub fn is_empty(&self) -> bool {
		self.sections.is_empty() && self.topics.is_empty()
	}
}

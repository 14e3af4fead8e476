use std::{
	sync::atomic::{AtomicU64, Ordering},
	time::Duration,
};

use reqwest::{Client, header::CONTENT_TYPE};
use serde_json::Value;

use crate::{Error, Result};
use pilot_config::{Backend, BackendSource};
use pilot_domain::{Candidate, SearchFilters, SourceLocation, Term};

const ID_KEYS: [&str; 3] = ["id", "slug", "url"];
const TEXT_KEYS: [&str; 3] = ["text", "content", "snippet"];
const TOPIC_KEYS: [&str; 2] = ["topic", "title"];
const SCORE_KEYS: [&str; 2] = ["score", "relevance_score"];
const LIST_KEYS: [&str; 3] = ["results", "fragments", "items"];

/// Knowledge backend client speaking MCP `tools/call` over HTTP.
///
/// Sources are queried in configured order and their fragments concatenated. Transient
/// failures are retried per source; a source that still fails is skipped as long as another
/// source answered.
pub struct KnowledgeClient {
	client: Client,
	sources: Vec<BackendSource>,
	max_retries: u32,
	retry_backoff: Duration,
	max_candidates: u32,
	next_request_id: AtomicU64,
}
impl KnowledgeClient {
	pub fn new(cfg: &Backend) -> Result<Self> {
		if cfg.sources.is_empty() {
			return Err(Error::InvalidConfig {
				message: "At least one knowledge source is required.".to_string(),
			});
		}

		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

		Ok(Self {
			client,
			sources: cfg.sources.clone(),
			max_retries: cfg.max_retries,
			retry_backoff: Duration::from_millis(cfg.retry_backoff_ms),
			max_candidates: cfg.max_candidates,
			next_request_id: AtomicU64::new(1),
		})
	}

	pub async fn fetch(
		&self,
		terms: &[Term],
		filters: Option<&SearchFilters>,
	) -> Result<Vec<Candidate>> {
		let mut out = Vec::new();
		let mut failures = Vec::new();

		for source in &self.sources {
			match self.fetch_source(source, terms, filters).await {
				Ok(candidates) => {
					tracing::debug!(
						source = %source.name,
						count = candidates.len(),
						"Knowledge source answered."
					);

					out.extend(candidates);
				},
				Err(err) => {
					tracing::warn!(source = %source.name, error = %err, "Knowledge source failed.");

					failures.push(format!("{}: {err}", source.name));
				},
			}
		}

		if failures.len() == self.sources.len() {
			return Err(Error::AllSourcesFailed { message: failures.join("; ") });
		}

		Ok(out)
	}

	async fn fetch_source(
		&self,
		source: &BackendSource,
		terms: &[Term],
		filters: Option<&SearchFilters>,
	) -> Result<Vec<Candidate>> {
		let mut attempt = 0_u32;

		loop {
			let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
			let body =
				build_tool_call(request_id, &source.tool, terms, filters, self.max_candidates);

			match self.call_once(source, &body).await {
				Ok(result) => return parse_candidates(&source.name, &result),
				Err(err) if err.is_transient() && attempt < self.max_retries => {
					attempt += 1;

					tracing::warn!(
						source = %source.name,
						attempt,
						error = %err,
						"Retrying knowledge source."
					);

					tokio::time::sleep(self.retry_backoff * attempt).await;
				},
				Err(err) => return Err(err),
			}
		}
	}

	async fn call_once(&self, source: &BackendSource, body: &Value) -> Result<Value> {
		let res = self
			.client
			.post(&source.url)
			.headers(crate::auth_headers(source.api_key.as_deref(), &source.default_headers)?)
			.json(body)
			.send()
			.await?;
		let status = res.status();

		if !status.is_success() {
			return Err(Error::Status { status: status.as_u16() });
		}

		let content_type = res
			.headers()
			.get(CONTENT_TYPE)
			.and_then(|value| value.to_str().ok())
			.map(str::to_string);
		let raw = res.text().await?;

		parse_rpc_body(&raw, content_type.as_deref())
	}
}

/// JSON-RPC 2.0 `tools/call` request for one knowledge source.
pub fn build_tool_call(
	request_id: u64,
	tool: &str,
	terms: &[Term],
	filters: Option<&SearchFilters>,
	limit: u32,
) -> Value {
	let query = terms.iter().map(Term::as_str).collect::<Vec<_>>().join(" ");
	let mut arguments = serde_json::json!({
		"query": query,
		"terms": terms,
		"limit": limit,
	});

	if let Some(filters) = filters.filter(|filters| !filters.is_empty())
		&& let Some(object) = arguments.as_object_mut()
	{
		if !filters.sections.is_empty() {
			object.insert("sections".to_string(), serde_json::json!(filters.sections));
		}
		if !filters.topics.is_empty() {
			object.insert("topics".to_string(), serde_json::json!(filters.topics));
		}
	}

	serde_json::json!({
		"jsonrpc": "2.0",
		"id": request_id,
		"method": "tools/call",
		"params": { "name": tool, "arguments": arguments },
	})
}

/// Extracts the JSON-RPC `result` from a plain JSON or `text/event-stream` body.
pub fn parse_rpc_body(raw: &str, content_type: Option<&str>) -> Result<Value> {
	let is_event_stream =
		content_type.map(|value| value.starts_with("text/event-stream")).unwrap_or(false);
	let message: Value = if is_event_stream {
		let mut last = None;

		for line in raw.lines() {
			let Some(data) = line.strip_prefix("data:") else { continue };
			let Ok(value) = serde_json::from_str::<Value>(data.trim()) else { continue };

			if value.get("result").is_some() || value.get("error").is_some() {
				last = Some(value);
			}
		}

		last.ok_or_else(|| Error::InvalidResponse {
			message: "Event stream carried no JSON-RPC response.".to_string(),
		})?
	} else {
		serde_json::from_str(raw)?
	};

	if let Some(error) = message.get("error") {
		let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
		let message = error
			.get("message")
			.and_then(Value::as_str)
			.unwrap_or("unknown error")
			.to_string();

		return Err(Error::Rpc { code, message });
	}

	message.get("result").cloned().ok_or_else(|| Error::InvalidResponse {
		message: "JSON-RPC response is missing result.".to_string(),
	})
}

/// Turns a `tools/call` result into candidates, in the order the source listed them.
pub fn parse_candidates(source: &str, result: &Value) -> Result<Vec<Candidate>> {
	if result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
		let message = content_texts(result).collect::<Vec<_>>().join(" ");

		return Err(Error::InvalidResponse {
			message: format!("Tool reported an error: {message}"),
		});
	}

	let mut fragments = Vec::new();

	if let Some(structured) = result.get("structuredContent") {
		collect_fragments(structured, &mut fragments);
	} else {
		let Some(content) = result.get("content").and_then(Value::as_array) else {
			return Err(Error::InvalidResponse {
				message: "Tool result is missing content.".to_string(),
			});
		};

		for item in content {
			if item.get("type").and_then(Value::as_str) != Some("text") {
				continue;
			}

			let Some(text) = item.get("text").and_then(Value::as_str) else { continue };

			match serde_json::from_str::<Value>(text) {
				Ok(value) if value.is_array() || value.is_object() =>
					collect_fragments(&value, &mut fragments),
				_ => fragments.push(serde_json::json!({ "text": text })),
			}
		}
	}

	Ok(fragments
		.iter()
		.enumerate()
		.map(|(idx, fragment)| fragment_to_candidate(source, idx, fragment))
		.collect())
}

fn content_texts(result: &Value) -> impl Iterator<Item = &str> {
	result
		.get("content")
		.and_then(Value::as_array)
		.into_iter()
		.flatten()
		.filter_map(|item| item.get("text").and_then(Value::as_str))
}

fn collect_fragments(value: &Value, out: &mut Vec<Value>) {
	if let Some(items) = value.as_array() {
		out.extend(items.iter().cloned());

		return;
	}

	for key in LIST_KEYS {
		if let Some(items) = value.get(key).and_then(Value::as_array) {
			out.extend(items.iter().cloned());

			return;
		}
	}

	if value.is_object() {
		out.push(value.clone());
	}
}

fn fragment_to_candidate(source: &str, idx: usize, fragment: &Value) -> Candidate {
	let id = ID_KEYS
		.iter()
		.find_map(|key| match fragment.get(*key) {
			Some(Value::String(text)) if !text.trim().is_empty() => Some(text.clone()),
			Some(Value::Number(number)) => Some(number.to_string()),
			_ => None,
		})
		.unwrap_or_else(|| format!("{source}:{idx}"));
	let text = first_string(fragment, &TEXT_KEYS).unwrap_or_default();
	let prior = SCORE_KEYS
		.iter()
		.find_map(|key| fragment.get(*key).and_then(Value::as_f64))
		.map(|score| score as f32);

	Candidate {
		id,
		text,
		location: SourceLocation {
			source: Some(source.to_string()),
			section: first_string(fragment, &["section"]),
			topic: first_string(fragment, &TOPIC_KEYS),
		},
		prior,
	}
}

fn first_string(fragment: &Value, keys: &[&str]) -> Option<String> {
	keys.iter().find_map(|key| fragment.get(*key).and_then(Value::as_str).map(str::to_string))
}
